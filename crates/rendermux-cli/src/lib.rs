//! rendermux command line front end
//!
//! `rendermux detect`, `render` and `stream` over a file or stdin, with
//! terminal renderers for the common categories.

pub mod cli;
pub mod commands;
pub mod config;
pub mod renderers;

pub use cli::{Cli, Commands, Origin};
pub use config::RendermuxConfig;
