//! rendermux Core
//!
//! Core types, traits, and utilities shared across rendermux components.
//!
//! This crate provides:
//! - Content categories, samples, and detection results
//! - Error types and result handling
//! - The per-message streaming fragment buffer
//! - An injectable scheduler so throttling can run on tokio or a virtual clock

pub mod error;
pub mod scheduler;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use scheduler::{ManualScheduler, Scheduler, Task, TimerHandle, TokioScheduler};
pub use stream::{StreamBufferManager, StreamConfig, StreamHandlers};
pub use types::{
    preview, Category, ContentSample, DetectionResult, Metadata, OriginHint, StreamFragment,
    StreamState,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::scheduler::{Scheduler, TokioScheduler};
    pub use crate::stream::{StreamBufferManager, StreamConfig, StreamHandlers};
    pub use crate::types::{
        Category, ContentSample, DetectionResult, Metadata, OriginHint, StreamFragment,
        StreamState,
    };
}
