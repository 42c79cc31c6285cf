//! rendermux Render
//!
//! Turns classified chat content into presentation output.
//!
//! - [`Renderer`]: pluggable strategy per category, generic over its output
//! - [`RendererRegistry`]: category lookup with a plain-text fallback
//! - [`Orchestrator`]: detection, lookup, one-shot or streamed rendering,
//!   renderer fault containment and post-render hooks

pub mod hooks;
pub mod orchestrator;
pub mod registry;
pub mod renderer;

pub use hooks::{FnHook, MediaQueueHook, MediaRequest, PostRenderHook, RenderedMessage, ThemeColorHook};
pub use orchestrator::{
    Orchestrator, RenderOptions, RenderOutcome, RenderOutput, StreamHandle, StreamSummary,
};
pub use registry::{RendererRegistry, SharedRenderer};
pub use renderer::{BufferSink, PlainTextRenderer, RenderSink, Renderer};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::hooks::{PostRenderHook, RenderedMessage};
    pub use crate::orchestrator::{Orchestrator, RenderOptions, RenderOutcome, RenderOutput};
    pub use crate::registry::RendererRegistry;
    pub use crate::renderer::{BufferSink, PlainTextRenderer, RenderSink, Renderer};
}
