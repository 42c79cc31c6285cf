//! Renderer trait and output sinks
//!
//! A renderer turns classified content into an opaque output `O` that the
//! presentation layer understands. The orchestrator never looks inside `O`;
//! it only cares whether rendering succeeded.

use async_trait::async_trait;
use parking_lot::Mutex;
use rendermux_core::{Category, Metadata, Result, StreamFragment};
use std::sync::Arc;

/// Append-only target for streamed fragments
pub trait RenderSink: Send + Sync {
    /// Append rendered text
    fn append(&self, text: &str);

    /// Everything appended so far
    fn content(&self) -> String;

    /// Length of the content in bytes
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory sink backed by a shared `String`
///
/// Cloning yields another handle to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    buffer: Arc<Mutex<String>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything written so far
    pub fn clear(&self) {
        self.buffer.lock().clear();
    }
}

impl RenderSink for BufferSink {
    fn append(&self, text: &str) {
        self.buffer.lock().push_str(text);
    }

    fn content(&self) -> String {
        self.buffer.lock().clone()
    }

    fn len(&self) -> usize {
        self.buffer.lock().len()
    }
}

/// Pluggable strategy bound to one category
#[async_trait]
pub trait Renderer<O>: Send + Sync {
    /// Renderer name, reported in outcomes and logs
    fn name(&self) -> &str;

    /// Category this renderer is registered under
    fn category(&self) -> Category;

    /// Last-chance veto on content the detector routed here
    fn can_handle(&self, _text: &str) -> bool {
        true
    }

    /// Render a complete message
    async fn render(&self, text: &str, metadata: &Metadata) -> Result<O>;

    /// Render one streamed fragment into the sink
    ///
    /// The default appends the raw fragment text.
    fn render_fragment(&self, fragment: &StreamFragment, sink: &dyn RenderSink) -> Result<()> {
        sink.append(&fragment.content);
        Ok(())
    }

    /// Called once after the last fragment, or after a one-shot render
    async fn finalize(&self, _sink: &dyn RenderSink) -> Result<()> {
        Ok(())
    }
}

/// Fallback renderer: hands the text through unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextRenderer;

#[async_trait]
impl<O> Renderer<O> for PlainTextRenderer
where
    O: From<String> + Send + 'static,
{
    fn name(&self) -> &str {
        "plain_text"
    }

    fn category(&self) -> Category {
        Category::Markdown
    }

    async fn render(&self, text: &str, _metadata: &Metadata) -> Result<O> {
        Ok(O::from(text.to_string()))
    }
}
