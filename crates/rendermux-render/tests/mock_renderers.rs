//! Mock renderers for testing
//!
//! Configurable implementations of the Renderer and PostRenderHook traits
//! for exercising the orchestrator's lookup, streaming and fault paths.

#![allow(dead_code)]

use async_trait::async_trait;
use rendermux_core::{Category, Error, Metadata, Result, StreamFragment};
use rendermux_render::{PostRenderHook, RenderSink, RenderedMessage, Renderer};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// A configurable mock renderer producing `String` output
pub struct MockRenderer {
    name: String,
    category: Category,
    prefix: String,
    accepts: bool,
    finalize_marker: Option<String>,
    simulated_latency: Option<Duration>,
    fragment_latency: Option<Duration>,
    call_count: AtomicU32,
    fragment_count: AtomicU32,
}

impl MockRenderer {
    /// Create a mock renderer bound to `category`
    pub fn new(name: &str, category: Category) -> Self {
        Self {
            name: name.to_string(),
            category,
            prefix: format!("[{}]", name),
            accepts: true,
            finalize_marker: None,
            simulated_latency: None,
            fragment_latency: None,
            call_count: AtomicU32::new(0),
            fragment_count: AtomicU32::new(0),
        }
    }

    /// Set the prefix prepended to rendered output
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// Decline every sample in `can_handle`
    pub fn declining(mut self) -> Self {
        self.accepts = false;
        self
    }

    /// Append `marker` to the sink on finalize
    pub fn with_finalize_marker(mut self, marker: &str) -> Self {
        self.finalize_marker = Some(marker.to_string());
        self
    }

    /// Set simulated latency for render
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.simulated_latency = Some(latency);
        self
    }

    /// Block the delivering thread for `latency` on every fragment
    pub fn with_fragment_latency(mut self, latency: Duration) -> Self {
        self.fragment_latency = Some(latency);
        self
    }

    /// Number of one-shot renders
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Number of fragments rendered
    pub fn fragment_count(&self) -> u32 {
        self.fragment_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Renderer<String> for MockRenderer {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Category {
        self.category
    }

    fn can_handle(&self, _text: &str) -> bool {
        self.accepts
    }

    async fn render(&self, text: &str, _metadata: &Metadata) -> Result<String> {
        self.call_count.fetch_add(1, Ordering::Relaxed);

        if let Some(latency) = self.simulated_latency {
            tokio::time::sleep(latency).await;
        }

        Ok(format!("{}{}", self.prefix, text))
    }

    fn render_fragment(&self, fragment: &StreamFragment, sink: &dyn RenderSink) -> Result<()> {
        self.fragment_count.fetch_add(1, Ordering::Relaxed);

        if let Some(latency) = self.fragment_latency {
            std::thread::sleep(latency);
        }

        sink.append(&fragment.content);
        Ok(())
    }

    async fn finalize(&self, sink: &dyn RenderSink) -> Result<()> {
        if let Some(marker) = &self.finalize_marker {
            sink.append(marker);
        }
        Ok(())
    }
}

/// Lifecycle stage a faulty renderer breaks in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Render,
    Fragment,
    Finalize,
}

/// A renderer that returns an error at one stage
pub struct FailingRenderer {
    name: String,
    category: Category,
    stage: Stage,
    error_message: String,
}

impl FailingRenderer {
    /// Fails in `render` by default
    pub fn new(name: &str, category: Category) -> Self {
        Self {
            name: name.to_string(),
            category,
            stage: Stage::Render,
            error_message: "Simulated renderer failure".to_string(),
        }
    }

    pub fn at(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    /// Set a custom error message
    pub fn with_error(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }
}

#[async_trait]
impl Renderer<String> for FailingRenderer {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Category {
        self.category
    }

    async fn render(&self, text: &str, _metadata: &Metadata) -> Result<String> {
        if self.stage == Stage::Render {
            return Err(Error::renderer(&self.error_message));
        }
        Ok(text.to_string())
    }

    fn render_fragment(&self, fragment: &StreamFragment, sink: &dyn RenderSink) -> Result<()> {
        // Only fragments marked BAD fail, so the rest of the stream still renders
        if self.stage == Stage::Fragment && fragment.content.contains("BAD") {
            return Err(Error::renderer(&self.error_message));
        }
        sink.append(&fragment.content);
        Ok(())
    }

    async fn finalize(&self, _sink: &dyn RenderSink) -> Result<()> {
        if self.stage == Stage::Finalize {
            return Err(Error::renderer(&self.error_message));
        }
        Ok(())
    }
}

/// A renderer that panics at one stage
pub struct PanickingRenderer {
    category: Category,
    stage: Stage,
}

impl PanickingRenderer {
    pub fn new(category: Category, stage: Stage) -> Self {
        Self { category, stage }
    }
}

#[async_trait]
impl Renderer<String> for PanickingRenderer {
    fn name(&self) -> &str {
        "panicking"
    }

    fn category(&self) -> Category {
        self.category
    }

    async fn render(&self, text: &str, _metadata: &Metadata) -> Result<String> {
        if self.stage == Stage::Render {
            panic!("render exploded on {:?}", text);
        }
        Ok(text.to_string())
    }

    fn render_fragment(&self, fragment: &StreamFragment, sink: &dyn RenderSink) -> Result<()> {
        if self.stage == Stage::Fragment {
            panic!("fragment {} exploded", fragment.sequence);
        }
        sink.append(&fragment.content);
        Ok(())
    }

    async fn finalize(&self, _sink: &dyn RenderSink) -> Result<()> {
        if self.stage == Stage::Finalize {
            panic!("finalize exploded");
        }
        Ok(())
    }
}

/// A hook that counts invocations and optionally fails
pub struct CountingHook {
    name: String,
    fail: bool,
    call_count: AtomicU32,
}

impl CountingHook {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: false,
            call_count: AtomicU32::new(0),
        }
    }

    /// Return an error from every invocation
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PostRenderHook<String> for CountingHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn after_render(&self, _message: &RenderedMessage<'_, String>) -> Result<()> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if self.fail {
            return Err(Error::internal("Simulated hook failure"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rendermux_render::BufferSink;
    use std::time::Instant;

    #[tokio::test]
    async fn test_mock_renderer_basic() {
        let renderer = MockRenderer::new("test", Category::Json).with_prefix("json:");

        let output = renderer.render("{}", &Metadata::new()).await.unwrap();
        assert_eq!(output, "json:{}");
        assert_eq!(renderer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_renderer() {
        let renderer = FailingRenderer::new("fail-test", Category::Json).with_error("Custom error");

        let result = renderer.render("{}", &Metadata::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_failing_fragment_only_on_marker() {
        let renderer = FailingRenderer::new("frag", Category::Code).at(Stage::Fragment);
        let sink = BufferSink::new();
        let fragment = |content: &str| StreamFragment {
            content: content.to_string(),
            sequence: 0,
            arrived_at: Instant::now(),
            metadata: None,
        };

        assert!(renderer.render_fragment(&fragment("ok"), &sink).is_ok());
        assert!(renderer.render_fragment(&fragment("BAD"), &sink).is_err());
        assert_eq!(sink.content(), "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_renderer_latency() {
        let renderer = MockRenderer::new("slow", Category::Code).with_latency(Duration::from_millis(10));

        let start = tokio::time::Instant::now();
        let _ = renderer.render("x", &Metadata::new()).await;

        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}
