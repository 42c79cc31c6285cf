//! Per-message render lifecycle
//!
//! The orchestrator classifies a sample, resolves its renderer and either
//! renders it in one shot or opens a stream. Every renderer stage runs
//! inside a fault boundary: errors and panics become a degraded outcome
//! carrying the raw text, never a failure of the pipeline itself.

use crate::hooks::{PostRenderHook, RenderedMessage};
use crate::registry::{RendererRegistry, SharedRenderer};
use crate::renderer::{BufferSink, RenderSink};
use futures::FutureExt;
use parking_lot::Mutex;
use rendermux_classifiers::Detector;
use rendermux_core::{
    preview, Category, ContentSample, DetectionResult, Error, Metadata, Result, Scheduler,
    StreamBufferManager, StreamConfig, StreamHandlers, StreamState,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

type HookList<O> = Vec<Arc<dyn PostRenderHook<O>>>;

/// Per-call rendering options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Open a stream instead of rendering in one shot
    #[serde(default)]
    pub streaming: bool,
}

impl RenderOptions {
    pub fn streaming() -> Self {
        Self { streaming: true }
    }
}

/// What the presentation layer should show
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutput<O> {
    /// Renderer output, untouched
    Rendered(O),

    /// Raw text substituted after a renderer fault
    Degraded(String),

    /// Output arrives through the stream handle
    Streaming,
}

impl<O> RenderOutput<O> {
    pub fn rendered(&self) -> Option<&O> {
        match self {
            Self::Rendered(output) => Some(output),
            _ => None,
        }
    }

    pub fn into_rendered(self) -> Option<O> {
        match self {
            Self::Rendered(output) => Some(output),
            _ => None,
        }
    }

    pub fn degraded(&self) -> Option<&str> {
        match self {
            Self::Degraded(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }
}

/// Result of [`Orchestrator::render_message`]
#[derive(Debug)]
pub struct RenderOutcome<O: 'static> {
    pub output: RenderOutput<O>,
    pub category: Category,

    /// Name of the renderer that was resolved, fallback included
    pub renderer_used: String,

    pub detection: DetectionResult,

    /// Present when streaming was requested
    pub stream: Option<StreamHandle<O>>,

    /// A renderer stage failed and `output` is degraded
    pub errored: bool,

    /// Message of the contained fault
    pub error: Option<String>,
}

/// Sequences detection, renderer lookup, rendering and hooks
pub struct Orchestrator<O: 'static> {
    detector: Arc<dyn Detector>,
    registry: Arc<RendererRegistry<O>>,
    scheduler: Arc<dyn Scheduler>,
    stream_config: StreamConfig,
    hooks: HookList<O>,
}

impl<O> Orchestrator<O>
where
    O: Send + Sync + 'static,
{
    /// Fails when `stream_config` is rejected by [`StreamConfig::validate`]
    pub fn new(
        detector: Arc<dyn Detector>,
        registry: Arc<RendererRegistry<O>>,
        scheduler: Arc<dyn Scheduler>,
        stream_config: StreamConfig,
    ) -> Result<Self> {
        stream_config.validate()?;

        Ok(Self {
            detector,
            registry,
            scheduler,
            stream_config,
            hooks: Vec::new(),
        })
    }

    /// Add a post-render hook; hooks run in registration order
    pub fn with_hook(mut self, hook: Arc<dyn PostRenderHook<O>>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn registry(&self) -> &Arc<RendererRegistry<O>> {
        &self.registry
    }

    pub fn stream_config(&self) -> &StreamConfig {
        &self.stream_config
    }

    /// Classify without rendering
    pub fn detect(&self, sample: &ContentSample) -> DetectionResult {
        self.detector.detect(sample)
    }

    /// Classify and render one message
    ///
    /// Never fails: renderer faults are logged and reported through
    /// [`RenderOutcome::errored`] with the raw text as output.
    pub async fn render_message(
        &self,
        sample: &ContentSample,
        options: RenderOptions,
    ) -> RenderOutcome<O> {
        let detection = self.detector.detect(sample);
        let category = detection.category;
        let renderer = self.registry.resolve(category, &detection.matched_text);
        let renderer_used = renderer.name().to_string();

        debug!(
            category = %category,
            renderer = %renderer_used,
            confidence = detection.confidence,
            streaming = options.streaming,
            "Rendering message"
        );

        if options.streaming {
            return self.streaming_outcome(detection, renderer, &sample.text, true);
        }

        match render_once(&renderer, &detection).await {
            Ok(output) => {
                {
                    let message = RenderedMessage {
                        category,
                        renderer: &renderer_used,
                        detection: &detection,
                        output: Some(&output),
                        content: &detection.matched_text,
                    };
                    run_hooks(&self.hooks, &message).await;
                }

                RenderOutcome {
                    output: RenderOutput::Rendered(output),
                    category,
                    renderer_used,
                    detection,
                    stream: None,
                    errored: false,
                    error: None,
                }
            }
            Err(err) => {
                report_fault(category, &renderer_used, "render", &sample.text, &err);
                RenderOutcome {
                    output: RenderOutput::Degraded(sample.text.clone()),
                    category,
                    renderer_used,
                    detection,
                    stream: None,
                    errored: true,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Classify `sample` and open an empty render stream for it
    ///
    /// The caller pushes every fragment, including the first. Use this when
    /// the text to classify is already known but should still reach the
    /// renderer incrementally.
    pub fn stream_message(&self, sample: &ContentSample) -> RenderOutcome<O> {
        let detection = self.detector.detect(sample);
        let renderer = self.registry.resolve(detection.category, &detection.matched_text);

        debug!(
            category = %detection.category,
            renderer = renderer.name(),
            confidence = detection.confidence,
            "Streaming message"
        );

        self.streaming_outcome(detection, renderer, &sample.text, false)
    }

    /// Open a stream for `text`, pushing it as the first fragment when `seed`
    fn streaming_outcome(
        &self,
        detection: DetectionResult,
        renderer: SharedRenderer<O>,
        text: &str,
        seed: bool,
    ) -> RenderOutcome<O> {
        let category = detection.category;
        let renderer_used = renderer.name().to_string();
        let seed = if seed { Some(text) } else { None };

        match self.open_stream(seed, &detection, renderer) {
            Ok(stream) => RenderOutcome {
                output: RenderOutput::Streaming,
                category,
                renderer_used,
                detection,
                stream: Some(stream),
                errored: false,
                error: None,
            },
            Err(err) => {
                report_fault(category, &renderer_used, "stream", text, &err);
                RenderOutcome {
                    output: RenderOutput::Degraded(text.to_string()),
                    category,
                    renderer_used,
                    detection,
                    stream: None,
                    errored: true,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    fn open_stream(
        &self,
        seed: Option<&str>,
        detection: &DetectionResult,
        renderer: SharedRenderer<O>,
    ) -> Result<StreamHandle<O>> {
        let sink = BufferSink::new();
        let faults = Arc::new(FaultState::default());
        let category = detection.category;

        let handlers = {
            let renderer = renderer.clone();
            let sink = sink.clone();
            let faults = faults.clone();

            StreamHandlers::new()
                .on_fragment(move |fragment| {
                    let attempt = std::panic::catch_unwind(AssertUnwindSafe(|| {
                        renderer.render_fragment(fragment, &sink)
                    }));
                    let err = match attempt {
                        Ok(Ok(())) => return,
                        Ok(Err(err)) => err,
                        Err(panic) => Error::renderer(format!(
                            "fragment renderer panicked: {}",
                            panic_message(panic.as_ref())
                        )),
                    };
                    report_fault(category, renderer.name(), "fragment", &fragment.content, &err);
                    faults.record(&err);
                })
                .on_error(move |err| {
                    debug!(category = %category, error = %err, "Render stream closed by producer");
                })
        };

        let manager =
            StreamBufferManager::new(self.stream_config.clone(), handlers, self.scheduler.clone())?;
        manager.start();
        if let Some(seed) = seed.filter(|s| !s.is_empty()) {
            manager.push(seed, None);
        }

        debug!(
            stream_id = %manager.stream_id(),
            category = %category,
            renderer = renderer.name(),
            "Opened render stream"
        );

        Ok(StreamHandle {
            manager,
            sink,
            renderer,
            hooks: Arc::new(self.hooks.clone()),
            detection: Arc::new(detection.clone()),
            faults,
        })
    }
}

#[derive(Debug, Default)]
struct FaultState {
    errored: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl FaultState {
    fn record(&self, err: &Error) {
        self.errored.store(true, Ordering::SeqCst);
        *self.last_error.lock() = Some(err.to_string());
    }
}

/// Final state of a stream after [`StreamHandle::complete`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub stream_id: Uuid,
    pub state: StreamState,

    /// Everything pushed, regardless of merging
    pub content: String,

    /// What the renderer wrote into its sink
    pub rendered: String,

    pub errored: bool,
    pub error: Option<String>,
}

/// Caller-side control of one render stream
///
/// Wraps the buffer manager and the sink the renderer writes fragments
/// into. Cloning yields another handle to the same stream.
pub struct StreamHandle<O: 'static> {
    manager: StreamBufferManager,
    sink: BufferSink,
    renderer: SharedRenderer<O>,
    hooks: Arc<HookList<O>>,
    detection: Arc<DetectionResult>,
    faults: Arc<FaultState>,
}

impl<O> StreamHandle<O>
where
    O: Send + Sync + 'static,
{
    /// Push more content; `false` once the stream no longer accepts input
    pub fn push(&self, content: impl Into<String>) -> bool {
        self.manager.push(content, None)
    }

    pub fn push_with_metadata(&self, content: impl Into<String>, metadata: Metadata) -> bool {
        self.manager.push(content, Some(metadata))
    }

    pub fn pause(&self) -> bool {
        self.manager.pause()
    }

    pub fn resume(&self) -> bool {
        self.manager.resume()
    }

    /// Terminate the stream with a producer error
    pub fn fail(&self, err: Error) -> bool {
        self.manager.error(err)
    }

    pub fn state(&self) -> StreamState {
        self.manager.state()
    }

    pub fn full_content(&self) -> String {
        self.manager.full_content()
    }

    /// Rendered text written so far
    pub fn sink_content(&self) -> String {
        self.sink.content()
    }

    /// Whether a fragment or finalize stage faulted
    pub fn errored(&self) -> bool {
        self.faults.errored.load(Ordering::SeqCst)
    }

    pub fn error(&self) -> Option<String> {
        self.faults.last_error.lock().clone()
    }

    pub fn stream_id(&self) -> Uuid {
        self.manager.stream_id()
    }

    pub fn category(&self) -> Category {
        self.detection.category
    }

    pub fn renderer_name(&self) -> &str {
        self.renderer.name()
    }

    /// Flush everything, finalize the renderer and run hooks
    ///
    /// Calling this on a stream that already ended only reports its state.
    pub async fn complete(&self) -> StreamSummary {
        if self.close().await {
            let finalized = AssertUnwindSafe(self.renderer.finalize(&self.sink))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(Error::renderer(format!(
                        "finalize panicked: {}",
                        panic_message(panic.as_ref())
                    )))
                });

            if let Err(err) = finalized {
                report_fault(
                    self.detection.category,
                    self.renderer.name(),
                    "finalize",
                    &self.manager.full_content(),
                    &err,
                );
                self.faults.record(&err);
            }

            if !self.errored() {
                let content = self.manager.full_content();
                let message = RenderedMessage {
                    category: self.detection.category,
                    renderer: self.renderer.name(),
                    detection: &self.detection,
                    output: None,
                    content: &content,
                };
                run_hooks(&self.hooks, &message).await;
            }
        }

        self.summary()
    }

    /// Complete the manager without parking the async worker
    ///
    /// The manager waits for a delivery in flight on another thread, so on a
    /// runtime the wait moves to the blocking pool.
    async fn close(&self) -> bool {
        let manager = self.manager.clone();
        if tokio::runtime::Handle::try_current().is_err() {
            return manager.complete();
        }

        match tokio::task::spawn_blocking(move || manager.complete()).await {
            Ok(closed) => closed,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => {
                warn!(
                    stream_id = %self.stream_id(),
                    error = %err,
                    "Stream completion was cancelled"
                );
                false
            }
        }
    }

    pub fn summary(&self) -> StreamSummary {
        StreamSummary {
            stream_id: self.stream_id(),
            state: self.state(),
            content: self.full_content(),
            rendered: self.sink_content(),
            errored: self.errored(),
            error: self.error(),
        }
    }
}

impl<O: 'static> Clone for StreamHandle<O> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            sink: self.sink.clone(),
            renderer: self.renderer.clone(),
            hooks: self.hooks.clone(),
            detection: self.detection.clone(),
            faults: self.faults.clone(),
        }
    }
}

impl<O: 'static> std::fmt::Debug for StreamHandle<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("stream_id", &self.manager.stream_id())
            .field("state", &self.manager.state())
            .field("category", &self.detection.category)
            .field("renderer", &self.renderer.name())
            .field("errored", &self.faults.errored.load(Ordering::SeqCst))
            .finish()
    }
}

/// Render and finalize inside one fault boundary
async fn render_once<O>(renderer: &SharedRenderer<O>, detection: &DetectionResult) -> Result<O>
where
    O: Send + 'static,
{
    let sink = BufferSink::new();
    AssertUnwindSafe(async {
        let output = renderer
            .render(&detection.matched_text, &detection.metadata)
            .await?;
        renderer.finalize(&sink).await?;
        Ok::<_, Error>(output)
    })
    .catch_unwind()
    .await
    .unwrap_or_else(|panic| {
        Err(Error::renderer(format!(
            "renderer panicked: {}",
            panic_message(panic.as_ref())
        )))
    })
}

async fn run_hooks<O>(hooks: &[Arc<dyn PostRenderHook<O>>], message: &RenderedMessage<'_, O>)
where
    O: Send + Sync,
{
    for hook in hooks {
        let result = AssertUnwindSafe(hook.after_render(message))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(Error::internal(format!(
                    "hook panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });

        if let Err(err) = result {
            warn!(
                hook = hook.name(),
                category = %message.category,
                error = %err,
                "Post-render hook failed"
            );
        }
    }
}

fn report_fault(category: Category, renderer: &str, stage: &str, content: &str, err: &Error) {
    error!(
        category = %category,
        renderer,
        stage,
        preview = %preview(content, 40),
        error = %err,
        "Renderer fault contained"
    );
    metrics::counter!("rendermux_renderer_faults_total", "category" => category.as_str())
        .increment(1);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
