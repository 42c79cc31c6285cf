//! Best-effort side effects that run after a render is committed
//!
//! Hooks see the detection and, for one-shot renders, the renderer output.
//! A failing hook is logged and ignored; it never changes the outcome.

use async_trait::async_trait;
use parking_lot::RwLock;
use rendermux_core::{Category, DetectionResult, Error, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// What a hook gets to look at
#[derive(Debug)]
pub struct RenderedMessage<'a, O> {
    pub category: Category,

    /// Name of the renderer that produced the output
    pub renderer: &'a str,

    pub detection: &'a DetectionResult,

    /// Renderer output; `None` for completed streams
    pub output: Option<&'a O>,

    /// Text that was rendered (the accumulated content for streams)
    pub content: &'a str,
}

/// Side effect run after a successful render
#[async_trait]
pub trait PostRenderHook<O>: Send + Sync {
    /// Hook name for logs
    fn name(&self) -> &str;

    async fn after_render(&self, message: &RenderedMessage<'_, O>) -> Result<()>;
}

/// Hook built from a closure
pub struct FnHook<F> {
    name: String,
    f: F,
}

impl<F> FnHook<F> {
    pub fn new<O>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RenderedMessage<'_, O>) -> Result<()> + Send + Sync,
    {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<O, F> PostRenderHook<O> for FnHook<F>
where
    O: Send + Sync,
    F: Fn(&RenderedMessage<'_, O>) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn after_render(&self, message: &RenderedMessage<'_, O>) -> Result<()> {
        (self.f)(message)
    }
}

/// Remembers the most recent colour swatch so the UI can derive a theme
#[derive(Debug, Clone, Default)]
pub struct ThemeColorHook {
    latest: Arc<RwLock<Option<String>>>,
}

impl ThemeColorHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last normalized `#rrggbb[aa]` colour seen
    pub fn latest(&self) -> Option<String> {
        self.latest.read().clone()
    }
}

#[async_trait]
impl<O: Send + Sync> PostRenderHook<O> for ThemeColorHook {
    fn name(&self) -> &str {
        "theme_color"
    }

    async fn after_render(&self, message: &RenderedMessage<'_, O>) -> Result<()> {
        if message.category != Category::Swatch {
            return Ok(());
        }

        let color = message
            .detection
            .meta_str("normalized")
            .ok_or_else(|| Error::renderer("swatch detection has no normalized colour"))?;

        debug!(color, "Theme colour updated");
        *self.latest.write() = Some(color.to_string());
        Ok(())
    }
}

/// Media reference queued for deferred loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRequest {
    pub category: Category,
    pub url: String,
}

/// Queues image, video, audio and document URLs for a loader task
///
/// The receiving half is returned from [`MediaQueueHook::channel`]; once it is
/// dropped the hook starts failing, which the orchestrator only logs.
#[derive(Debug, Clone)]
pub struct MediaQueueHook {
    sender: mpsc::UnboundedSender<MediaRequest>,
}

impl MediaQueueHook {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MediaRequest>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl<O: Send + Sync> PostRenderHook<O> for MediaQueueHook {
    fn name(&self) -> &str {
        "media_queue"
    }

    async fn after_render(&self, message: &RenderedMessage<'_, O>) -> Result<()> {
        if !message.category.is_media() {
            return Ok(());
        }

        let url = message
            .detection
            .meta_str("url")
            .unwrap_or(message.detection.matched_text.as_str())
            .to_string();

        self.sender
            .send(MediaRequest {
                category: message.category,
                url,
            })
            .map_err(|_| Error::renderer("media loader is gone"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn detection(category: Category, text: &str, meta: &[(&str, &str)]) -> DetectionResult {
        let mut metadata = rendermux_core::Metadata::new();
        for (k, v) in meta {
            metadata.insert((*k).to_string(), Value::from(*v));
        }
        DetectionResult::new(category, 0.9, text, "test").with_metadata(metadata)
    }

    fn message<'a>(detection: &'a DetectionResult) -> RenderedMessage<'a, String> {
        RenderedMessage {
            category: detection.category,
            renderer: "test",
            detection,
            output: None,
            content: &detection.matched_text,
        }
    }

    #[tokio::test]
    async fn test_theme_color_records_swatch() {
        let hook = ThemeColorHook::new();
        let swatch = detection(Category::Swatch, "#FF8800", &[("normalized", "#ff8800")]);

        PostRenderHook::<String>::after_render(&hook, &message(&swatch))
            .await
            .unwrap();
        assert_eq!(hook.latest().as_deref(), Some("#ff8800"));
    }

    #[tokio::test]
    async fn test_theme_color_ignores_other_categories() {
        let hook = ThemeColorHook::new();
        let json = detection(Category::Json, "{}", &[]);

        PostRenderHook::<String>::after_render(&hook, &message(&json))
            .await
            .unwrap();
        assert!(hook.latest().is_none());
    }

    #[tokio::test]
    async fn test_theme_color_missing_value_fails() {
        let hook = ThemeColorHook::new();
        let swatch = detection(Category::Swatch, "#ff8800", &[]);

        let result = PostRenderHook::<String>::after_render(&hook, &message(&swatch)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_media_queue() {
        let (hook, mut rx) = MediaQueueHook::channel();
        let image = detection(
            Category::Image,
            "![cat](cat.png)",
            &[("url", "cat.png")],
        );

        PostRenderHook::<String>::after_render(&hook, &message(&image))
            .await
            .unwrap();
        let request = rx.recv().await.unwrap();
        assert_eq!(request.category, Category::Image);
        assert_eq!(request.url, "cat.png");

        drop(rx);
        let result = PostRenderHook::<String>::after_render(&hook, &message(&image)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fn_hook() {
        let hook = FnHook::new("reject_json", |m: &RenderedMessage<'_, String>| {
            if m.category == Category::Json {
                Err(Error::renderer("no json"))
            } else {
                Ok(())
            }
        });

        let json = detection(Category::Json, "{}", &[]);
        let link = detection(Category::Link, "https://docs.rs", &[]);
        assert!(hook.after_render(&message(&json)).await.is_err());
        assert!(hook.after_render(&message(&link)).await.is_ok());
        assert_eq!(PostRenderHook::<String>::name(&hook), "reject_json");
    }
}
