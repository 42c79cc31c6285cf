//! Subcommand implementations
//!
//! Each command writes to a caller-supplied writer so it can be driven from
//! tests as well as from `main`.

use crate::config::RendermuxConfig;
use crate::renderers::terminal_registry;
use anyhow::Context;
use rendermux_classifiers::{ContentClassifier, Detector};
use rendermux_core::{Category, ContentSample, OriginHint, Scheduler, StreamState};
use rendermux_render::{Orchestrator, RenderOptions, RenderOutput, StreamSummary};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Read a whole file, or stdin for `-`
pub fn read_input(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input))
    }
}

pub fn sample(text: String, origin: Option<OriginHint>) -> ContentSample {
    let sample = ContentSample::new(text);
    match origin {
        Some(origin) => sample.with_origin(origin),
        None => sample,
    }
}

/// Orchestrator wired with the terminal renderers
pub fn build_orchestrator(
    config: &RendermuxConfig,
    scheduler: Arc<dyn Scheduler>,
) -> anyhow::Result<Orchestrator<String>> {
    let classifier = ContentClassifier::new(config.detection.clone())?;
    Ok(Orchestrator::new(
        Arc::new(classifier),
        Arc::new(terminal_registry()),
        scheduler,
        config.streaming.clone(),
    )?)
}

/// `detect`: print the category, or the full result as JSON
pub fn detect(
    config: &RendermuxConfig,
    sample: &ContentSample,
    json: bool,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let classifier = ContentClassifier::new(config.detection.clone())?;
    let result = classifier.detect(sample);

    if json {
        serde_json::to_writer_pretty(&mut *out, &result)?;
        writeln!(out)?;
    } else {
        writeln!(
            out,
            "{}\t{:.2}\t{}",
            result.category, result.confidence, result.rule
        )?;
        for (key, value) in &result.metadata {
            writeln!(out, "  {}: {}", key, value)?;
        }
    }
    Ok(())
}

/// `render`: one-shot render; returns whether the renderer faulted
pub async fn render(
    orchestrator: &Orchestrator<String>,
    sample: &ContentSample,
    out: &mut impl Write,
) -> anyhow::Result<bool> {
    let outcome = orchestrator
        .render_message(sample, RenderOptions::default())
        .await;

    info!(
        category = %outcome.category,
        renderer = %outcome.renderer_used,
        errored = outcome.errored,
        "Rendered message"
    );

    match &outcome.output {
        RenderOutput::Rendered(text) => writeln!(out, "{}", text.trim_end())?,
        RenderOutput::Degraded(text) => {
            warn!(
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "Showing raw content"
            );
            writeln!(out, "{}", text.trim_end())?;
        }
        RenderOutput::Streaming => {}
    }

    Ok(outcome.errored)
}

/// Split into chunks of `size` characters
pub fn chunks(text: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

/// Result of a `stream` replay
#[derive(Debug, Clone)]
pub struct StreamReport {
    pub category: Category,
    pub renderer: String,
    pub summary: StreamSummary,
}

/// `stream`: replay `text` chunk by chunk, printing rendered output as it
/// leaves the buffer
///
/// The whole text is classified up front, so the renderer matches what a
/// one-shot `render` would pick.
pub async fn stream(
    orchestrator: &Orchestrator<String>,
    text: &str,
    origin: Option<OriginHint>,
    chunk_size: usize,
    delay: Duration,
    out: &mut impl Write,
) -> anyhow::Result<StreamReport> {
    let outcome = orchestrator.stream_message(&sample(text.to_string(), origin));
    let handle = outcome
        .stream
        .context("Orchestrator did not open a stream")?;

    info!(
        stream_id = %handle.stream_id(),
        category = %outcome.category,
        renderer = %outcome.renderer_used,
        "Streaming"
    );

    let mut printed = 0;
    for (i, part) in chunks(text, chunk_size).into_iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(delay).await;
        }
        if !handle.push(part) {
            break;
        }
        printed = print_new(&handle.sink_content(), printed, out)?;
    }

    let summary = handle.complete().await;
    print_new(&summary.rendered, printed, out)?;
    writeln!(out)?;

    if summary.state != StreamState::Complete {
        warn!(state = %summary.state, "Stream did not complete");
    }
    Ok(StreamReport {
        category: outcome.category,
        renderer: outcome.renderer_used,
        summary,
    })
}

fn print_new(content: &str, printed: usize, out: &mut impl Write) -> anyhow::Result<usize> {
    if let Some(fresh) = content.get(printed..) {
        if !fresh.is_empty() {
            write!(out, "{}", fresh)?;
            out.flush()?;
        }
    }
    Ok(content.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_respect_char_boundaries() {
        assert_eq!(chunks("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(chunks("héllo", 2), vec!["hé", "ll", "o"]);
        assert!(chunks("", 3).is_empty());
        assert_eq!(chunks("ab", 0), vec!["a", "b"]);
    }

    #[test]
    fn test_print_new_only_writes_delta() {
        let mut out = Vec::new();
        let printed = print_new("abc", 0, &mut out).unwrap();
        let printed = print_new("abcde", printed, &mut out).unwrap();
        assert_eq!(printed, 5);
        assert_eq!(String::from_utf8(out).unwrap(), "abcde");
    }

    #[test]
    fn test_sample_origin() {
        assert_eq!(sample("x".into(), None).origin, None);
        assert_eq!(
            sample("x".into(), Some(OriginHint::User)).origin,
            Some(OriginHint::User)
        );
    }
}
