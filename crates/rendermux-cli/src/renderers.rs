//! Terminal renderers
//!
//! Plain `String` output, so the CLI can print whatever the orchestrator
//! hands back. Categories without a renderer here fall back to plain text.

use async_trait::async_trait;
use rendermux_classifiers::detectors::tabular::split_cells;
use rendermux_core::{Category, Error, Metadata, Result};
use rendermux_render::{RendererRegistry, Renderer};
use serde_json::Value;
use std::sync::Arc;

/// Registry with every terminal renderer registered
pub fn terminal_registry() -> RendererRegistry<String> {
    let registry = RendererRegistry::<String>::new();
    registry.register(Arc::new(CodeRenderer));
    registry.register(Arc::new(JsonRenderer));
    registry.register(Arc::new(TableRenderer));
    registry.register(Arc::new(SwatchRenderer));
    registry.register(Arc::new(LinkRenderer));
    for category in [Category::Image, Category::Video, Category::Audio, Category::Document] {
        registry.register(Arc::new(MediaRenderer::new(category)));
    }
    registry
}

/// Source code with a language header and line numbers
///
/// Highlighted lines are marked with `>`.
pub struct CodeRenderer;

#[async_trait]
impl Renderer<String> for CodeRenderer {
    fn name(&self) -> &str {
        "code"
    }

    fn category(&self) -> Category {
        Category::Code
    }

    async fn render(&self, text: &str, metadata: &Metadata) -> Result<String> {
        let language = metadata
            .get("language")
            .and_then(Value::as_str)
            .unwrap_or("text");
        let start = metadata.get("startLine").and_then(Value::as_u64).unwrap_or(1);
        let highlighted: Vec<u64> = metadata
            .get("highlightLines")
            .and_then(Value::as_array)
            .map(|lines| lines.iter().filter_map(Value::as_u64).collect())
            .unwrap_or_default();

        let mut out = match metadata.get("filename").and_then(Value::as_str) {
            Some(filename) => format!("── {} ({}) ──\n", filename, language),
            None => format!("── {} ──\n", language),
        };

        let last = start + text.lines().count() as u64;
        let width = last.to_string().len();
        for (offset, line) in text.lines().enumerate() {
            let number = start + offset as u64;
            let marker = if highlighted.contains(&number) { '>' } else { ' ' };
            out.push_str(&format!("{}{:>width$} │ {}\n", marker, number, line, width = width));
        }
        Ok(out)
    }
}

/// Pretty-printed JSON
pub struct JsonRenderer;

#[async_trait]
impl Renderer<String> for JsonRenderer {
    fn name(&self) -> &str {
        "json"
    }

    fn category(&self) -> Category {
        Category::Json
    }

    async fn render(&self, text: &str, _metadata: &Metadata) -> Result<String> {
        let value: Value = serde_json::from_str(text)?;
        Ok(serde_json::to_string_pretty(&value)?)
    }
}

/// Delimited rows laid out as aligned columns
pub struct TableRenderer;

#[async_trait]
impl Renderer<String> for TableRenderer {
    fn name(&self) -> &str {
        "table"
    }

    fn category(&self) -> Category {
        Category::Tabular
    }

    async fn render(&self, text: &str, metadata: &Metadata) -> Result<String> {
        let delimiter = metadata
            .get("delimiter")
            .and_then(Value::as_str)
            .and_then(|d| d.chars().next())
            .ok_or_else(|| Error::renderer("tabular detection without a delimiter"))?;

        let rows: Vec<Vec<&str>> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| {
                let l = if delimiter == '|' { l.trim_matches('|') } else { l };
                split_cells(l, delimiter)
                    .into_iter()
                    .map(|c| c.trim().trim_matches('"'))
                    .collect()
            })
            .collect();

        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut widths = vec![0usize; columns];
        for row in &rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let header = metadata
            .get("header")
            .and_then(Value::as_array)
            .is_some_and(|cells| !cells.is_empty());
        let mut out = String::new();
        for (index, row) in rows.iter().enumerate() {
            let cells: Vec<String> = (0..columns)
                .map(|i| {
                    let cell = row.get(i).copied().unwrap_or("");
                    format!("{:<width$}", cell, width = widths[i])
                })
                .collect();
            out.push_str(cells.join(" │ ").trim_end());
            out.push('\n');

            if header && index == 0 {
                let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
                out.push_str(&rule.join("─┼─"));
                out.push('\n');
            }
        }
        Ok(out)
    }
}

/// Colour block in 24-bit ANSI followed by the normalized value
pub struct SwatchRenderer;

#[async_trait]
impl Renderer<String> for SwatchRenderer {
    fn name(&self) -> &str {
        "swatch"
    }

    fn category(&self) -> Category {
        Category::Swatch
    }

    async fn render(&self, text: &str, metadata: &Metadata) -> Result<String> {
        let hex = metadata
            .get("normalized")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::renderer("swatch without normalized colour"))?;

        let channel = |range: std::ops::Range<usize>| {
            hex.get(range)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| Error::renderer(format!("malformed colour {}", hex)))
        };
        let (r, g, b) = (channel(1..3)?, channel(3..5)?, channel(5..7)?);

        Ok(format!("\x1b[48;2;{};{};{}m    \x1b[0m {} ({})", r, g, b, hex, text))
    }
}

/// Link text with its target
pub struct LinkRenderer;

#[async_trait]
impl Renderer<String> for LinkRenderer {
    fn name(&self) -> &str {
        "link"
    }

    fn category(&self) -> Category {
        Category::Link
    }

    async fn render(&self, text: &str, metadata: &Metadata) -> Result<String> {
        let url = metadata.get("url").and_then(Value::as_str).unwrap_or(text);
        match metadata.get("text").and_then(Value::as_str) {
            Some(label) if label != url => Ok(format!("{} <{}>", label, url)),
            _ => Ok(format!("<{}>", url)),
        }
    }
}

/// One-line placeholder for media the terminal cannot show
pub struct MediaRenderer {
    category: Category,
}

impl MediaRenderer {
    pub fn new(category: Category) -> Self {
        Self { category }
    }
}

#[async_trait]
impl Renderer<String> for MediaRenderer {
    fn name(&self) -> &str {
        "media"
    }

    fn category(&self) -> Category {
        self.category
    }

    async fn render(&self, text: &str, metadata: &Metadata) -> Result<String> {
        let source = metadata
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_else(|| if text.starts_with("data:") { "inline data" } else { text });

        let mut out = format!("[{}: {}", self.category, source);
        if let Some(mime) = metadata.get("mime").and_then(Value::as_str) {
            out.push_str(&format!(", {}", mime));
        }
        if let Some(alt) = metadata.get("alt").and_then(Value::as_str).filter(|a| !a.is_empty()) {
            out.push_str(&format!(", \"{}\"", alt));
        }
        out.push(']');
        Ok(out)
    }
}
