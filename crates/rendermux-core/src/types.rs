//! Core types for rendermux

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Free-form metadata attached to detections and fragments
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Closed set of content categories a message can be classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Structured text; the fallback category
    Markdown,
    /// Source code (fenced, or markup flagged executable)
    Code,
    /// LaTeX-style math
    Math,
    /// HTML / SVG markup rendered directly
    Markup,
    /// Mermaid diagrams
    Mermaid,
    /// PlantUML and graphviz diagrams
    PlantUml,
    /// JSON object or array
    Json,
    /// Self-describing documents (XML declarations, schema-tagged JSON)
    StructuredDoc,
    /// Delimiter separated rows
    Tabular,
    Image,
    Video,
    Audio,
    /// Office documents and PDFs
    Document,
    /// Unified diffs
    Patch,
    /// YAML / TOML / INI
    ConfigDoc,
    /// GraphQL SDL and SQL DDL
    QuerySchema,
    /// SQL statements and GraphQL operations
    QueryLanguage,
    /// Regex literal
    PatternRule,
    /// ASCII / box-drawing art
    Art,
    /// Colour value
    Swatch,
    /// Bare URL or markdown link
    Link,
}

impl Category {
    /// Every category, in declaration order
    pub const ALL: [Category; 21] = [
        Self::Markdown,
        Self::Code,
        Self::Math,
        Self::Markup,
        Self::Mermaid,
        Self::PlantUml,
        Self::Json,
        Self::StructuredDoc,
        Self::Tabular,
        Self::Image,
        Self::Video,
        Self::Audio,
        Self::Document,
        Self::Patch,
        Self::ConfigDoc,
        Self::QuerySchema,
        Self::QueryLanguage,
        Self::PatternRule,
        Self::Art,
        Self::Swatch,
        Self::Link,
    ];

    /// Stable identifier, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Code => "code",
            Self::Math => "math",
            Self::Markup => "markup",
            Self::Mermaid => "mermaid",
            Self::PlantUml => "plant_uml",
            Self::Json => "json",
            Self::StructuredDoc => "structured_doc",
            Self::Tabular => "tabular",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Patch => "patch",
            Self::ConfigDoc => "config_doc",
            Self::QuerySchema => "query_schema",
            Self::QueryLanguage => "query_language",
            Self::PatternRule => "pattern_rule",
            Self::Art => "art",
            Self::Swatch => "swatch",
            Self::Link => "link",
        }
    }

    /// Whether this is one of the media categories resolved by URL
    pub fn is_media(&self) -> bool {
        matches!(self, Self::Image | Self::Video | Self::Audio | Self::Document)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a message came from
///
/// Content typed by the local user is trusted; generated content is not,
/// which changes how markup is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginHint {
    User,
    Assistant,
}

impl OriginHint {
    /// Whether markup from this origin may be rendered directly
    pub fn is_trusted(&self) -> bool {
        matches!(self, Self::User)
    }
}

/// Immutable input to classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSample {
    /// Raw message text
    pub text: String,

    /// Optional origin of the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<OriginHint>,
}

impl ContentSample {
    /// Create a sample without an origin hint
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: None,
        }
    }

    /// Create a sample typed by the local user
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text).with_origin(OriginHint::User)
    }

    /// Create a sample produced by an assistant
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(text).with_origin(OriginHint::Assistant)
    }

    /// Attach an origin hint
    pub fn with_origin(mut self, origin: OriginHint) -> Self {
        self.origin = Some(origin);
        self
    }
}

/// Outcome of classifying one sample. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Detected category
    pub category: Category,

    /// Confidence score (0.0-1.0); informational only
    pub confidence: f32,

    /// Extracted metadata (language, attributes, delimiter, ...)
    pub metadata: Metadata,

    /// Exact substring of the sample the decision applies to
    pub matched_text: String,

    /// Name of the rule that produced this result
    pub rule: String,

    /// Classification latency in microseconds
    #[serde(default)]
    pub latency_us: u64,
}

impl DetectionResult {
    /// Create a result
    ///
    /// Confidence is clamped to `[0, 1]` and forced to zero when there is no
    /// matched text.
    pub fn new(
        category: Category,
        confidence: f32,
        matched_text: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        let matched_text = matched_text.into();
        let confidence = if matched_text.is_empty() || confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };

        Self {
            category,
            confidence,
            metadata: Metadata::new(),
            matched_text,
            rule: rule.into(),
            latency_us: 0,
        }
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Look up a string metadata value
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// Look up a boolean metadata value
    pub fn meta_bool(&self, key: &str) -> Option<bool> {
        self.metadata.get(key).and_then(|v| v.as_bool())
    }
}

/// One unit of streamed content
#[derive(Debug, Clone, PartialEq)]
pub struct StreamFragment {
    /// Text content
    pub content: String,

    /// Sequence number assigned by the buffer manager
    pub sequence: u64,

    /// When the fragment was pushed
    pub arrived_at: Instant,

    /// Caller metadata; merged fragments carry `merged` and `count`
    pub metadata: Option<Metadata>,
}

impl StreamFragment {
    /// Whether this fragment is the coalescence of several pushes
    pub fn is_merged(&self) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("merged"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Number of pushed fragments this fragment represents
    pub fn merged_count(&self) -> usize {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("count"))
            .and_then(|v| v.as_u64())
            .map(|c| c as usize)
            .unwrap_or(1)
    }
}

/// Lifecycle state of one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    Idle,
    Active,
    Paused,
    Complete,
    Error,
}

impl StreamState {
    /// Terminal states accept no further input
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// Whether `self -> to` is a legal transition
    ///
    /// Transitions only move forward, except `Active <-> Paused`.
    pub fn can_transition_to(&self, to: StreamState) -> bool {
        use StreamState::*;
        matches!(
            (self, to),
            (Idle, Active)
                | (Active, Paused)
                | (Paused, Active)
                | (Active, Complete)
                | (Paused, Complete)
                | (Idle, Error)
                | (Active, Error)
                | (Paused, Error)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shorten text for log lines
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}…", head.replace('\n', "⏎"))
    } else {
        head.replace('\n', "⏎")
    }
}
