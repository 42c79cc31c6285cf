//! Ordered rule table
//!
//! Each rule is a pure function over the trimmed sample. The classifier walks
//! the table in ascending priority and takes the first rule whose match covers
//! the whole sample. Rules marked [`RuleScope::Embeddable`] may also find their
//! construct inside surrounding prose; such partial matches are recorded and
//! skipped.

use crate::config::DetectionConfig;
use crate::detectors;
use crate::patterns::Patterns;
use rendermux_core::{Category, Metadata, OriginHint};
use serde_json::Value;
use std::ops::Range;
use tracing::warn;

/// How a rule looks at the sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    /// Evaluates the sample as one unit; a match always spans it entirely
    WholeSample,
    /// Searches for its construct anywhere; only whole-sample spans are accepted
    Embeddable,
}

/// Signature shared by all rule matchers
pub type Matcher = fn(&RuleContext<'_>) -> Option<RuleMatch>;

/// One entry of the rule table
#[derive(Clone, Copy)]
pub struct Rule {
    /// Lower runs first
    pub priority: u16,
    /// Stable name, reported in [`rendermux_core::DetectionResult::rule`]
    pub name: &'static str,
    pub scope: RuleScope,
    pub matcher: Matcher,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("priority", &self.priority)
            .field("name", &self.name)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Everything a matcher may read
pub struct RuleContext<'a> {
    /// Sample text with surrounding whitespace removed
    pub text: &'a str,
    /// Sample text before trimming
    pub raw: &'a str,
    pub origin: Option<OriginHint>,
    pub patterns: &'a Patterns,
    pub config: &'a DetectionConfig,
}

impl<'a> RuleContext<'a> {
    /// Non-blank lines of the trimmed text, without trailing `\r`
    pub fn lines(&self) -> Vec<&'a str> {
        self.text
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty())
            .collect()
    }

    /// The raw text with only blank lines and trailing whitespace removed,
    /// keeping the indentation of the first line
    pub fn block(&self) -> &'a str {
        let start = self
            .raw
            .char_indices()
            .take_while(|(_, c)| c.is_whitespace())
            .filter(|(_, c)| *c == '\n')
            .map(|(idx, _)| idx + 1)
            .last()
            .unwrap_or(0);
        self.raw[start..].trim_end()
    }

    /// Whether the markup should be treated as untrusted code
    pub fn untrusted(&self) -> bool {
        matches!(self.origin, Some(origin) if !origin.is_trusted())
    }
}

/// A rule's verdict
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub category: Category,
    pub confidence: f32,
    pub metadata: Metadata,
    /// Byte range of the whole construct within the trimmed text
    pub span: Range<usize>,
    /// Byte range of the part handed to renderers
    pub content: Range<usize>,
    /// Replacement for the matched text when it is not a slice of the trimmed text
    pub matched: Option<String>,
}

impl RuleMatch {
    /// A match covering the whole trimmed text
    pub fn whole(category: Category, confidence: f32, text: &str) -> Self {
        Self::spanning(category, confidence, 0..text.len())
    }

    /// A match over `span`, with the same content range
    pub fn spanning(category: Category, confidence: f32, span: Range<usize>) -> Self {
        Self {
            category,
            confidence,
            metadata: Metadata::new(),
            content: span.clone(),
            span,
            matched: None,
        }
    }

    pub fn with_content(mut self, content: Range<usize>) -> Self {
        self.content = content;
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_matched(mut self, matched: impl Into<String>) -> Self {
        self.matched = Some(matched.into());
        self
    }

    /// Whether the construct covers all of a text of length `len`
    pub fn spans_whole(&self, len: usize) -> bool {
        self.span.start == 0 && self.span.end == len
    }
}

/// The rules in evaluation order
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    /// The built-in table
    pub fn builtin() -> Self {
        use RuleScope::*;

        let mut rules = vec![
            rule(10, "diagram_block", Embeddable, detectors::diagram::diagram_block),
            rule(15, "diagram_keyword", WholeSample, detectors::diagram::diagram_keyword),
            rule(20, "fenced_block", Embeddable, detectors::fence::fenced_block),
            rule(30, "math_display", Embeddable, detectors::math::math_display),
            rule(31, "math_environment", Embeddable, detectors::math::math_environment),
            rule(32, "math_inline", Embeddable, detectors::math::math_inline),
            rule(40, "xml_declaration", WholeSample, detectors::markup::xml_declaration),
            rule(50, "markup", Embeddable, detectors::markup::markup),
            rule(60, "structured_object", WholeSample, detectors::structured::structured_object),
            rule(70, "tabular", WholeSample, detectors::tabular::tabular),
            rule(80, "media_markdown", Embeddable, detectors::media::media_markdown),
            rule(81, "media_url", WholeSample, detectors::media::media_url),
            rule(90, "config_doc", WholeSample, detectors::config_doc::config_doc),
            rule(100, "query_schema", WholeSample, detectors::query::query_schema),
            rule(101, "query_language", WholeSample, detectors::query::query_language),
            rule(110, "patch", WholeSample, detectors::patch::patch),
            rule(120, "pattern_rule", WholeSample, detectors::literal::pattern_rule),
            rule(130, "swatch", WholeSample, detectors::literal::swatch),
            rule(140, "link", Embeddable, detectors::link::link),
            rule(150, "art", WholeSample, detectors::art::art),
        ];
        rules.sort_by_key(|r| r.priority);

        Self { rules }
    }

    /// The built-in table minus the rules `config` switches off
    pub fn for_config(config: &DetectionConfig) -> Self {
        let mut table = Self::builtin();
        for name in &config.disabled_rules {
            if table.get(name).is_none() {
                warn!(rule = %name, "Disabled rule does not exist");
            }
        }
        table.rules.retain(|r| !config.is_disabled(r.name));
        table
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn rule(priority: u16, name: &'static str, scope: RuleScope, matcher: Matcher) -> Rule {
    Rule {
        priority,
        name,
        scope,
        matcher,
    }
}
