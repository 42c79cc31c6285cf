//! Detector trait and the rule-table classifier

use crate::config::DetectionConfig;
use crate::patterns::Patterns;
use crate::rules::{RuleContext, RuleScope, RuleTable};
use rendermux_core::{preview, Category, ContentSample, DetectionResult, Result};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, trace};

/// Anything that can assign a category to a sample
///
/// Detection is pure and synchronous: it never fails and never blocks, so
/// callers can run it inline on every message.
pub trait Detector: Send + Sync {
    /// Classify the sample. Always returns a result; unknown content falls
    /// back to [`Category::Markdown`].
    fn detect(&self, sample: &ContentSample) -> DetectionResult;

    /// Detector name
    fn name(&self) -> &str;
}

/// Classifier that walks an ordered rule table
pub struct ContentClassifier {
    config: DetectionConfig,
    patterns: Patterns,
    table: RuleTable,
}

impl ContentClassifier {
    /// Build a classifier, compiling all patterns up front
    pub fn new(config: DetectionConfig) -> Result<Self> {
        config.validate()?;
        let patterns = Patterns::new()?;
        let table = RuleTable::for_config(&config);

        debug!(
            rules = table.len(),
            disabled = config.disabled_rules.len(),
            "Built content classifier"
        );

        Ok(Self {
            config,
            patterns,
            table,
        })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleTable {
        &self.table
    }

    fn evaluate(&self, sample: &ContentSample, text: &str) -> DetectionResult {
        let ctx = RuleContext {
            text,
            raw: &sample.text,
            origin: sample.origin,
            patterns: &self.patterns,
            config: &self.config,
        };

        let mut embedded: Vec<Category> = Vec::new();

        for rule in self.table.rules() {
            let Some(found) = (rule.matcher)(&ctx) else {
                continue;
            };

            if !found.spans_whole(text.len()) {
                trace!(
                    rule = rule.name,
                    category = %found.category,
                    start = found.span.start,
                    end = found.span.end,
                    "Partial match, falling through"
                );
                if rule.scope == RuleScope::Embeddable && !embedded.contains(&found.category) {
                    embedded.push(found.category);
                }
                continue;
            }

            let matched = match found.matched {
                Some(matched) => matched,
                None => match text.get(found.content.clone()) {
                    Some(slice) => slice.to_string(),
                    None => continue,
                },
            };
            if matched.trim().is_empty() {
                continue;
            }

            return DetectionResult::new(found.category, found.confidence, matched, rule.name)
                .with_metadata(found.metadata);
        }

        let mut result = DetectionResult::new(Category::Markdown, 0.5, text, "fallback");
        if !embedded.is_empty() {
            let names: Vec<Value> = embedded.iter().map(|c| Value::from(c.as_str())).collect();
            result.metadata.insert("embedded".into(), Value::Array(names));
        }
        result
    }
}

impl Default for ContentClassifier {
    fn default() -> Self {
        Self::new(DetectionConfig::default()).expect("built-in detection patterns compile")
    }
}

impl Detector for ContentClassifier {
    fn detect(&self, sample: &ContentSample) -> DetectionResult {
        let start = Instant::now();
        let text = sample.text.trim();

        let mut result = if text.is_empty() {
            DetectionResult::new(Category::Markdown, 0.0, "", "fallback")
        } else if sample.text.len() > self.config.max_sample_bytes {
            debug!(
                bytes = sample.text.len(),
                limit = self.config.max_sample_bytes,
                "Sample too large for rule evaluation"
            );
            let mut result = DetectionResult::new(Category::Markdown, 0.5, text, "fallback");
            result.metadata.insert("oversized".into(), Value::Bool(true));
            result
        } else {
            self.evaluate(sample, text)
        };

        result.latency_us = start.elapsed().as_micros() as u64;

        metrics::counter!("rendermux_detections_total", "category" => result.category.as_str())
            .increment(1);
        metrics::histogram!("rendermux_detection_latency_us").record(result.latency_us as f64);

        debug!(
            category = %result.category,
            rule = %result.rule,
            confidence = result.confidence,
            latency_us = result.latency_us,
            preview = %preview(text, 40),
            "Classified sample"
        );

        result
    }

    fn name(&self) -> &str {
        "content"
    }
}
