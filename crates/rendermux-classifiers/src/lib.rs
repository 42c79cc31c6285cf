//! RenderMux Classifiers
//!
//! Decides what kind of content a chat message is, so the right renderer can
//! display it. Classification is a single pass over an ordered table of pure
//! rules:
//! - Delimited forms (fences, diagrams, math, markup) are found anywhere but
//!   only win when they cover the whole message
//! - Whole-message heuristics (JSON, tables, config, queries, diffs, literals)
//!   judge the message as one unit
//! - Anything unrecognised falls back to Markdown
//!
//! Detection never fails and never blocks.

pub mod classifier;
pub mod config;
pub mod detectors;
pub mod patterns;
pub mod rules;

pub use classifier::{ContentClassifier, Detector};
pub use config::DetectionConfig;
pub use detectors::fence::{category_for_tag, parse_attributes};
pub use patterns::Patterns;
pub use rules::{Matcher, Rule, RuleContext, RuleMatch, RuleScope, RuleTable};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::{ContentClassifier, Detector};
    pub use crate::config::DetectionConfig;
    pub use rendermux_core::{Category, ContentSample, DetectionResult, OriginHint};
}
