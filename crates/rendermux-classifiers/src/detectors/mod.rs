//! Rule matchers, one module per content family

pub mod art;
pub mod config_doc;
pub mod diagram;
pub mod fence;
pub mod link;
pub mod literal;
pub mod markup;
pub mod math;
pub mod media;
pub mod patch;
pub mod query;
pub mod structured;
pub mod tabular;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::DetectionConfig;
    use crate::patterns::Patterns;
    use crate::rules::{Matcher, RuleContext, RuleMatch};
    use rendermux_core::OriginHint;

    fn run(raw: &str, origin: Option<OriginHint>, matcher: Matcher) -> Option<RuleMatch> {
        let patterns = Patterns::new().unwrap();
        let config = DetectionConfig::default();
        let ctx = RuleContext {
            text: raw.trim(),
            raw,
            origin,
            patterns: &patterns,
            config: &config,
        };
        matcher(&ctx)
    }

    /// Run one matcher against `raw` with default thresholds
    pub fn with_ctx(raw: &str, matcher: Matcher) -> Option<RuleMatch> {
        run(raw, None, matcher)
    }

    /// Same as [`with_ctx`], with an origin hint
    pub fn with_origin(raw: &str, origin: OriginHint, matcher: Matcher) -> Option<RuleMatch> {
        run(raw, Some(origin), matcher)
    }
}
