//! ASCII and box-drawing art

use crate::rules::{RuleContext, RuleMatch};
use rendermux_core::Category;

fn is_box_drawing(c: char) -> bool {
    matches!(c, '\u{2500}'..='\u{257F}' | '\u{2580}'..='\u{259F}')
}

/// Rule: several lines made mostly of symbols
///
/// The matched text keeps the first line's indentation, since art is
/// positional.
pub fn art(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    let config = ctx.config;
    let block = ctx.block();
    let lines: Vec<&str> = block.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() < config.art_min_lines {
        return None;
    }

    let visible: Vec<char> = block.chars().filter(|c| !c.is_whitespace()).collect();
    if visible.is_empty() {
        return None;
    }

    let symbols = visible.iter().filter(|c| !c.is_alphanumeric()).count();
    let ratio = symbols as f32 / visible.len() as f32;
    if ratio < config.art_symbol_ratio {
        return None;
    }

    // A column of bullets or a single repeated rule is not art
    let mut distinct: Vec<char> = visible.iter().copied().filter(|c| !c.is_alphanumeric()).collect();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() < 2 {
        return None;
    }

    let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);

    Some(
        RuleMatch::whole(Category::Art, 0.7, ctx.text)
            .with_matched(block)
            .with_meta("width", width)
            .with_meta("height", lines.len())
            .with_meta("box_drawing", visible.iter().any(|&c| is_box_drawing(c))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::with_ctx;

    #[test]
    fn test_box() {
        let text = "┌──────┐\n│ box  │\n└──────┘";
        let m = with_ctx(text, art).unwrap();
        assert_eq!(m.category, Category::Art);
        assert_eq!(m.metadata["box_drawing"], true);
        assert_eq!(m.metadata["height"], 3);
    }

    #[test]
    fn test_indent_preserved() {
        let text = "\n   /\\_/\\\n  ( o.o )\n   > ^ <\n";
        let m = with_ctx(text, art).unwrap();
        assert_eq!(m.matched.as_deref(), Some("   /\\_/\\\n  ( o.o )\n   > ^ <"));
    }

    #[test]
    fn test_prose_is_not_art() {
        assert!(with_ctx("one line\ntwo lines\nthree lines", art).is_none());
    }

    #[test]
    fn test_too_short() {
        assert!(with_ctx("+--+\n+--+", art).is_none());
    }

    #[test]
    fn test_uniform_rule_is_not_art() {
        assert!(with_ctx("----\n----\n----", art).is_none());
    }
}
