//! LaTeX math in its three delimiter families

use crate::rules::{RuleContext, RuleMatch};
use rendermux_core::Category;
use std::ops::Range;

const MATH_ENVIRONMENTS: &[&str] = &[
    "equation", "equation*", "align", "align*", "aligned", "alignat", "alignat*", "gather",
    "gather*", "gathered", "multline", "multline*", "split", "cases", "matrix", "pmatrix",
    "bmatrix", "Bmatrix", "vmatrix", "Vmatrix", "smallmatrix", "array", "eqnarray", "eqnarray*",
];

/// Byte range of `inner` with surrounding whitespace removed
fn trimmed_range(text: &str, inner: Range<usize>) -> Range<usize> {
    let slice = &text[inner.clone()];
    let lead = slice.len() - slice.trim_start().len();
    let trail = slice.len() - slice.trim_end().len();
    (inner.start + lead)..(inner.end - trail).max(inner.start + lead)
}

/// First `open ... close` pair, returning (span, trimmed inner)
fn delimited(text: &str, open: &str, close: &str) -> Option<(Range<usize>, Range<usize>)> {
    let start = text.find(open)?;
    let inner_start = start + open.len();
    let inner_end = inner_start + text[inner_start..].find(close)?;
    let content = trimmed_range(text, inner_start..inner_end);
    if content.is_empty() {
        return None;
    }
    Some((start..inner_end + close.len(), content))
}

/// Rule: `$$ ... $$` or `\[ ... \]`
pub fn math_display(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    let candidates = [
        delimited(ctx.text, "$$", "$$").map(|m| (m, "$$")),
        delimited(ctx.text, "\\[", "\\]").map(|m| (m, "\\[")),
    ];

    let ((span, content), delimiter) = candidates
        .into_iter()
        .flatten()
        .min_by_key(|((span, _), _)| span.start)?;

    Some(
        RuleMatch::spanning(Category::Math, 1.0, span)
            .with_content(content)
            .with_meta("display", true)
            .with_meta("delimiter", delimiter),
    )
}

/// Rule: `\begin{env} ... \end{env}` for math environments
pub fn math_environment(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    let caps = ctx.patterns.math_env_begin.captures(ctx.text)?;
    let begin = caps.get(0)?;
    let env = caps.get(1)?.as_str();
    if !MATH_ENVIRONMENTS.contains(&env) {
        return None;
    }

    let end_marker = format!("\\end{{{}}}", env);
    let end = begin.end() + ctx.text[begin.end()..].find(&end_marker)? + end_marker.len();

    // Renderers need the environment markers to lay out the block
    Some(
        RuleMatch::spanning(Category::Math, 0.95, begin.start()..end)
            .with_meta("display", true)
            .with_meta("environment", env),
    )
}

/// Rule: `$...$` or `\( ... \)`
///
/// Dollar pairs follow the pandoc convention: the content may not start or
/// end with whitespace and the closing `$` may not be followed by a digit, so
/// prices like `$5 and $10` stay prose.
pub fn math_inline(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    let dollar = inline_dollar(ctx.text).map(|m| (m, "$"));
    let paren = delimited(ctx.text, "\\(", "\\)").map(|m| (m, "\\("));

    let ((span, content), delimiter) = [dollar, paren]
        .into_iter()
        .flatten()
        .min_by_key(|((span, _), _)| span.start)?;

    Some(
        RuleMatch::spanning(Category::Math, 0.9, span)
            .with_content(content)
            .with_meta("display", false)
            .with_meta("delimiter", delimiter),
    )
}

fn inline_dollar(text: &str) -> Option<(Range<usize>, Range<usize>)> {
    let bytes = text.as_bytes();
    let start = text.find('$')?;

    if bytes.get(start + 1) == Some(&b'$') {
        return None;
    }

    let inner_start = start + 1;
    let inner_end = inner_start + text[inner_start..].find('$')?;
    let inner = &text[inner_start..inner_end];

    if inner.is_empty()
        || inner.starts_with(char::is_whitespace)
        || inner.ends_with(char::is_whitespace)
        || inner.contains('\n')
    {
        return None;
    }

    if bytes.get(inner_end + 1).map_or(false, u8::is_ascii_digit) {
        return None;
    }

    Some((start..inner_end + 1, inner_start..inner_end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::with_ctx;

    #[test]
    fn test_display_dollars() {
        let text = "$$ E = mc^2 $$";
        let m = with_ctx(text, math_display).unwrap();
        assert_eq!(m.span, 0..text.len());
        assert_eq!(&text[m.content], "E = mc^2");
        assert_eq!(m.metadata["display"], true);
    }

    #[test]
    fn test_display_brackets_embedded() {
        let text = "Solve \\[x^2 = 4\\] for x";
        let m = with_ctx(text, math_display).unwrap();
        assert!(!m.spans_whole(text.len()));
        assert_eq!(m.metadata["delimiter"], "\\[");
    }

    #[test]
    fn test_environment() {
        let text = "\\begin{align}\na &= b \\\\\nc &= d\n\\end{align}";
        let m = with_ctx(text, math_environment).unwrap();
        assert!(m.spans_whole(text.len()));
        assert_eq!(m.confidence, 0.95);
        assert_eq!(m.metadata["environment"], "align");
    }

    #[test]
    fn test_non_math_environment() {
        assert!(with_ctx("\\begin{itemize}\n\\item a\n\\end{itemize}", math_environment).is_none());
    }

    #[test]
    fn test_inline_dollar() {
        let text = "$x^2$";
        let m = with_ctx(text, math_inline).unwrap();
        assert!(m.spans_whole(text.len()));
        assert_eq!(&text[m.content], "x^2");
    }

    #[test]
    fn test_prices_are_not_math() {
        assert!(with_ctx("it costs $5 and $10", math_inline).is_none());
        assert!(with_ctx("$5$10", math_inline).is_none());
    }

    #[test]
    fn test_empty_delimiters() {
        assert!(with_ctx("$$  $$", math_display).is_none());
        assert!(with_ctx("\\( \\)", math_inline).is_none());
    }
}
