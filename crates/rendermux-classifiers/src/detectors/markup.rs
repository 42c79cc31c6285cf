//! XML documents and HTML/SVG markup

use crate::rules::{RuleContext, RuleMatch};
use rendermux_core::Category;

/// Elements we are willing to call markup; anything else is probably a
/// generic type or an email address in angle brackets
const HTML_ELEMENTS: &[&str] = &[
    "html", "head", "body", "div", "span", "p", "a", "img", "svg", "table", "thead", "tbody",
    "tr", "td", "th", "ul", "ol", "li", "h1", "h2", "h3", "h4", "h5", "h6", "button", "form",
    "input", "canvas", "section", "article", "header", "footer", "nav", "main", "style",
    "script", "iframe", "video", "audio", "pre", "code", "details", "summary", "blockquote",
    "strong", "em", "b", "i", "u", "br", "hr", "label", "select", "option", "textarea", "sup",
    "sub", "figure", "figcaption", "dl", "dt", "dd", "kbd", "mark", "small",
];

const VOID_ELEMENTS: &[&str] = &[
    "img", "br", "hr", "input", "meta", "link", "source", "col", "wbr", "area", "track",
];

/// Rule: a document opening with an XML declaration
///
/// SVG documents fall through so the markup rule can render them.
pub fn xml_declaration(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    if !ctx.text.starts_with("<?xml") || !ctx.text.ends_with('>') {
        return None;
    }

    let decl_end = ctx.text.find("?>")? + 2;
    let root = ctx
        .patterns
        .xml_root
        .captures_iter(&ctx.text[decl_end..])
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .next();

    if root.map_or(false, |r| r.eq_ignore_ascii_case("svg")) {
        return None;
    }

    let mut matched = RuleMatch::whole(Category::StructuredDoc, 1.0, ctx.text).with_meta("format", "xml");
    if let Some(root) = root {
        matched = matched.with_meta("root", root);
    }
    Some(matched)
}

/// Rule: one or more sibling HTML or SVG elements
///
/// The span runs from the first known opening tag to the end of the last
/// top-level element. Only whitespace, comments or a doctype may sit between
/// top-level elements; prose ends the span early. A leading XML prolog,
/// doctype or comment is included, so a full document counts as a
/// whole-sample match.
pub fn markup(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    let text = ctx.text;

    let (open, root) = ctx.patterns.markup_tag.captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        let name = caps.get(1)?.as_str().to_ascii_lowercase();
        HTML_ELEMENTS.contains(&name.as_str()).then_some((whole, name))
    })?;

    let end = top_level_end(ctx, open.start())?;

    let start = if ctx.patterns.markup_prolog.is_match(&text[..open.start()]) {
        0
    } else {
        open.start()
    };

    let kind = if root == "svg" { "svg" } else { "html" };

    let matched = if ctx.untrusted() {
        RuleMatch::spanning(Category::Code, 0.95, start..end)
            .with_meta("language", kind)
            .with_meta("executable", true)
            .with_meta("raw", &text[start..end])
    } else {
        RuleMatch::spanning(Category::Markup, 0.95, start..end)
            .with_meta("kind", kind)
            .with_meta("root", root.as_str())
    };

    Some(matched)
}

/// End offset of the last complete top-level element at or after `from`
///
/// Unmatched closing tags inside an element are ignored and unclosed children
/// are closed by their parent.
fn top_level_end(ctx: &RuleContext<'_>, from: usize) -> Option<usize> {
    let text = ctx.text;
    let mut open: Vec<String> = Vec::new();
    let mut cursor = from;
    let mut end = None;

    for caps in ctx.patterns.markup_any_tag.captures_iter(&text[from..]) {
        let Some(tag) = caps.get(0) else {
            continue;
        };
        let (tag_start, tag_end) = (from + tag.start(), from + tag.end());
        let closing = caps.get(1).map_or(false, |m| !m.as_str().is_empty());
        let name = caps.get(2).map_or(String::new(), |m| m.as_str().to_ascii_lowercase());
        let self_closing = caps.get(3).map_or(false, |m| !m.as_str().is_empty())
            || VOID_ELEMENTS.contains(&name.as_str());

        if open.is_empty() {
            if !ctx.patterns.markup_prolog.is_match(&text[cursor..tag_start]) {
                break;
            }
            if closing || !HTML_ELEMENTS.contains(&name.as_str()) {
                break;
            }
        }

        if closing {
            if let Some(depth) = open.iter().rposition(|n| *n == name) {
                open.truncate(depth);
                if open.is_empty() {
                    end = Some(tag_end);
                    cursor = tag_end;
                }
            }
        } else if self_closing {
            if open.is_empty() {
                end = Some(tag_end);
                cursor = tag_end;
            }
        } else {
            open.push(name);
        }
    }

    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::{with_ctx, with_origin};
    use rendermux_core::OriginHint;

    #[test]
    fn test_xml_declaration() {
        let text = "<?xml version=\"1.0\"?>\n<note><to>Tove</to></note>";
        let m = with_ctx(text, xml_declaration).unwrap();
        assert_eq!(m.category, Category::StructuredDoc);
        assert_eq!(m.metadata["root"], "note");
    }

    #[test]
    fn test_svg_document_is_markup() {
        let text = "<?xml version=\"1.0\"?>\n<svg width=\"10\"><rect/></svg>";
        assert!(with_ctx(text, xml_declaration).is_none());

        let m = with_ctx(text, markup).unwrap();
        assert_eq!(m.category, Category::Markup);
        assert!(m.spans_whole(text.len()));
        assert_eq!(m.metadata["kind"], "svg");
    }

    #[test]
    fn test_whole_html() {
        let text = "<div class=\"x\"><b>hi</b></div>";
        let m = with_ctx(text, markup).unwrap();
        assert!(m.spans_whole(text.len()));
        assert_eq!(m.metadata["root"], "div");
    }

    #[test]
    fn test_embedded_html() {
        let text = "Use <b>bold</b> here";
        let m = with_ctx(text, markup).unwrap();
        assert!(!m.spans_whole(text.len()));
    }

    #[test]
    fn test_void_element() {
        let text = "<img src=\"a.png\">";
        assert!(with_ctx(text, markup).unwrap().spans_whole(text.len()));
    }

    #[test]
    fn test_generics_are_not_markup() {
        assert!(with_ctx("Vec<String> and Option<T>", markup).is_none());
    }

    #[test]
    fn test_untrusted_markup_is_executable_code() {
        let text = "<script>alert(1)</script>";
        let m = with_origin(text, OriginHint::Assistant, markup).unwrap();
        assert_eq!(m.category, Category::Code);
        assert_eq!(m.metadata["executable"], true);
        assert_eq!(m.metadata["language"], "html");
        assert_eq!(m.metadata["raw"], text);

        let m = with_origin(text, OriginHint::User, markup).unwrap();
        assert_eq!(m.category, Category::Markup);
    }

    #[test]
    fn test_sibling_roots_span_whole_sample() {
        for text in [
            "<h1>Title</h1><p>Body</p>",
            "<p>one</p>\n<ul><li>x</li></ul>",
            "<b>bold</b> <i>it</i>",
            "<p>a</p>\n<!-- divider -->\n<hr>\n<p>b</p>",
        ] {
            let m = with_origin(text, OriginHint::User, markup).unwrap();
            assert_eq!(m.category, Category::Markup, "sample: {:?}", text);
            assert!(m.spans_whole(text.len()), "sample: {:?}", text);
        }
    }

    #[test]
    fn test_untrusted_sibling_roots_are_executable() {
        let text = "<style>p{}</style><script>go()</script>";
        let m = with_origin(text, OriginHint::Assistant, markup).unwrap();
        assert_eq!(m.category, Category::Code);
        assert_eq!(m.metadata["executable"], true);
        assert!(m.spans_whole(text.len()));
        assert_eq!(m.metadata["raw"], text);
    }

    #[test]
    fn test_prose_between_roots_ends_span() {
        let text = "<b>one</b> and then <i>two</i>";
        let m = with_ctx(text, markup).unwrap();
        assert!(!m.spans_whole(text.len()));
        assert_eq!(m.span.end, "<b>one</b>".len());
    }

    #[test]
    fn test_unclosed_children_still_balance() {
        let text = "<ul><li>one<li>two</ul>";
        let m = with_ctx(text, markup).unwrap();
        assert!(m.spans_whole(text.len()));
        assert_eq!(m.metadata["root"], "ul");
    }

    #[test]
    fn test_quoted_attribute_may_contain_angle_brackets() {
        for text in [
            "<a title=\"x > y\">link</a>",
            "<p data-rule='1>0'>ok</p>",
            "<div title=\"<b>\"><i>x</i></div>",
        ] {
            let m = with_ctx(text, markup).unwrap();
            assert!(m.spans_whole(text.len()), "sample: {:?}", text);
        }
    }

    #[test]
    fn test_unclosed_root_is_not_markup() {
        assert!(with_ctx("<div>never closed", markup).is_none());
    }
}
