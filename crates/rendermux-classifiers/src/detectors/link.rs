//! Markdown links and bare URLs

use crate::rules::{RuleContext, RuleMatch};
use rendermux_core::Category;
use url::Url;

/// Punctuation that usually ends the sentence rather than the URL
const TRAILING: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '\''];

/// Drop sentence punctuation from the end of a URL, keeping balanced parens
fn trim_trailing(url: &str) -> &str {
    let mut end = url.len();
    while let Some(last) = url[..end].chars().last() {
        if !TRAILING.contains(&last) {
            break;
        }
        let body = &url[..end];
        if last == ')' && body.matches('(').count() >= body.matches(')').count() {
            break;
        }
        end -= last.len_utf8();
    }
    &url[..end]
}

/// Rule: the first Markdown link or bare URL
pub fn link(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    let markdown = ctx.patterns.markdown_link.captures(ctx.text).and_then(|caps| {
        let whole = caps.get(0)?;
        // `![..](..)` belongs to the media rule
        if whole.start() > 0 && ctx.text.as_bytes()[whole.start() - 1] == b'!' {
            return None;
        }
        let mut matched = RuleMatch::spanning(Category::Link, 0.9, whole.range())
            .with_meta("text", caps.get(1)?.as_str())
            .with_meta("url", caps.get(2)?.as_str())
            .with_meta("markdown", true);
        if let Some(title) = caps.get(3) {
            matched = matched.with_meta("title", title.as_str());
        }
        Some(matched)
    });

    let bare = ctx.patterns.bare_url.find(ctx.text).and_then(|found| {
        let candidate = trim_trailing(found.as_str());
        let url = Url::parse(candidate).ok()?;
        let mut matched = RuleMatch::spanning(
            Category::Link,
            0.9,
            found.start()..found.start() + candidate.len(),
        )
        .with_meta("url", candidate)
        .with_meta("scheme", url.scheme())
        .with_meta("markdown", false);
        if let Some(host) = url.host_str() {
            matched = matched.with_meta("host", host);
        }
        Some(matched)
    });

    match (markdown, bare) {
        (Some(md), Some(bare)) if bare.span.start < md.span.start => Some(bare),
        (Some(md), _) => Some(md),
        (None, bare) => bare,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::with_ctx;

    #[test]
    fn test_bare_url() {
        let text = "https://example.com/docs?page=2";
        let m = with_ctx(text, link).unwrap();
        assert!(m.spans_whole(text.len()));
        assert_eq!(m.metadata["host"], "example.com");
        assert_eq!(m.metadata["scheme"], "https");
    }

    #[test]
    fn test_markdown_link() {
        let text = "[Rust](https://www.rust-lang.org \"Home\")";
        let m = with_ctx(text, link).unwrap();
        assert!(m.spans_whole(text.len()));
        assert_eq!(m.metadata["text"], "Rust");
        assert_eq!(m.metadata["title"], "Home");
        assert_eq!(m.metadata["markdown"], true);
    }

    #[test]
    fn test_url_in_sentence_is_partial() {
        let text = "Read https://example.com.";
        let m = with_ctx(text, link).unwrap();
        assert_eq!(m.metadata["url"], "https://example.com");
        assert!(!m.spans_whole(text.len()));
    }

    #[test]
    fn test_balanced_parens_kept() {
        let text = "https://en.wikipedia.org/wiki/Rust_(programming_language)";
        assert!(with_ctx(text, link).unwrap().spans_whole(text.len()));
    }

    #[test]
    fn test_image_syntax_left_alone() {
        let m = with_ctx("![alt](https://x.io/a)", link).unwrap();
        // Only the URL inside matches, never the image as a whole
        assert!(!m.spans_whole("![alt](https://x.io/a)".len()));
    }
}
