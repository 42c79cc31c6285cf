//! Fenced code blocks
//!
//! Fences open with three or more backticks or tildes and close with a run of
//! the same character at least as long, not followed by an info word. The
//! info string after the opening run carries the language tag followed by
//! optional attributes:
//!
//! ```text
//! ```rust filename="main.rs" {3-5,8} showLineNumbers startLine=10
//! ```

use crate::rules::{RuleContext, RuleMatch};
use rendermux_core::{Category, Metadata};
use serde_json::{json, Value};
use std::ops::Range;

/// A located fenced block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock<'a> {
    /// Language tag, if any
    pub tag: Option<&'a str>,
    /// Info string after the tag
    pub attributes: &'a str,
    /// Body between the fences
    pub body: Range<usize>,
    /// Opening run through closing run
    pub span: Range<usize>,
}

/// Find the first closed fenced block in `text`
pub fn find_fenced_block(text: &str) -> Option<FencedBlock<'_>> {
    let open = match (text.find("```"), text.find("~~~")) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };

    let fence_char = text[open..].chars().next()?;
    let run = text[open..].chars().take_while(|&c| c == fence_char).count();

    let info_start = open + run;
    let newline = info_start + text[info_start..].find('\n')?;
    let info = text[info_start..newline].trim();

    // A backtick inside the info string means an inline code span, not a fence
    if fence_char == '`' && info.contains('`') {
        return None;
    }

    let body_start = newline + 1;
    let mut line_start = body_start;

    for line in text[body_start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();
        let closing = trimmed.chars().take_while(|&c| c == fence_char).count();

        // A run glued to a word opens a new fence (```python); it never closes
        let bare = trimmed[closing..]
            .chars()
            .next()
            .map_or(true, char::is_whitespace);

        if closing >= run && bare {
            let body = &text[body_start..line_start];
            let body = body.strip_suffix('\n').unwrap_or(body);
            let body_end = body_start + body.strip_suffix('\r').unwrap_or(body).len();
            let span_end = line_start + indent + closing;
            let (tag, attributes) = split_info(info);

            return Some(FencedBlock {
                tag,
                attributes,
                body: body_start..body_end,
                span: open..span_end,
            });
        }

        line_start += line.len();
    }

    None
}

fn split_info(info: &str) -> (Option<&str>, &str) {
    if info.is_empty() {
        return (None, "");
    }

    let end = info.find(char::is_whitespace).unwrap_or(info.len());
    let first = &info[..end];

    // `{1,3}` or `key=value` straight after the fence is an attribute, not a tag
    if first.starts_with('{') || first.contains('=') {
        (None, info)
    } else {
        (Some(first), info[end..].trim_start())
    }
}

/// Category a fence tag redirects to
pub fn category_for_tag(tag: &str) -> Category {
    match tag.to_ascii_lowercase().as_str() {
        "csv" | "tsv" => Category::Tabular,
        "diff" | "patch" => Category::Patch,
        "sql" | "mysql" | "postgresql" | "postgres" | "sqlite" | "graphql" | "gql" => {
            Category::QueryLanguage
        }
        "graphqls" | "sdl" => Category::QuerySchema,
        "math" | "latex" | "tex" | "katex" => Category::Math,
        "regex" | "regexp" => Category::PatternRule,
        "yaml" | "yml" | "toml" | "ini" => Category::ConfigDoc,
        "json" => Category::Json,
        "markdown" | "md" => Category::Markdown,
        "svg" => Category::Markup,
        "mermaid" => Category::Mermaid,
        "plantuml" | "puml" | "uml" | "dot" | "graphviz" => Category::PlantUml,
        _ => Category::Code,
    }
}

/// Parse fence attributes into metadata
///
/// Known keys are normalised (`filename`, `showLineNumbers`,
/// `highlightLines`, `startLine`); anything else lands under `attributes`.
pub fn parse_attributes(input: &str) -> Metadata {
    let mut metadata = Metadata::new();
    let mut extra = Metadata::new();

    for token in tokenize(input) {
        match token {
            Token::Braces(ranges) => {
                merge_highlight(&mut metadata, expand_ranges(&ranges));
            }
            Token::Flag(key) => match normalize_key(&key) {
                Some("showLineNumbers") => {
                    metadata.insert("showLineNumbers".into(), Value::Bool(true));
                }
                Some(_) | None => {
                    extra.insert(key, Value::Bool(true));
                }
            },
            Token::Pair(key, value) => match normalize_key(&key) {
                Some("filename") => {
                    metadata.insert("filename".into(), Value::String(value));
                }
                Some("showLineNumbers") => {
                    metadata.insert("showLineNumbers".into(), Value::Bool(value != "false"));
                }
                Some("highlightLines") => {
                    let inner = value.trim_start_matches(['{', '[']).trim_end_matches(['}', ']']);
                    merge_highlight(&mut metadata, expand_ranges(inner));
                }
                Some("startLine") => match value.parse::<u64>() {
                    Ok(n) => {
                        metadata.insert("startLine".into(), json!(n));
                    }
                    Err(_) => {
                        extra.insert(key, Value::String(value));
                    }
                },
                _ => {
                    extra.insert(key, typed_value(value));
                }
            },
        }
    }

    if !extra.is_empty() {
        metadata.insert("attributes".into(), Value::Object(extra));
    }

    metadata
}

fn normalize_key(key: &str) -> Option<&'static str> {
    match key.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
        "filename" | "file" | "title" | "name" => Some("filename"),
        "showlinenumbers" | "linenumbers" | "linenos" => Some("showLineNumbers"),
        "highlight" | "hl" | "highlightlines" | "lines" => Some("highlightLines"),
        "startline" | "start" | "linestart" | "firstline" => Some("startLine"),
        _ => None,
    }
}

fn typed_value(value: String) -> Value {
    match value.as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => match value.parse::<i64>() {
            Ok(n) => json!(n),
            Err(_) => Value::String(value),
        },
    }
}

fn merge_highlight(metadata: &mut Metadata, mut lines: Vec<u64>) {
    if let Some(Value::Array(existing)) = metadata.get("highlightLines") {
        lines.extend(existing.iter().filter_map(Value::as_u64));
    }
    lines.sort_unstable();
    lines.dedup();
    if !lines.is_empty() {
        metadata.insert("highlightLines".into(), json!(lines));
    }
}

/// Expand `1,3-5` into `[1, 3, 4, 5]`, skipping malformed parts
pub fn expand_ranges(input: &str) -> Vec<u64> {
    let mut lines = Vec::new();

    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((a, b)) => {
                if let (Ok(a), Ok(b)) = (a.trim().parse::<u64>(), b.trim().parse::<u64>()) {
                    // Cap runaway ranges like 1-99999999
                    if a <= b && b - a <= 10_000 {
                        lines.extend(a..=b);
                    }
                }
            }
            None => {
                if let Ok(n) = part.parse::<u64>() {
                    lines.push(n);
                }
            }
        }
    }

    lines.sort_unstable();
    lines.dedup();
    lines
}

#[derive(Debug, PartialEq)]
enum Token {
    Flag(String),
    Pair(String, String),
    Braces(String),
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '{' {
            chars.next();
            let inner: String = chars.by_ref().take_while(|&c| c != '}').collect();
            tokens.push(Token::Braces(inner));
            continue;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == '=' {
                break;
            }
            key.push(c);
            chars.next();
        }

        if chars.peek() != Some(&'=') {
            if !key.is_empty() {
                tokens.push(Token::Flag(key));
            }
            continue;
        }
        chars.next();

        let value = match chars.peek() {
            Some(&quote) if quote == '"' || quote == '\'' => {
                chars.next();
                chars.by_ref().take_while(|&c| c != quote).collect()
            }
            Some(&open) if open == '{' || open == '[' => {
                let close = if open == '{' { '}' } else { ']' };
                chars.next();
                chars.by_ref().take_while(|&c| c != close).collect()
            }
            _ => {
                let mut value = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
                value
            }
        };

        if !key.is_empty() {
            tokens.push(Token::Pair(key, value));
        }
    }

    tokens
}

/// Rule: a fenced block, categorised by its tag
pub fn fenced_block(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    let block = find_fenced_block(ctx.text)?;
    if ctx.text[block.body.clone()].trim().is_empty() {
        return None;
    }

    let category = block.tag.map(category_for_tag).unwrap_or(Category::Code);
    let confidence = if block.tag.is_some() { 1.0 } else { 0.8 };

    let mut matched = RuleMatch::spanning(category, confidence, block.span.clone())
        .with_content(block.body.clone())
        .with_meta("fenced", true);

    if let Some(tag) = block.tag {
        matched = matched.with_meta("language", tag);
    }
    for (key, value) in parse_attributes(block.attributes) {
        matched.metadata.insert(key, value);
    }

    Some(matched)
}
