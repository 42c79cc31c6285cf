//! Compiled pattern set shared by all rules
//!
//! Everything is compiled once when the classifier is built, so rule
//! evaluation never allocates a regex.

use aho_corasick::{AhoCorasick, Anchored, Input, MatchKind, StartKind};
use regex::Regex;
use rendermux_core::{Error, Result};

/// Mermaid diagram keywords that may open a diagram definition
pub const MERMAID_KEYWORDS: &[&str] = &[
    "graph",
    "flowchart",
    "sequenceDiagram",
    "classDiagram",
    "stateDiagram-v2",
    "stateDiagram",
    "erDiagram",
    "gantt",
    "pie",
    "journey",
    "gitGraph",
    "mindmap",
    "timeline",
    "quadrantChart",
    "requirementDiagram",
    "C4Context",
    "sankey-beta",
    "xychart-beta",
    "block-beta",
];

/// Compiled regexes and keyword automata
pub struct Patterns {
    mermaid: AhoCorasick,

    pub plantuml_start: Regex,
    pub math_env_begin: Regex,
    pub markup_tag: Regex,
    pub markup_any_tag: Regex,
    pub markup_prolog: Regex,
    pub xml_root: Regex,
    pub media_markdown: Regex,
    pub section_line: Regex,
    pub eq_key_line: Regex,
    pub colon_key_line: Regex,
    pub list_item_line: Regex,
    pub graphql_definition: Regex,
    pub graphql_operation: Regex,
    pub sql_ddl: Regex,
    pub sql_query: Regex,
    pub hunk_header: Regex,
    pub regex_literal: Regex,
    pub hex_color: Regex,
    pub rgb_color: Regex,
    pub hsl_color: Regex,
    pub markdown_link: Regex,
    pub bare_url: Regex,
}

impl Patterns {
    /// Compile every pattern
    pub fn new() -> Result<Self> {
        let mermaid = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostLongest)
            .start_kind(StartKind::Anchored)
            .build(MERMAID_KEYWORDS)
            .map_err(|e| {
                Error::detection(format!("Failed to build diagram keyword matcher: {}", e))
            })?;

        Ok(Self {
            mermaid,
            plantuml_start: compile(
                "plantuml_start",
                r"@start(uml|mindmap|gantt|wbs|salt|json|yaml)\b",
            )?,
            math_env_begin: compile("math_env_begin", r"\\begin\{([A-Za-z]+\*?)\}")?,
            markup_tag: compile(
                "markup_tag",
                r#"(?i)<([a-z][a-z0-9-]*)\b(?:"[^"]*"|'[^']*'|[^<>"'])*?(/?)>"#,
            )?,
            markup_any_tag: compile(
                "markup_any_tag",
                r#"(?i)<(/?)([a-z][a-z0-9-]*)\b(?:"[^"]*"|'[^']*'|[^<>"'])*?(/?)>"#,
            )?,
            markup_prolog: compile(
                "markup_prolog",
                r"(?is)^\s*(?:(?:<\?[^>]*\?>|<!--.*?-->|<!doctype[^>]*>)\s*)*$",
            )?,
            xml_root: compile("xml_root", r"<([A-Za-z_][\w:.-]*)")?,
            media_markdown: compile(
                "media_markdown",
                r#"!\[([^\]\n]*)\]\(\s*<?([^\s)>]+)>?(?:\s+"([^"]*)")?\s*\)"#,
            )?,
            section_line: compile("section_line", r#"^\[\[?[\w.\- "']+\]\]?$"#)?,
            eq_key_line: compile("eq_key_line", r"^[A-Za-z_][\w.\-]*\s*=\s*\S")?,
            colon_key_line: compile("colon_key_line", r"^\s*(?:-\s+)?[A-Za-z_][\w.\-]*:(?:\s|$)")?,
            list_item_line: compile("list_item_line", r"^\s*-(?:\s+\S|$)")?,
            graphql_definition: compile(
                "graphql_definition",
                r"^\s*(?:extend\s+)?(type|input|enum|interface|union|scalar|schema|directive)\b",
            )?,
            graphql_operation: compile(
                "graphql_operation",
                r"^\s*(query|mutation|subscription)\b[^{}]*\{",
            )?,
            sql_ddl: compile(
                "sql_ddl",
                r"(?i)^\s*(create|alter|drop)\s+(?:or\s+replace\s+)?(?:temporary\s+|temp\s+|unique\s+)?(table|index|view|schema|type|sequence|database)\b",
            )?,
            sql_query: compile("sql_query", r"(?i)^\s*(select|insert|update|delete|with)\b")?,
            hunk_header: compile("hunk_header", r"^@@ -\d+(?:,\d+)? \+\d+(?:,\d+)? @@")?,
            regex_literal: compile(
                "regex_literal",
                r"^/((?:\\.|\[(?:\\.|[^\]\\\n])*\]|[^/\\\n\[])+)/([dgimsuvy]*)$",
            )?,
            hex_color: compile(
                "hex_color",
                r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{4}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$",
            )?,
            rgb_color: compile(
                "rgb_color",
                r"(?i)^rgba?\(\s*(\d{1,3})\s*[,\s]\s*(\d{1,3})\s*[,\s]\s*(\d{1,3})\s*(?:[,/]\s*(\d*\.?\d+%?))?\s*\)$",
            )?,
            hsl_color: compile(
                "hsl_color",
                r"(?i)^hsla?\(\s*(\d{1,3}(?:\.\d+)?)(?:deg)?\s*[,\s]\s*(\d{1,3}(?:\.\d+)?)%\s*[,\s]\s*(\d{1,3}(?:\.\d+)?)%\s*(?:[,/]\s*(\d*\.?\d+%?))?\s*\)$",
            )?,
            markdown_link: compile(
                "markdown_link",
                r#"\[([^\]\n]+)\]\(\s*<?([^\s)>]+)>?(?:\s+"([^"]*)")?\s*\)"#,
            )?,
            bare_url: compile("bare_url", r#"https?://[^\s<>"'`]+"#)?,
        })
    }

    /// Mermaid keyword at the very start of `line`, if any
    pub fn mermaid_keyword<'l>(&self, line: &'l str) -> Option<&'l str> {
        let found = self
            .mermaid
            .find(Input::new(line).anchored(Anchored::Yes))?;
        let rest = &line[found.end()..];

        // The keyword must end at a word boundary
        match rest.chars().next() {
            Some(c) if c.is_alphanumeric() || c == '_' || c == '-' => None,
            _ => Some(&line[..found.end()]),
        }
    }
}

impl std::fmt::Debug for Patterns {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Patterns").finish_non_exhaustive()
    }
}

fn compile(name: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| Error::detection(format!("Failed to compile {} pattern: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_compile() {
        assert!(Patterns::new().is_ok());
    }

    #[test]
    fn test_mermaid_keyword_prefers_longest() {
        let patterns = Patterns::new().unwrap();
        assert_eq!(
            patterns.mermaid_keyword("stateDiagram-v2"),
            Some("stateDiagram-v2")
        );
        assert_eq!(patterns.mermaid_keyword("graph TD"), Some("graph"));
        assert_eq!(patterns.mermaid_keyword("graphics are nice"), None);
        assert_eq!(patterns.mermaid_keyword("a graph TD"), None);
    }

    #[test]
    fn test_regex_literal_shape() {
        let patterns = Patterns::new().unwrap();
        let caps = patterns.regex_literal.captures("/ab+c/gi").unwrap();
        assert_eq!(&caps[1], "ab+c");
        assert_eq!(&caps[2], "gi");

        assert!(patterns.regex_literal.captures("/usr/local/bin/").is_none());
        assert!(patterns.regex_literal.is_match(r"/a\/b/"));
        assert!(patterns.regex_literal.is_match("/[/]x/"));
    }
}
