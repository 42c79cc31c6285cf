//! Delimiter-separated rows

use crate::rules::{RuleContext, RuleMatch};
use regex::Regex;
use rendermux_core::Category;

const DELIMITERS: &[(char, &str)] = &[(',', ","), ('\t', "\t"), (';', ";"), ('|', "|")];

/// Count `delimiter` outside double-quoted cells
pub fn count_delimiters(line: &str, delimiter: char) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == delimiter && !in_quotes => count += 1,
            _ => {}
        }
    }

    count
}

fn is_markdown_table_rule(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.contains("---")
        && trimmed
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | ' ' | '+'))
}

/// A query opener followed by whitespace; a CSV header such as
/// `type,name` is still data
fn opens_statement(re: &Regex, line: &str) -> bool {
    re.captures(line)
        .and_then(|caps| caps.get(1))
        .map(|keyword| {
            line[keyword.end()..]
                .chars()
                .next()
                .map_or(true, char::is_whitespace)
        })
        .unwrap_or(false)
}

/// SQL, GraphQL or key/value configuration whose commas are not cells
fn is_code_like(ctx: &RuleContext<'_>, lines: &[&str]) -> bool {
    let patterns = ctx.patterns;
    let first = lines[0];

    if opens_statement(&patterns.sql_query, first)
        || opens_statement(&patterns.graphql_definition, first)
        || patterns.sql_ddl.is_match(first)
        || patterns.graphql_operation.is_match(first)
    {
        return true;
    }

    lines.iter().all(|l| {
        let t = l.trim();
        patterns.eq_key_line.is_match(t) || patterns.section_line.is_match(t)
    })
}

/// Rule: lines consistently split by one delimiter
///
/// A delimiter qualifies when at least `tabular_consistency` of the lines
/// contain it and no line's count strays more than `tabular_max_deviation`
/// from the mean. Comma data whose lines end like sentences is prose,
/// Markdown tables are left to the Markdown renderer, and queries or
/// `key = value` documents are left to their own rules.
pub fn tabular(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    let config = ctx.config;
    let lines = ctx.lines();
    if lines.len() < config.tabular_min_lines {
        return None;
    }

    if lines.iter().any(|l| is_markdown_table_rule(l)) || is_code_like(ctx, &lines) {
        return None;
    }

    for &(delimiter, name) in DELIMITERS {
        let counts: Vec<usize> = lines
            .iter()
            .map(|l| count_delimiters(l, delimiter))
            .collect();
        let with: Vec<usize> = counts.iter().copied().filter(|&c| c > 0).collect();
        if with.is_empty() {
            continue;
        }

        let ratio = with.len() as f32 / lines.len() as f32;
        if ratio < config.tabular_consistency {
            continue;
        }

        let mean = with.iter().sum::<usize>() as f32 / with.len() as f32;
        if with
            .iter()
            .any(|&c| (c as f32 - mean).abs() > config.tabular_max_deviation)
        {
            continue;
        }

        if delimiter == ','
            && lines
                .iter()
                .any(|l| l.trim_end().ends_with(['.', '!', '?']))
        {
            continue;
        }

        // Statement terminators, not cells
        if delimiter == ';' && lines.iter().all(|l| l.trim_end().ends_with(';')) {
            continue;
        }

        let uniform = counts.iter().all(|&c| c == counts[0]);
        let confidence = if uniform { 0.95 } else { 0.85 };

        let bordered = delimiter == '|'
            && lines
                .iter()
                .all(|l| l.trim().starts_with('|') && l.trim().ends_with('|'));
        let columns = if bordered {
            mean.round() as usize - 1
        } else {
            mean.round() as usize + 1
        };

        let header: Vec<String> = split_cells(lines[0], delimiter)
            .into_iter()
            .map(|c| c.trim().trim_matches('"').to_string())
            .filter(|c| !(bordered && c.is_empty()))
            .collect();

        return Some(
            RuleMatch::whole(Category::Tabular, confidence, ctx.text)
                .with_meta("delimiter", name)
                .with_meta("rows", lines.len())
                .with_meta("columns", columns)
                .with_meta("header", header),
        );
    }

    None
}

/// Split a line into cells, honouring double quotes
pub fn split_cells(line: &str, delimiter: char) -> Vec<&str> {
    let mut cells = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (idx, c) in line.char_indices() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == delimiter && !in_quotes {
            cells.push(&line[start..idx]);
            start = idx + c.len_utf8();
        }
    }
    cells.push(&line[start..]);

    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::with_ctx;

    #[test]
    fn test_csv() {
        let m = with_ctx("a,b,c\n1,2,3", tabular).unwrap();
        assert_eq!(m.category, Category::Tabular);
        assert_eq!(m.confidence, 0.95);
        assert_eq!(m.metadata["delimiter"], ",");
        assert_eq!(m.metadata["columns"], 3);
        assert_eq!(m.metadata["header"], serde_json::json!(["a", "b", "c"]));
    }

    #[test]
    fn test_quoted_commas() {
        let m = with_ctx("name,quote\n\"Smith, J\",\"hi, there\"\nDoe,ok", tabular).unwrap();
        assert_eq!(m.metadata["columns"], 2);
        assert_eq!(count_delimiters("\"a,\"\"b\"\",c\",d", ','), 1);
    }

    #[test]
    fn test_tsv() {
        let m = with_ctx("x\ty\n1\t2\n3\t4", tabular).unwrap();
        assert_eq!(m.metadata["delimiter"], "\t");
    }

    #[test]
    fn test_prose_with_commas() {
        let text = "Well, I think so.\nYes, that works, mostly.";
        assert!(with_ctx(text, tabular).is_none());
    }

    #[test]
    fn test_single_line() {
        assert!(with_ctx("a,b,c", tabular).is_none());
    }

    #[test]
    fn test_markdown_table_skipped() {
        assert!(with_ctx("| a | b |\n|---|---|\n| 1 | 2 |", tabular).is_none());
    }

    #[test]
    fn test_semicolon_statements_skipped() {
        assert!(with_ctx("let a = 1;\nlet b = 2;", tabular).is_none());
    }

    #[test]
    fn test_queries_with_commas_skipped() {
        for text in [
            "INSERT INTO t (a, b)\nVALUES (1, 2);",
            "SELECT a, b\nFROM t, u",
            "CREATE TABLE t (a INT, b INT,\n  c INT, d INT);",
            "type Point { x: Int, y: Int }\ntype Size { w: Int, h: Int }",
            "query Q($a: ID, $b: ID) {\n  node(a: $a, b: $b) { id }\n}",
        ] {
            assert!(with_ctx(text, tabular).is_none(), "sample: {:?}", text);
        }
    }

    #[test]
    fn test_key_value_lines_skipped() {
        assert!(with_ctx("deps = [\"a\", \"b\"]\ndev = [\"c\", \"d\"]", tabular).is_none());
        assert!(with_ctx("[db]\nhosts = a, b\nports = 1, 2\nnames = x, y", tabular).is_none());
    }

    #[test]
    fn test_keyword_headers_are_still_data() {
        let m = with_ctx("type,name\nuser,ann\nadmin,bob", tabular).unwrap();
        assert_eq!(m.metadata["header"], serde_json::json!(["type", "name"]));
        assert!(with_ctx("select,update\n1,2", tabular).is_some());
    }

    #[test]
    fn test_inconsistent_counts() {
        assert!(with_ctx("a,b\n1,2,3,4,5\nx", tabular).is_none());
    }
}
