//! Query languages and their schemas: SQL and GraphQL

use crate::rules::{RuleContext, RuleMatch};
use rendermux_core::Category;

/// Clauses that show a statement has SQL structure beyond its first word
const SQL_CLAUSES: &[&str] = &[
    " where ", " join ", " group by ", " order by ", " limit ", " having ", " values", " union ",
    " returning ",
];

fn braces_balanced(text: &str) -> bool {
    let mut depth: i64 = 0;
    for c in text.chars() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

fn statement_count(text: &str) -> usize {
    text.split(';').filter(|s| !s.trim().is_empty()).count().max(1)
}

/// Rule: GraphQL SDL or SQL DDL
pub fn query_schema(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    let text = ctx.text;

    if let Some(caps) = ctx.patterns.sql_ddl.captures(text) {
        let verb = caps.get(1)?.as_str().to_ascii_lowercase();
        let object = caps.get(2)?.as_str().to_ascii_lowercase();
        return Some(
            RuleMatch::whole(Category::QuerySchema, 0.85, text)
                .with_meta("dialect", "sql")
                .with_meta("statement", format!("{} {}", verb, object))
                .with_meta("statements", statement_count(text)),
        );
    }

    let definitions: Vec<&str> = text
        .lines()
        .filter_map(|l| ctx.patterns.graphql_definition.captures(l))
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    let first = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with("\"\"\""))?;

    if definitions.is_empty()
        || !ctx.patterns.graphql_definition.is_match(first)
        || (!text.contains('{') && !definitions.iter().all(|d| *d == "scalar" || *d == "union"))
        || !braces_balanced(text)
    {
        return None;
    }

    Some(
        RuleMatch::whole(Category::QuerySchema, 0.85, text)
            .with_meta("dialect", "graphql")
            .with_meta("definitions", definitions.len()),
    )
}

/// Rule: a SQL statement or GraphQL operation
///
/// Lowercase SQL must look like SQL beyond its first word so sentences such as
/// "select the best option from the menu" stay prose.
pub fn query_language(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    let text = ctx.text;

    if let Some(caps) = ctx.patterns.sql_query.captures(text) {
        let keyword = caps.get(1)?.as_str();
        let words: Vec<&str> = text.split_whitespace().collect();
        let lower = format!(" {} ", words.join(" ").to_ascii_lowercase());

        let shaped = match keyword.to_ascii_lowercase().as_str() {
            "select" => lower.contains(" from ") || text.ends_with(';'),
            "insert" => lower.contains(" into "),
            "update" => lower.contains(" set "),
            "delete" => lower.contains(" from "),
            "with" => lower.contains(" as (") || lower.contains(" as("),
            _ => false,
        };
        let clauses = SQL_CLAUSES.iter().filter(|c| lower.contains(*c)).count();
        let uppercase = keyword.chars().all(|c| c.is_ascii_uppercase());

        if shaped && (uppercase || text.ends_with(';') || clauses >= 2) {
            return Some(
                RuleMatch::whole(Category::QueryLanguage, 0.8, text)
                    .with_meta("dialect", "sql")
                    .with_meta("statement", keyword.to_ascii_lowercase())
                    .with_meta("statements", statement_count(text)),
            );
        }
    }

    let caps = ctx.patterns.graphql_operation.captures(text)?;
    if !braces_balanced(text) || !text.ends_with('}') {
        return None;
    }

    Some(
        RuleMatch::whole(Category::QueryLanguage, 0.8, text)
            .with_meta("dialect", "graphql")
            .with_meta("operation", caps.get(1)?.as_str()),
    )
}
