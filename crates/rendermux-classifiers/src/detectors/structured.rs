//! JSON values and self-describing JSON documents

use crate::rules::{RuleContext, RuleMatch};
use rendermux_core::Category;
use serde_json::Value;

/// Keys that mark a JSON object as a typed document rather than plain data
const RESERVED_KEYS: &[(&str, &str)] = &[
    ("$schema", "json_schema"),
    ("@context", "json_ld"),
    ("@type", "json_ld"),
    ("nbformat", "notebook"),
    ("openapi", "openapi"),
    ("swagger", "openapi"),
];

/// Rule: the whole sample parses as a JSON object or array
pub fn structured_object(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    if !(ctx.text.starts_with('{') || ctx.text.starts_with('[')) {
        return None;
    }

    let value: Value = serde_json::from_str(ctx.text).ok()?;

    let matched = match &value {
        Value::Object(map) => {
            match RESERVED_KEYS.iter().find(|(key, _)| map.contains_key(*key)) {
                Some((key, doc_type)) => {
                    let mut matched = RuleMatch::whole(Category::StructuredDoc, 1.0, ctx.text)
                        .with_meta("format", "json")
                        .with_meta("doc_type", *doc_type)
                        .with_meta("marker", *key);
                    if let Some(Value::String(schema)) = map.get("$schema") {
                        matched = matched.with_meta("schema", schema.as_str());
                    }
                    matched
                }
                None => RuleMatch::whole(Category::Json, 1.0, ctx.text)
                    .with_meta("kind", "object")
                    .with_meta("keys", map.len()),
            }
        }
        Value::Array(items) => RuleMatch::whole(Category::Json, 1.0, ctx.text)
            .with_meta("kind", "array")
            .with_meta("length", items.len()),
        _ => return None,
    };

    Some(matched)
}
