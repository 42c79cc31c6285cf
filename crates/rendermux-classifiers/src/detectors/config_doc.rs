//! YAML, TOML and INI documents

use crate::rules::{RuleContext, RuleMatch};
use rendermux_core::Category;

fn is_comment(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with('#') || t.starts_with(';')
}

/// TOML values are typed; INI values are bare strings
fn is_toml_value(value: &str) -> bool {
    let v = value.trim();
    v.starts_with('"')
        || v.starts_with('\'')
        || v.starts_with('[')
        || v.starts_with('{')
        || v == "true"
        || v == "false"
        || v.parse::<f64>().is_ok()
}

/// Quoted strings, arrays and inline tables only appear in TOML
fn is_compound_toml_value(value: &str) -> bool {
    value.trim().starts_with(['"', '\'', '[', '{'])
}

/// Rule: key/value configuration
///
/// Lines are scored as either `key = value`/`[section]` (TOML and INI) or
/// `key: value`/`- item` (YAML). A format wins when enough lines fit it and
/// the document has some structure: sections, nesting, TOML-only values, or
/// at least `config_min_key_lines` keys. YAML candidates must also parse to a
/// mapping.
pub fn config_doc(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    let config = ctx.config;
    let patterns = ctx.patterns;

    let lines: Vec<&str> = ctx.lines().into_iter().filter(|l| !is_comment(l)).collect();
    if lines.len() < config.config_min_lines {
        return None;
    }
    let total = lines.len() as f32;

    let sections = lines
        .iter()
        .filter(|l| patterns.section_line.is_match(l.trim()))
        .count();
    let eq_keys: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|l| patterns.eq_key_line.is_match(l.trim_start()))
        .collect();

    let compound = eq_keys.len() >= 2
        && eq_keys
            .iter()
            .filter_map(|l| l.split_once('='))
            .all(|(_, v)| is_compound_toml_value(v));

    if (sections + eq_keys.len()) as f32 / total >= config.config_consistency
        && (sections > 0 || compound || eq_keys.len() >= config.config_min_key_lines)
        && !eq_keys.is_empty()
    {
        let typed = eq_keys
            .iter()
            .filter_map(|l| l.split_once('='))
            .all(|(_, v)| is_toml_value(v));
        let format = if typed { "toml" } else { "ini" };

        return Some(
            RuleMatch::whole(Category::ConfigDoc, 0.8, ctx.text)
                .with_meta("format", format)
                .with_meta("keys", eq_keys.len())
                .with_meta("sections", sections),
        );
    }

    let colon_keys = lines
        .iter()
        .filter(|l| patterns.colon_key_line.is_match(l))
        .count();
    let list_items = lines
        .iter()
        .filter(|l| patterns.list_item_line.is_match(l))
        .count();
    let markers = lines.iter().filter(|l| l.trim() == "---").count();
    let nested = lines
        .iter()
        .any(|l| l.starts_with([' ', '\t']) && patterns.colon_key_line.is_match(l));

    let fitting = (colon_keys + list_items + markers) as f32 / total;
    if fitting < config.config_consistency
        || colon_keys == 0
        || !(nested || colon_keys >= config.config_min_key_lines)
    {
        return None;
    }

    // YAML happily parses most prose as a string; require a real mapping
    match serde_yaml::from_str::<serde_yaml::Value>(ctx.text) {
        Ok(serde_yaml::Value::Mapping(map)) => Some(
            RuleMatch::whole(Category::ConfigDoc, 0.8, ctx.text)
                .with_meta("format", "yaml")
                .with_meta("keys", map.len())
                .with_meta("nested", nested),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::with_ctx;

    #[test]
    fn test_toml() {
        let text = "[package]\nname = \"rendermux\"\nversion = \"0.1.0\"";
        let m = with_ctx(text, config_doc).unwrap();
        assert_eq!(m.category, Category::ConfigDoc);
        assert_eq!(m.metadata["format"], "toml");
        assert_eq!(m.metadata["sections"], 1);
    }

    #[test]
    fn test_ini() {
        let text = "; settings\n[server]\nhost = localhost\nport = 8080";
        let m = with_ctx(text, config_doc).unwrap();
        assert_eq!(m.metadata["format"], "ini");
    }

    #[test]
    fn test_nested_yaml() {
        let text = "server:\n  host: localhost\n  port: 8080";
        let m = with_ctx(text, config_doc).unwrap();
        assert_eq!(m.metadata["format"], "yaml");
        assert_eq!(m.metadata["nested"], true);
    }

    #[test]
    fn test_flat_yaml_needs_three_keys() {
        assert!(with_ctx("name: demo\nversion: 2", config_doc).is_none());
        assert!(with_ctx("name: demo\nversion: 2\nport: 80", config_doc).is_some());
    }

    #[test]
    fn test_two_toml_arrays() {
        let text = "deps = [\"a\", \"b\"]\ndev = [\"c\", \"d\"]";
        let m = with_ctx(text, config_doc).unwrap();
        assert_eq!(m.metadata["format"], "toml");
        assert_eq!(m.metadata["keys"], 2);
    }

    #[test]
    fn test_two_bare_assignments_need_more_keys() {
        assert!(with_ctx("x = 1\ny = 2", config_doc).is_none());
        assert!(with_ctx("hosts = a, b\nports = 1, 2", config_doc).is_none());
    }

    #[test]
    fn test_prose_is_not_config() {
        let text = "Note: this is important.\nAlso keep in mind the deadline.";
        assert!(with_ctx(text, config_doc).is_none());
    }

    #[test]
    fn test_two_assignments_are_not_enough() {
        assert!(with_ctx("x = 1\ny = 2", config_doc).is_none());
    }
}
