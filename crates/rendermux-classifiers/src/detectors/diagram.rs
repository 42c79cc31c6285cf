//! Diagram sources: Mermaid, PlantUML and graphviz

use super::fence::find_fenced_block;
use crate::rules::{RuleContext, RuleMatch};
use rendermux_core::Category;

/// Mermaid flowcharts must name a direction
const GRAPH_DIRECTIONS: &[&str] = &["TB", "TD", "BT", "RL", "LR"];

fn diagram_category(tag: &str) -> Option<(Category, &'static str)> {
    match tag.to_ascii_lowercase().as_str() {
        "mermaid" => Some((Category::Mermaid, "mermaid")),
        "plantuml" | "puml" | "uml" => Some((Category::PlantUml, "plantuml")),
        "dot" | "graphviz" => Some((Category::PlantUml, "graphviz")),
        _ => None,
    }
}

/// Rule: a diagram-tagged fence or a `@startuml ... @enduml` block
pub fn diagram_block(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    if let Some(block) = find_fenced_block(ctx.text) {
        if let Some((category, engine)) = block.tag.and_then(diagram_category) {
            if !ctx.text[block.body.clone()].trim().is_empty() {
                return Some(
                    RuleMatch::spanning(category, 1.0, block.span)
                        .with_content(block.body)
                        .with_meta("engine", engine)
                        .with_meta("fenced", true),
                );
            }
        }
    }

    let caps = ctx.patterns.plantuml_start.captures(ctx.text)?;
    let start = caps.get(0)?;
    let kind = caps.get(1)?.as_str();
    let end_marker = format!("@end{}", kind);
    let end = start.end() + ctx.text[start.end()..].find(&end_marker)? + end_marker.len();

    // The markers are part of the source PlantUML expects
    Some(
        RuleMatch::spanning(Category::PlantUml, 1.0, start.start()..end)
            .with_meta("engine", "plantuml")
            .with_meta("diagram_type", kind),
    )
}

/// Rule: bare Mermaid source opening with a diagram keyword
pub fn diagram_keyword(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    let lines = ctx.lines();
    if lines.len() < 2 {
        return None;
    }

    let first = lines[0].trim();
    let keyword = ctx.patterns.mermaid_keyword(first)?;

    if keyword == "graph" || keyword == "flowchart" {
        let direction = first[keyword.len()..].split_whitespace().next()?;
        if !GRAPH_DIRECTIONS.contains(&direction.trim_end_matches(';')) {
            return None;
        }
    }

    Some(
        RuleMatch::whole(Category::Mermaid, 0.9, ctx.text)
            .with_meta("engine", "mermaid")
            .with_meta("diagram_type", keyword),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::with_ctx;

    #[test]
    fn test_mermaid_fence() {
        let m = with_ctx("```mermaid\ngraph TD\nA-->B\n```", diagram_block).unwrap();
        assert_eq!(m.category, Category::Mermaid);
        assert_eq!(m.confidence, 1.0);
        assert_eq!(m.metadata["engine"], "mermaid");
    }

    #[test]
    fn test_dot_fence_is_graphviz() {
        let m = with_ctx("```dot\ndigraph { a -> b }\n```", diagram_block).unwrap();
        assert_eq!(m.category, Category::PlantUml);
        assert_eq!(m.metadata["engine"], "graphviz");
    }

    #[test]
    fn test_plantuml_markers() {
        let text = "@startuml\nAlice -> Bob: hi\n@enduml";
        let m = with_ctx(text, diagram_block).unwrap();
        assert_eq!(m.category, Category::PlantUml);
        assert_eq!(m.span, 0..text.len());
        assert_eq!(m.metadata["diagram_type"], "uml");
    }

    #[test]
    fn test_other_fences_ignored() {
        assert!(with_ctx("```rust\nfn main() {}\n```", diagram_block).is_none());
    }

    #[test]
    fn test_keyword_with_direction() {
        let m = with_ctx("graph TD\nA-->B", diagram_keyword).unwrap();
        assert_eq!(m.category, Category::Mermaid);
        assert_eq!(m.confidence, 0.9);
        assert_eq!(m.metadata["diagram_type"], "graph");
    }

    #[test]
    fn test_keyword_prose_rejected() {
        assert!(with_ctx("graph paper is handy\nfor sketches", diagram_keyword).is_none());
        assert!(with_ctx("pie", diagram_keyword).is_none());
        assert!(with_ctx("sequenceDiagram\nAlice->>Bob: Hi", diagram_keyword).is_some());
    }
}
