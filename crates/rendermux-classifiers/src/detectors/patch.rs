//! Unified diffs

use crate::rules::{RuleContext, RuleMatch};
use rendermux_core::Category;

const HEADER_PREFIXES: &[&str] = &[
    "diff ",
    "index ",
    "--- ",
    "+++ ",
    "new file mode",
    "deleted file mode",
    "old mode",
    "new mode",
    "similarity index",
    "dissimilarity index",
    "rename from",
    "rename to",
    "copy from",
    "copy to",
    "Binary files",
    "Index: ",
    "===",
];

fn is_diff_line(line: &str, patterns: &crate::patterns::Patterns) -> bool {
    line.is_empty()
        || line.starts_with([' ', '+', '-', '\\'])
        || patterns.hunk_header.is_match(line)
        || HEADER_PREFIXES.iter().any(|p| line.starts_with(p))
}

/// Rule: a unified diff from its first line to its last
///
/// The sample must open with a diff header or hunk and every line must be a
/// header, hunk, context, addition, removal, or `\ No newline` marker.
pub fn patch(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    let patterns = ctx.patterns;
    let first = ctx.text.lines().next()?;

    let opens = first.starts_with("diff ")
        || first.starts_with("--- ")
        || first.starts_with("Index: ")
        || patterns.hunk_header.is_match(first);
    if !opens {
        return None;
    }

    let lines: Vec<&str> = ctx.text.lines().map(|l| l.trim_end_matches('\r')).collect();
    if !lines.iter().all(|l| is_diff_line(l, patterns)) {
        return None;
    }

    let hunks = lines.iter().filter(|l| patterns.hunk_header.is_match(l)).count();
    let git = first.starts_with("diff --git");
    if hunks == 0 && !git {
        return None;
    }

    let mut files: Vec<String> = Vec::new();
    let mut additions = 0usize;
    let mut deletions = 0usize;

    for line in &lines {
        if let Some(path) = line.strip_prefix("+++ ") {
            let path = path.split('\t').next().unwrap_or(path).trim();
            if path != "/dev/null" {
                files.push(path.strip_prefix("b/").unwrap_or(path).to_string());
            }
        } else if let Some(rest) = line.strip_prefix("diff --git ") {
            // Header-only entries (renames, mode changes) have no +++ line
            if let Some((_, b)) = rest.split_once(" b/") {
                if !files.iter().any(|f| f == b) {
                    files.push(b.to_string());
                }
            }
        } else if line.starts_with('+') {
            additions += 1;
        } else if line.starts_with('-') && !line.starts_with("--- ") {
            deletions += 1;
        }
    }
    files.dedup();

    Some(
        RuleMatch::whole(Category::Patch, 0.95, ctx.text)
            .with_meta("files", files)
            .with_meta("hunks", hunks)
            .with_meta("additions", additions)
            .with_meta("deletions", deletions),
    )
}
