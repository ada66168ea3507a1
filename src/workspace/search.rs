//! Substring search over indexed file content.

use serde::Serialize;

use super::index::CodeIndex;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineMatch {
    pub line: usize,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileMatches {
    pub file: String,
    pub matches: Vec<LineMatch>,
}

/// Case-insensitive substring search. `context` lines are taken from each
/// side of a match; at most `max_files` files are returned.
pub fn search_content(
    index: &CodeIndex,
    term: &str,
    context: usize,
    max_files: usize,
) -> Vec<FileMatches> {
    let needle = term.to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut results = Vec::new();
    for record in index.files.values() {
        if results.len() >= max_files {
            break;
        }
        let matches = search_text(&record.content, &needle, context);
        if !matches.is_empty() {
            results.push(FileMatches {
                file: record.path.clone(),
                matches,
            });
        }
    }
    results
}

/// Match lines of `content` against an already lowercased needle.
pub fn search_text(content: &str, needle_lower: &str, context: usize) -> Vec<LineMatch> {
    let lines: Vec<&str> = content.lines().collect();
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.to_lowercase().contains(needle_lower))
        .map(|(idx, line)| {
            let context_lines = if context == 0 {
                Vec::new()
            } else {
                let start = idx.saturating_sub(context);
                let end = (idx + context + 1).min(lines.len());
                (start..end)
                    .map(|i| format!("{}: {}", i + 1, lines[i]))
                    .collect()
            };
            LineMatch {
                line: idx + 1,
                text: line.to_string(),
                context: context_lines,
            }
        })
        .collect()
}
