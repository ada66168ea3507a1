//! Built-in tool catalog.

mod edit;
mod fs;
mod index;
mod intel;
mod meta;
mod tasks;
mod web;

use serde::Serialize;
use serde_json::Value;

use super::registry::ToolDescriptor;
use crate::edit::read_text;
use crate::error::{ToolError, ToolResult};
use crate::workspace::Workspace;

/// Every built-in tool, in catalog order.
pub fn builtin_tools() -> Vec<ToolDescriptor> {
    let mut tools = Vec::new();
    tools.extend(fs::tools());
    tools.extend(edit::tools());
    tools.extend(index::tools());
    tools.extend(intel::tools());
    tools.extend(web::tools());
    tools.extend(tasks::tools());
    tools.extend(meta::tools());
    tools
}

pub(super) fn to_payload<T: Serialize>(value: &T) -> ToolResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| ToolError::Internal(format!("Failed to serialize tool result: {}", e)))
}

/// A workspace file resolved and read as UTF-8.
pub(super) struct LoadedFile {
    pub rel: String,
    pub content: String,
}

pub(super) async fn load_file(ws: &Workspace, raw: &str) -> ToolResult<LoadedFile> {
    let rel = ws.normalize(raw)?;
    let abs = ws.root().join(&rel);
    if abs.is_dir() {
        return Err(ToolError::BadRequest(format!(
            "{} is a directory, not a file",
            rel
        )));
    }
    let content = read_text(&abs, &rel).await?;
    Ok(LoadedFile { rel, content })
}

/// `N: line` rendering used by every tool that shows line numbers.
pub(super) fn number_lines<'a>(lines: impl Iterator<Item = &'a str>, first: usize) -> String {
    lines
        .enumerate()
        .map(|(i, line)| format!("{}: {}", first + i, line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_names_are_unique() {
        let tools = builtin_tools();
        let names: HashSet<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), tools.len());
        for required in [
            "get_project_structure",
            "read_file",
            "apply_diff",
            "edit_file",
            "undo_last_change",
            "query_codebase",
            "analyze_code",
            "perform_research",
            "task_create",
            "recommend_tools",
        ] {
            assert!(names.contains(required), "missing {}", required);
        }
    }

    #[test]
    fn test_mutations_checkpoint_and_reads_cache() {
        for tool in builtin_tools() {
            if tool.creates_checkpoint {
                assert!(!tool.cacheable, "{} mutates and caches", tool.name);
                assert!(tool.requires_project, "{} mutates without a project", tool.name);
            }
        }
        let cacheable: HashSet<String> = builtin_tools()
            .into_iter()
            .filter(|t| t.cacheable)
            .map(|t| t.name)
            .collect();
        let expected: HashSet<String> = ["read_file", "get_project_structure", "search_in_file"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(cacheable, expected);
    }

    #[test]
    fn test_number_lines() {
        assert_eq!(number_lines("a\nb".lines(), 1), "1: a\n2: b");
        assert_eq!(number_lines("x".lines(), 7), "7: x");
    }
}
