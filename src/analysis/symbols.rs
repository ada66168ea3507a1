//! Symbol tables and reference search.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

use super::ast::{parse_outline, OutlineOptions};
use crate::error::{ToolError, ToolResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolEntry {
    pub kind: String,
    pub line: usize,
    pub end_line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

pub type SymbolTable = BTreeMap<String, Vec<SymbolEntry>>;

pub fn build_symbol_table(content: &str, path: &str) -> ToolResult<SymbolTable> {
    let outline = parse_outline(
        content,
        path,
        OutlineOptions {
            include_nested: true,
        },
    )?;
    let mut table = SymbolTable::new();
    for symbol in outline.symbols {
        table.entry(symbol.name).or_default().push(SymbolEntry {
            kind: symbol.kind,
            line: symbol.start_line,
            end_line: symbol.end_line,
            parent: symbol.parent,
        });
    }
    Ok(table)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolReference {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub text: String,
    pub is_definition: bool,
}

/// Whole-word regex for an identifier.
pub fn word_regex(symbol: &str) -> ToolResult<Regex> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(ToolError::BadRequest("Symbol name must not be empty".into()));
    }
    Regex::new(&format!(r"(^|[^\w$]){}($|[^\w$])", regex::escape(symbol)))
        .map_err(|e| ToolError::BadRequest(format!("Invalid symbol '{}': {}", symbol, e)))
}

/// Every whole-word occurrence of `symbol` in one file. Lines holding a
/// definition of the symbol are flagged.
pub fn find_references(
    file: &str,
    content: &str,
    symbol: &str,
    definition_lines: &[usize],
) -> ToolResult<Vec<SymbolReference>> {
    let pattern = word_regex(symbol)?;
    let mut refs = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if let Some(m) = pattern.find(line) {
            let offset = line[m.start()..].find(symbol.trim()).unwrap_or(0);
            refs.push(SymbolReference {
                file: file.to_string(),
                line: idx + 1,
                column: m.start() + offset + 1,
                text: line.trim().to_string(),
                is_definition: definition_lines.contains(&(idx + 1)),
            });
        }
    }
    Ok(refs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_table_groups_by_name() {
        let src = "def load():\n    pass\n\nclass Loader:\n    def load(self):\n        pass\n";
        let table = build_symbol_table(src, "io.py").unwrap();
        let load = table.get("load").unwrap();
        assert_eq!(load.len(), 2);
        assert_eq!(load[0].kind, "function");
        assert_eq!(load[1].kind, "method");
        assert_eq!(load[1].parent.as_deref(), Some("Loader"));
    }

    #[test]
    fn test_references_are_whole_word() {
        let src = "let count = 0;\ncount += 1;\nlet counter = count;\n";
        let refs = find_references("a.js", src, "count", &[1]).unwrap();
        assert_eq!(refs.len(), 3);
        assert!(refs[0].is_definition);
        assert_eq!(refs[2].column, 15);
        assert!(find_references("a.js", src, "coun", &[]).unwrap().is_empty());
    }
}
