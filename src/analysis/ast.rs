//! Structural outlines.
//!
//! Tree-sitter languages get a real syntax tree; everything else falls back
//! to the regex definitions the indexer uses.

use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Parser, Tree};

use super::language::Language;
use crate::error::{ToolError, ToolResult};
use crate::workspace::{extract_definitions, DefinitionKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub kind: String,
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AstOutline {
    pub language: String,
    pub parser: String,
    pub symbols: Vec<SymbolInfo>,
    pub node_count: usize,
    pub has_errors: bool,
    pub line_count: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OutlineOptions {
    /// Include nested functions and closures bound to names.
    pub include_nested: bool,
}

pub fn parse_tree(content: &str, language: Language) -> ToolResult<Tree> {
    let ts_language = language.tree_sitter_language()?;
    let mut parser = Parser::new();
    parser
        .set_language(&ts_language)
        .map_err(|e| ToolError::Internal(format!("Failed to set language: {e}")))?;
    parser
        .parse(content, None)
        .ok_or_else(|| ToolError::Internal("Failed to parse source code".to_string()))
}

/// Map a tree-sitter node kind to a symbol kind for the given language.
fn symbol_kind(language: Language, kind: &str, inside_type: bool) -> Option<&'static str> {
    match language {
        Language::Rust => match kind {
            "function_item" if inside_type => Some("method"),
            "function_item" => Some("function"),
            "struct_item" => Some("struct"),
            "enum_item" => Some("enum"),
            "trait_item" => Some("trait"),
            "impl_item" => Some("impl"),
            "mod_item" => Some("module"),
            "const_item" | "static_item" => Some("constant"),
            "type_item" => Some("type"),
            "macro_definition" => Some("macro"),
            _ => None,
        },
        Language::Python => match kind {
            "function_definition" if inside_type => Some("method"),
            "function_definition" => Some("function"),
            "class_definition" => Some("class"),
            _ => None,
        },
        Language::JavaScript | Language::TypeScript | Language::Tsx => match kind {
            "function_declaration" | "generator_function_declaration" => Some("function"),
            "class_declaration" | "abstract_class_declaration" => Some("class"),
            "method_definition" => Some("method"),
            "interface_declaration" => Some("interface"),
            "type_alias_declaration" => Some("type"),
            "enum_declaration" => Some("enum"),
            "variable_declarator" => Some("variable"),
            _ => None,
        },
        _ => None,
    }
}

fn node_name(node: Node, source: &[u8]) -> Option<String> {
    if node.kind() == "impl_item" {
        let target = node.child_by_field_name("type")?;
        let text = target.utf8_text(source).ok()?;
        return Some(match node.child_by_field_name("trait") {
            Some(tr) => format!("{} for {}", tr.utf8_text(source).unwrap_or_default(), text),
            None => text.to_string(),
        });
    }
    let name = node.child_by_field_name("name")?;
    name.utf8_text(source).ok().map(str::to_string)
}

fn is_function_value(node: Node) -> bool {
    node.child_by_field_name("value")
        .map(|v| {
            matches!(
                v.kind(),
                "arrow_function" | "function" | "function_expression" | "generator_function"
            )
        })
        .unwrap_or(false)
}

fn is_type_container(kind: &str) -> bool {
    matches!(
        kind,
        "impl_item"
            | "trait_item"
            | "class_definition"
            | "class_declaration"
            | "abstract_class_declaration"
    )
}

struct Walker<'a> {
    language: Language,
    source: &'a [u8],
    options: OutlineOptions,
    symbols: Vec<SymbolInfo>,
    node_count: usize,
}

impl<'a> Walker<'a> {
    fn visit(&mut self, node: Node, parent: Option<&str>, depth: usize, inside_type: bool) {
        self.node_count += 1;
        let kind = node.kind();
        let mut next_parent = parent.map(str::to_string);
        let mut next_inside_type = inside_type;

        if let Some(sym_kind) = symbol_kind(self.language, kind, inside_type) {
            let mut sym_kind = sym_kind;
            let top_level_enough = depth <= 2 || inside_type || self.options.include_nested;
            let keep = match kind {
                // Only named functions count as variables worth listing, or
                // top-level constants.
                "variable_declarator" => {
                    if is_function_value(node) {
                        sym_kind = "function";
                        true
                    } else {
                        depth <= 3 && parent.is_none()
                    }
                }
                _ => top_level_enough,
            };
            if keep {
                if let Some(name) = node_name(node, self.source) {
                    self.symbols.push(SymbolInfo {
                        kind: sym_kind.to_string(),
                        name: name.clone(),
                        start_line: node.start_position().row + 1,
                        end_line: node.end_position().row + 1,
                        parent: parent.map(str::to_string),
                    });
                    if is_type_container(kind) {
                        next_parent = Some(name);
                        next_inside_type = true;
                    }
                }
            }
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child, next_parent.as_deref(), depth + 1, next_inside_type);
        }
    }
}

/// Outline `content`. Non-tree-sitter files use regex definitions.
pub fn parse_outline(content: &str, path: &str, options: OutlineOptions) -> ToolResult<AstOutline> {
    let language = Language::from_path(path);
    let line_count = content.lines().count();

    if !language.supports_ast() {
        let symbols = extract_definitions(path, content)
            .into_iter()
            .filter(|d| !matches!(d.kind, DefinitionKind::File | DefinitionKind::Todo))
            .map(|d| SymbolInfo {
                kind: d.kind.as_str().to_string(),
                name: d.label().to_string(),
                start_line: d.line,
                end_line: d.line,
                parent: None,
            })
            .collect();
        return Ok(AstOutline {
            language: language.as_str().to_string(),
            parser: "regex".to_string(),
            symbols,
            node_count: 0,
            has_errors: false,
            line_count,
        });
    }

    let tree = parse_tree(content, language)?;
    let root = tree.root_node();
    let mut walker = Walker {
        language,
        source: content.as_bytes(),
        options,
        symbols: Vec::new(),
        node_count: 0,
    };
    walker.visit(root, None, 0, false);

    Ok(AstOutline {
        language: language.as_str().to_string(),
        parser: "tree-sitter".to_string(),
        symbols: walker.symbols,
        node_count: walker.node_count,
        has_errors: root.has_error(),
        line_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_outline_with_methods() {
        let src = "struct Cart { items: Vec<u32> }\n\nimpl Cart {\n    fn total(&self) -> u32 {\n        self.items.iter().sum()\n    }\n}\n\nfn main() {}\n";
        let outline = parse_outline(src, "src/cart.rs", OutlineOptions::default()).unwrap();
        assert_eq!(outline.parser, "tree-sitter");
        assert!(!outline.has_errors);
        let total = outline.symbols.iter().find(|s| s.name == "total").unwrap();
        assert_eq!(total.kind, "method");
        assert_eq!(total.parent.as_deref(), Some("Cart"));
        assert_eq!((total.start_line, total.end_line), (4, 6));
        assert!(outline
            .symbols
            .iter()
            .any(|s| s.name == "main" && s.kind == "function"));
    }

    #[test]
    fn test_javascript_arrow_is_function() {
        let src = "const add = (a, b) => a + b;\nclass Box {\n  open() { return 1; }\n}\n";
        let outline = parse_outline(src, "util.js", OutlineOptions::default()).unwrap();
        let add = outline.symbols.iter().find(|s| s.name == "add").unwrap();
        assert_eq!(add.kind, "function");
        let open = outline.symbols.iter().find(|s| s.name == "open").unwrap();
        assert_eq!(open.kind, "method");
        assert_eq!(open.parent.as_deref(), Some("Box"));
    }

    #[test]
    fn test_python_class_methods() {
        let src = "class A:\n    def run(self):\n        pass\n";
        let outline = parse_outline(src, "a.py", OutlineOptions::default()).unwrap();
        let run = outline.symbols.iter().find(|s| s.name == "run").unwrap();
        assert_eq!(run.kind, "method");
    }

    #[test]
    fn test_regex_fallback_for_go() {
        let src = "package main\n\nfunc Handle() {}\n";
        let outline = parse_outline(src, "main.go", OutlineOptions::default()).unwrap();
        assert_eq!(outline.parser, "regex");
        assert_eq!(outline.symbols[0].name, "Handle");
    }
}
