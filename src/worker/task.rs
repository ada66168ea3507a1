//! CPU-bound work units shared by pool workers and the in-process fallback.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::analysis::{
    analyze_quality, build_symbol_table, find_references, parse_outline, trace_data_flow,
    Language, OutlineOptions, SyntaxValidator,
};
use crate::error::{ToolError, ToolResult};
use crate::workspace::{search_content, CodeIndex};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub enum WorkerTask {
    ParseAst {
        file: SourceFile,
        include_nested: bool,
    },
    ResolveSymbols {
        symbol: String,
        files: Vec<SourceFile>,
    },
    TraceDataFlow {
        file: SourceFile,
        variable: String,
    },
    QualityMetrics {
        file: SourceFile,
    },
    ValidateSyntax {
        file: SourceFile,
        language: Option<String>,
    },
    BuildSymbolTable {
        file: SourceFile,
    },
    SearchContent {
        index: Arc<CodeIndex>,
        term: String,
        context: usize,
        max_files: usize,
    },
}

impl WorkerTask {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerTask::ParseAst { .. } => "parse_ast",
            WorkerTask::ResolveSymbols { .. } => "resolve_symbols",
            WorkerTask::TraceDataFlow { .. } => "trace_data_flow",
            WorkerTask::QualityMetrics { .. } => "quality_metrics",
            WorkerTask::ValidateSyntax { .. } => "validate_syntax",
            WorkerTask::BuildSymbolTable { .. } => "build_symbol_table",
            WorkerTask::SearchContent { .. } => "search_content",
        }
    }

    /// Build a task from a `processFile(kind, payload)` style request.
    pub fn from_request(kind: &str, payload: Value) -> ToolResult<Self> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Payload {
            #[serde(alias = "filename")]
            path: String,
            #[serde(default)]
            content: String,
            #[serde(default)]
            variable: Option<String>,
            #[serde(default)]
            symbol: Option<String>,
            #[serde(default)]
            language: Option<String>,
            #[serde(default, alias = "include_nested")]
            include_nested: bool,
        }

        let p: Payload = serde_json::from_value(payload)
            .map_err(|e| ToolError::BadRequest(format!("Invalid {} payload: {}", kind, e)))?;
        let file = SourceFile {
            path: p.path,
            content: p.content,
        };
        let required = |value: Option<String>, name: &str| {
            value.ok_or_else(|| ToolError::BadRequest(format!("{} requires '{}'", kind, name)))
        };

        Ok(match kind {
            "parse_ast" => WorkerTask::ParseAst {
                file,
                include_nested: p.include_nested,
            },
            "resolve_symbols" => WorkerTask::ResolveSymbols {
                symbol: required(p.symbol, "symbol")?,
                files: vec![file],
            },
            "trace_data_flow" => WorkerTask::TraceDataFlow {
                variable: required(p.variable, "variable")?,
                file,
            },
            "quality_metrics" => WorkerTask::QualityMetrics { file },
            "validate_syntax" => WorkerTask::ValidateSyntax {
                file,
                language: p.language,
            },
            "build_symbol_table" => WorkerTask::BuildSymbolTable { file },
            other => {
                return Err(ToolError::Unsupported(format!(
                    "Unknown worker operation '{}'",
                    other
                )))
            }
        })
    }
}

fn to_json<T: Serialize>(value: &T) -> ToolResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| ToolError::Internal(format!("Failed to serialize worker result: {}", e)))
}

fn resolve_symbols(symbol: &str, files: &[SourceFile]) -> ToolResult<Value> {
    let mut definitions = Vec::new();
    let mut references = Vec::new();

    for file in files {
        let def_lines: Vec<usize> = match build_symbol_table(&file.content, &file.path) {
            Ok(table) => table
                .get(symbol)
                .map(|entries| {
                    for entry in entries {
                        definitions.push(json!({
                            "file": file.path,
                            "kind": entry.kind,
                            "line": entry.line,
                            "endLine": entry.end_line,
                            "parent": entry.parent,
                        }));
                    }
                    entries.iter().map(|e| e.line).collect()
                })
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        references.extend(find_references(&file.path, &file.content, symbol, &def_lines)?);
    }

    Ok(json!({
        "symbol": symbol,
        "definitions": definitions,
        "references": references,
    }))
}

/// Run `task` to completion on the current thread.
pub fn execute_task(task: &WorkerTask, validator: &SyntaxValidator) -> ToolResult<Value> {
    match task {
        WorkerTask::ParseAst {
            file,
            include_nested,
        } => to_json(&parse_outline(
            &file.content,
            &file.path,
            OutlineOptions {
                include_nested: *include_nested,
            },
        )?),
        WorkerTask::ResolveSymbols { symbol, files } => resolve_symbols(symbol, files),
        WorkerTask::TraceDataFlow { file, variable } => to_json(&trace_data_flow(
            &file.content,
            variable,
            Language::from_path(&file.path),
        )?),
        WorkerTask::QualityMetrics { file } => to_json(&analyze_quality(&file.content, &file.path)?),
        WorkerTask::ValidateSyntax { file, language } => {
            let report = match language {
                Some(name) => validator.validate_as(&file.path, &file.content, Language::from_name(name)),
                None => validator.validate(&file.path, &file.content),
            };
            to_json(&report)
        }
        WorkerTask::BuildSymbolTable { file } => {
            to_json(&build_symbol_table(&file.content, &file.path)?)
        }
        WorkerTask::SearchContent {
            index,
            term,
            context,
            max_files,
        } => to_json(&search_content(index, term, *context, *max_files)),
    }
}

/// Per-item batch envelope; one failure does not fail the batch.
pub fn batch_entry(result: ToolResult<Value>) -> Value {
    match result {
        Ok(value) => json!({"ok": true, "result": value}),
        Err(e) => json!({"ok": false, "error": {"kind": e.kind(), "message": e.message()}}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn file(path: &str, content: &str) -> SourceFile {
        SourceFile {
            path: path.into(),
            content: content.into(),
        }
    }

    #[test]
    fn test_from_request_kinds() {
        let task = WorkerTask::from_request(
            "trace_data_flow",
            json!({"path": "a.js", "content": "let a = 1;", "variable": "a"}),
        )
        .unwrap();
        assert_eq!(task.kind(), "trace_data_flow");

        let err = WorkerTask::from_request("trace_data_flow", json!({"path": "a.js"})).unwrap_err();
        assert!(err.message().contains("variable"));
        assert!(WorkerTask::from_request("compile", json!({"path": "a"})).is_err());
    }

    #[test]
    fn test_resolve_symbols_marks_definitions() {
        let task = WorkerTask::ResolveSymbols {
            symbol: "total".into(),
            files: vec![file("a.py", "def total():\n    pass\n\nprint(total())\n")],
        };
        let out = execute_task(&task, &SyntaxValidator::default()).unwrap();
        assert_eq!(out["definitions"][0]["line"], 1);
        assert_eq!(out["references"].as_array().unwrap().len(), 2);
        assert_eq!(out["references"][0]["is_definition"], true);
    }

    #[test]
    fn test_batch_entry_isolates_failures() {
        let validator = SyntaxValidator::default();
        let ok = batch_entry(execute_task(
            &WorkerTask::ValidateSyntax {
                file: file("ok.json", "{}"),
                language: None,
            },
            &validator,
        ));
        let failed = batch_entry(execute_task(
            &WorkerTask::TraceDataFlow {
                file: file("a.js", "x"),
                variable: " ".into(),
            },
            &validator,
        ));
        assert_eq!(ok["ok"], true);
        assert_eq!(ok["result"]["valid"], true);
        assert_eq!(failed["ok"], false);
        assert_eq!(failed["error"]["kind"], "BadRequest");
    }
}
