//! Line-level data-flow tracing for a single variable.

use regex::Regex;
use serde::Serialize;

use super::language::Language;
use super::symbols::word_regex;
use crate::error::{ToolError, ToolResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    Declaration,
    Parameter,
    Assignment,
    Mutation,
    Read,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowStep {
    pub line: usize,
    pub kind: FlowKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataFlow {
    pub variable: String,
    pub steps: Vec<FlowStep>,
    pub declared_at: Option<usize>,
    pub assignments: usize,
    pub reads: usize,
    /// Reads that occur before any declaration or assignment.
    pub reads_before_write: Vec<usize>,
}

fn build(pattern: &str) -> ToolResult<Regex> {
    Regex::new(pattern).map_err(|e| ToolError::Internal(format!("Invalid flow pattern: {}", e)))
}

pub fn trace_data_flow(content: &str, variable: &str, language: Language) -> ToolResult<DataFlow> {
    let var = variable.trim();
    if var.is_empty() {
        return Err(ToolError::BadRequest("Variable name must not be empty".into()));
    }
    let escaped = regex::escape(var);
    let word = word_regex(var)?;
    let declaration = build(&format!(
        r"\b(?:let|const|var|static|val|auto|my|local)\s+(?:mut\s+)?(?:\{{[^}}]*\b|\[[^\]]*\b)?{}\b",
        escaped
    ))?;
    let parameter = build(&format!(
        r"(?:\bfn\b|\bdef\b|\bfunction\b|\bfunc\b|=>|\)\s*\{{)[^\n]*?[(,]\s*(?:mut\s+|&\s*)?{}\s*[:,)=]",
        escaped
    ))?;
    let assignment = build(&format!(
        r"(?:^|[^\w$.]){}\s*(?::[^=]+)?(?:[-+*/%&|^]|\*\*|<<|>>|\?\?|\|\||&&)?=[^=>]",
        escaped
    ))?;
    let mutation = build(&format!(
        r"(?:\+\+|--){}\b|\b{}(?:\+\+|--)|\b{}\s*\.\s*(?:push|pop|insert|remove|append|extend|clear|set|add|delete|splice|shift|unshift)\s*\(",
        escaped, escaped, escaped
    ))?;

    let mut steps = Vec::new();
    let mut declared_at = None;
    let mut written = false;
    let mut reads_before_write = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with(language.line_comment()) || !word.is_match(line) {
            continue;
        }
        let line_no = idx + 1;
        let kind = if declaration.is_match(line) {
            FlowKind::Declaration
        } else if parameter.is_match(line) {
            FlowKind::Parameter
        } else if mutation.is_match(line) {
            FlowKind::Mutation
        } else if assignment.is_match(line) {
            if declared_at.is_none() && !written && language == Language::Python {
                FlowKind::Declaration
            } else {
                FlowKind::Assignment
            }
        } else {
            FlowKind::Read
        };

        match kind {
            FlowKind::Declaration | FlowKind::Parameter => {
                if declared_at.is_none() {
                    declared_at = Some(line_no);
                }
                written = true;
            }
            FlowKind::Assignment | FlowKind::Mutation => written = true,
            FlowKind::Read => {
                if !written {
                    reads_before_write.push(line_no);
                }
            }
        }

        steps.push(FlowStep {
            line: line_no,
            kind,
            text: line.trim().to_string(),
        });
    }

    let assignments = steps
        .iter()
        .filter(|s| matches!(s.kind, FlowKind::Assignment | FlowKind::Mutation))
        .count();
    let reads = steps.iter().filter(|s| s.kind == FlowKind::Read).count();

    Ok(DataFlow {
        variable: var.to_string(),
        steps,
        declared_at,
        assignments,
        reads,
        reads_before_write,
    })
}
