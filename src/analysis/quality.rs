//! Code quality metrics, issues and refactoring suggestions.

use serde::{Deserialize, Serialize};

use super::ast::{parse_outline, OutlineOptions, SymbolInfo};
use super::language::Language;
use crate::error::ToolResult;

const LONG_LINE: usize = 120;
const LONG_FUNCTION: usize = 50;
const DEEP_NESTING: usize = 4;
const COMPLEX_FUNCTION: usize = 10;
const LARGE_FILE_LINES: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionMetrics {
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub length: usize,
    pub complexity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub total_lines: usize,
    pub code_lines: usize,
    pub comment_lines: usize,
    pub blank_lines: usize,
    pub function_count: usize,
    pub type_count: usize,
    pub max_nesting: usize,
    pub complexity: usize,
    pub long_lines: usize,
    pub todo_count: usize,
    pub functions: Vec<FunctionMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub severity: String,
    pub line: Option<usize>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub language: String,
    pub metrics: QualityMetrics,
    pub score: u32,
    pub grade: char,
    pub issues: Vec<QualityIssue>,
}

const BRANCH_TOKENS: &[&str] = &[
    "if ", "if(", "else if", "elif ", "for ", "for(", "while ", "while(", "case ", "catch",
    "except", "match ", "&&", "||", "?", " and ", " or ",
];

/// Rough cyclomatic complexity: 1 + branch tokens.
pub fn complexity_of(text: &str) -> usize {
    1 + text
        .lines()
        .map(|line| {
            let line = line.trim();
            BRANCH_TOKENS
                .iter()
                .map(|tok| line.matches(tok).count())
                .sum::<usize>()
        })
        .sum::<usize>()
}

fn is_comment(line: &str, language: Language) -> bool {
    let t = line.trim_start();
    t.starts_with(language.line_comment())
        || t.starts_with("/*")
        || t.starts_with('*')
        || t.starts_with("\"\"\"")
        || t.starts_with("<!--")
}

fn nesting_depth(content: &str, language: Language) -> usize {
    if language.uses_braces() {
        let mut depth = 0usize;
        let mut max = 0usize;
        for c in content.chars() {
            match c {
                '{' => {
                    depth += 1;
                    max = max.max(depth);
                }
                '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        max
    } else {
        let unit = content
            .lines()
            .filter_map(|l| {
                let indent = l.len() - l.trim_start().len();
                (indent > 0 && !l.trim().is_empty()).then_some(indent)
            })
            .min()
            .unwrap_or(4)
            .max(1);
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| (l.len() - l.trim_start().len()) / unit)
            .max()
            .unwrap_or(0)
    }
}

fn is_function(symbol: &SymbolInfo) -> bool {
    matches!(symbol.kind.as_str(), "function" | "method")
}

pub fn compute_metrics(content: &str, path: &str) -> ToolResult<QualityMetrics> {
    let language = Language::from_path(path);
    let outline = parse_outline(content, path, OutlineOptions::default())?;
    let lines: Vec<&str> = content.lines().collect();

    let blank_lines = lines.iter().filter(|l| l.trim().is_empty()).count();
    let comment_lines = lines
        .iter()
        .filter(|l| !l.trim().is_empty() && is_comment(l, language))
        .count();

    let functions: Vec<FunctionMetrics> = outline
        .symbols
        .iter()
        .filter(|s| is_function(s))
        .map(|s| {
            let start = s.start_line.saturating_sub(1).min(lines.len());
            let end = s.end_line.min(lines.len()).max(start);
            FunctionMetrics {
                name: s.name.clone(),
                start_line: s.start_line,
                end_line: s.end_line,
                length: s.end_line.saturating_sub(s.start_line) + 1,
                complexity: complexity_of(&lines[start..end].join("\n")),
            }
        })
        .collect();

    Ok(QualityMetrics {
        total_lines: lines.len(),
        code_lines: lines.len() - blank_lines - comment_lines,
        comment_lines,
        blank_lines,
        function_count: functions.len(),
        type_count: outline
            .symbols
            .iter()
            .filter(|s| {
                matches!(
                    s.kind.as_str(),
                    "class" | "struct" | "enum" | "trait" | "interface"
                )
            })
            .count(),
        max_nesting: nesting_depth(content, language),
        complexity: complexity_of(content),
        long_lines: lines.iter().filter(|l| l.chars().count() > LONG_LINE).count(),
        todo_count: lines
            .iter()
            .filter(|l| l.contains("TODO") || l.contains("FIXME"))
            .count(),
        functions,
    })
}

pub fn analyze_quality(content: &str, path: &str) -> ToolResult<QualityReport> {
    let language = Language::from_path(path);
    let metrics = compute_metrics(content, path)?;
    let mut issues = Vec::new();
    let mut penalty: u32 = 0;

    for f in &metrics.functions {
        if f.length > LONG_FUNCTION {
            penalty += 5;
            issues.push(QualityIssue {
                severity: "warning".into(),
                line: Some(f.start_line),
                message: format!("Function '{}' is {} lines long", f.name, f.length),
            });
        }
        if f.complexity > COMPLEX_FUNCTION {
            penalty += 5;
            issues.push(QualityIssue {
                severity: "warning".into(),
                line: Some(f.start_line),
                message: format!(
                    "Function '{}' has high complexity ({})",
                    f.name, f.complexity
                ),
            });
        }
    }
    if metrics.max_nesting > DEEP_NESTING {
        penalty += 3 * (metrics.max_nesting - DEEP_NESTING) as u32;
        issues.push(QualityIssue {
            severity: "warning".into(),
            line: None,
            message: format!("Nesting depth reaches {}", metrics.max_nesting),
        });
    }
    if metrics.long_lines > 0 {
        penalty += (metrics.long_lines as u32).min(10);
        issues.push(QualityIssue {
            severity: "info".into(),
            line: None,
            message: format!(
                "{} line(s) longer than {} characters",
                metrics.long_lines, LONG_LINE
            ),
        });
    }
    if metrics.total_lines > LARGE_FILE_LINES {
        penalty += 5;
        issues.push(QualityIssue {
            severity: "info".into(),
            line: None,
            message: format!("File has {} lines", metrics.total_lines),
        });
    }
    if metrics.todo_count > 0 {
        penalty += (metrics.todo_count as u32).min(5);
        issues.push(QualityIssue {
            severity: "info".into(),
            line: None,
            message: format!("{} TODO/FIXME marker(s)", metrics.todo_count),
        });
    }
    if metrics.code_lines > 50 && metrics.comment_lines == 0 {
        penalty += 5;
        issues.push(QualityIssue {
            severity: "info".into(),
            line: None,
            message: "No comments in a non-trivial file".into(),
        });
    }

    let score = 100u32.saturating_sub(penalty);
    let grade = match score {
        90..=100 => 'A',
        80..=89 => 'B',
        70..=79 => 'C',
        60..=69 => 'D',
        _ => 'F',
    };

    Ok(QualityReport {
        language: language.as_str().to_string(),
        metrics,
        score,
        grade,
        issues,
    })
}

/// Refactoring suggestions derived from the quality report.
pub fn architecture_suggestions(report: &QualityReport) -> Vec<String> {
    let m = &report.metrics;
    let mut suggestions = Vec::new();

    for f in &m.functions {
        if f.length > LONG_FUNCTION {
            suggestions.push(format!(
                "Split '{}' (lines {}-{}) into smaller helpers; it spans {} lines.",
                f.name, f.start_line, f.end_line, f.length
            ));
        }
        if f.complexity > COMPLEX_FUNCTION {
            suggestions.push(format!(
                "Reduce branching in '{}' (complexity {}): extract conditions or use early returns.",
                f.name, f.complexity
            ));
        }
    }
    if m.max_nesting > DEEP_NESTING {
        suggestions.push(format!(
            "Flatten nesting (depth {}) with guard clauses or extracted functions.",
            m.max_nesting
        ));
    }
    if m.total_lines > LARGE_FILE_LINES {
        suggestions.push(format!(
            "Consider splitting this {}-line file into modules by responsibility.",
            m.total_lines
        ));
    }
    if m.function_count > 20 && m.type_count == 0 {
        suggestions.push(
            "Many free functions and no types: group related functions behind a type or module."
                .into(),
        );
    }
    if m.type_count > 5 {
        suggestions.push(format!(
            "{} types in one file: move independent types into their own files.",
            m.type_count
        ));
    }
    if suggestions.is_empty() {
        suggestions.push("No structural problems detected.".into());
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complexity_counts_branches() {
        assert_eq!(complexity_of("let a = 1;"), 1);
        assert_eq!(complexity_of("if (a && b) {}\nwhile (x) {}"), 4);
    }

    #[test]
    fn test_metrics_line_classes() {
        let src = "// header\n\nfunction a() {\n  if (x) { return 1; }\n}\n";
        let metrics = compute_metrics(src, "a.js").unwrap();
        assert_eq!(metrics.total_lines, 5);
        assert_eq!(metrics.blank_lines, 1);
        assert_eq!(metrics.comment_lines, 1);
        assert_eq!(metrics.code_lines, 3);
        assert_eq!(metrics.function_count, 1);
        assert_eq!(metrics.functions[0].complexity, 2);
        assert_eq!(metrics.max_nesting, 2);
    }

    #[test]
    fn test_long_function_is_flagged() {
        let body: String = (0..60).map(|i| format!("    let v{} = {};\n", i, i)).collect();
        let src = format!("fn big() {{\n{}}}\n", body);
        let report = analyze_quality(&src, "big.rs").unwrap();
        assert!(report.score < 100);
        assert!(report.issues.iter().any(|i| i.message.contains("'big'")));
        assert!(architecture_suggestions(&report)
            .iter()
            .any(|s| s.starts_with("Split 'big'")));
    }

    #[test]
    fn test_python_nesting_by_indent() {
        let src = "def a():\n    if x:\n        for y in z:\n            pass\n";
        assert_eq!(nesting_depth(src, Language::Python), 3);
    }
}
