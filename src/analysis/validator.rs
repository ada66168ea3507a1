//! Syntax validation with a content-addressed cache.
//!
//! Tree-sitter languages report ERROR and MISSING nodes, JSON goes through
//! `serde_json`, and other brace languages get a bracket-balance check that
//! skips strings and comments. Reports are cached by (path, SHA-256).

use lru::LruCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tree_sitter::Node;

use super::ast::parse_tree;
use super::language::Language;

const MAX_ISSUES: usize = 20;
pub const DEFAULT_VALIDATION_CACHE_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntaxIssue {
    pub line: usize,
    pub column: usize,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub language: String,
    pub checker: String,
    pub issues: Vec<SyntaxIssue>,
}

impl ValidationReport {
    fn clean(language: Language, checker: &str) -> Self {
        Self {
            valid: true,
            language: language.as_str().to_string(),
            checker: checker.to_string(),
            issues: Vec::new(),
        }
    }

    fn with_issues(language: Language, checker: &str, issues: Vec<SyntaxIssue>) -> Self {
        Self {
            valid: !issues.iter().any(|i| i.severity == Severity::Error),
            language: language.as_str().to_string(),
            checker: checker.to_string(),
            issues,
        }
    }

    /// One-line-per-issue text appended to edit results.
    pub fn summary(&self) -> String {
        self.issues
            .iter()
            .map(|i| format!("  line {}:{} {}", i.line, i.column, i.message))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Validate `content` as `language`. Pure; no caching.
pub fn validate_content(content: &str, language: Language) -> ValidationReport {
    if language.supports_ast() {
        return match parse_tree(content, language) {
            Ok(tree) => {
                let mut issues = Vec::new();
                collect_tree_errors(tree.root_node(), content.as_bytes(), &mut issues);
                ValidationReport::with_issues(language, "tree-sitter", issues)
            }
            Err(e) => ValidationReport::with_issues(
                language,
                "tree-sitter",
                vec![SyntaxIssue {
                    line: 1,
                    column: 1,
                    message: e.to_string(),
                    severity: Severity::Warning,
                }],
            ),
        };
    }

    match language {
        Language::Json => validate_json(content),
        lang if lang.uses_braces() => {
            ValidationReport::with_issues(lang, "brackets", check_brackets(content))
        }
        lang => ValidationReport::clean(lang, "none"),
    }
}

fn validate_json(content: &str) -> ValidationReport {
    if content.trim().is_empty() {
        return ValidationReport::clean(Language::Json, "serde_json");
    }
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(_) => ValidationReport::clean(Language::Json, "serde_json"),
        Err(e) => ValidationReport::with_issues(
            Language::Json,
            "serde_json",
            vec![SyntaxIssue {
                line: e.line(),
                column: e.column(),
                message: e.to_string(),
                severity: Severity::Error,
            }],
        ),
    }
}

fn collect_tree_errors(node: Node, source: &[u8], issues: &mut Vec<SyntaxIssue>) {
    if issues.len() >= MAX_ISSUES || !node.has_error() {
        return;
    }
    if node.is_missing() || node.is_error() {
        let pos = node.start_position();
        let message = if node.is_missing() {
            format!("Missing '{}'", node.kind())
        } else {
            let snippet: String = node
                .utf8_text(source)
                .unwrap_or_default()
                .chars()
                .take(40)
                .collect();
            format!("Syntax error near '{}'", snippet.trim())
        };
        issues.push(SyntaxIssue {
            line: pos.row + 1,
            column: pos.column + 1,
            message,
            severity: Severity::Error,
        });
        if node.is_error() {
            return;
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_tree_errors(child, source, issues);
    }
}

/// Bracket balance, skipping string literals and comments.
pub fn check_brackets(content: &str) -> Vec<SyntaxIssue> {
    let mut issues = Vec::new();
    let mut stack: Vec<(char, usize, usize)> = Vec::new();
    let chars: Vec<char> = content.chars().collect();
    let (mut line, mut col) = (1usize, 0usize);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        col += 1;
        match c {
            '\n' => {
                line += 1;
                col = 0;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                col += 1;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    if chars[i] == '\n' {
                        line += 1;
                        col = 0;
                    } else {
                        col += 1;
                    }
                    i += 1;
                }
                i += 2;
                col += 2;
                continue;
            }
            '"' | '\'' | '`' => {
                let quote = c;
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    if chars[i] == '\\' {
                        i += 1;
                        col += 1;
                    }
                    if chars.get(i) == Some(&'\n') {
                        if quote != '`' {
                            break;
                        }
                        line += 1;
                        col = 0;
                    } else {
                        col += 1;
                    }
                    i += 1;
                }
            }
            '(' | '[' | '{' => stack.push((c, line, col)),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, _, _)) if open == expected => {}
                    Some((open, l, cl)) => issues.push(SyntaxIssue {
                        line,
                        column: col,
                        message: format!(
                            "Mismatched '{}' (opened '{}' at {}:{})",
                            c, open, l, cl
                        ),
                        severity: Severity::Error,
                    }),
                    None => issues.push(SyntaxIssue {
                        line,
                        column: col,
                        message: format!("Unmatched closing '{}'", c),
                        severity: Severity::Error,
                    }),
                }
            }
            _ => {}
        }
        if issues.len() >= MAX_ISSUES {
            return issues;
        }
        i += 1;
    }

    for (open, l, c) in stack.into_iter().take(MAX_ISSUES - issues.len()) {
        issues.push(SyntaxIssue {
            line: l,
            column: c,
            message: format!("Unclosed '{}'", open),
            severity: Severity::Error,
        });
    }
    issues
}

pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Validator shared by the edit pipeline and the code-intel tools.
pub struct SyntaxValidator {
    cache: Mutex<LruCache<(String, String), ValidationReport>>,
}

impl SyntaxValidator {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn validate(&self, path: &str, content: &str) -> ValidationReport {
        self.validate_as(path, content, Language::from_path(path))
    }

    pub fn validate_as(&self, path: &str, content: &str, language: Language) -> ValidationReport {
        let key = (path.to_string(), content_hash(content));
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(report) = cache.get(&key) {
                return report.clone();
            }
        }

        let report = validate_content(content, language);
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, report.clone());
        }
        report
    }

    /// Drop every cached report for `path`; returns how many were removed.
    pub fn invalidate_path(&self, path: &str) -> usize {
        let Ok(mut cache) = self.cache.lock() else {
            return 0;
        };
        let keys: Vec<(String, String)> = cache
            .iter()
            .filter(|((p, _), _)| p == path)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &keys {
            cache.pop(key);
        }
        keys.len()
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Default for SyntaxValidator {
    fn default() -> Self {
        Self::new(DEFAULT_VALIDATION_CACHE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_rust() {
        let report = validate_content("fn main() { let x = 1; }\n", Language::Rust);
        assert!(report.valid);
        assert_eq!(report.checker, "tree-sitter");
    }

    #[test]
    fn test_invalid_javascript_reports_line() {
        let report = validate_content("function a() {\n  let x = ;\n}\n", Language::JavaScript);
        assert!(!report.valid);
        assert!(report.issues.iter().any(|i| i.line == 2));
    }

    #[test]
    fn test_json_errors_have_position() {
        let report = validate_content("{\n  \"a\": 1,\n}", Language::Json);
        assert!(!report.valid);
        assert_eq!(report.issues[0].line, 3);
    }

    #[test]
    fn test_bracket_check_ignores_strings_and_comments() {
        assert!(check_brackets("func a() { s := \"}\" // }\n}").is_empty());
        let issues = check_brackets("class A {\n  void b() {\n}\n");
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("Unclosed"));
    }

    #[test]
    fn test_markup_is_not_checked() {
        let report = validate_content("# Title\n(unbalanced", Language::Markup);
        assert!(report.valid);
        assert_eq!(report.checker, "none");
    }

    #[test]
    fn test_cache_and_invalidation() {
        let validator = SyntaxValidator::new(4);
        validator.validate("a.json", "{}");
        validator.validate("a.json", "[]");
        validator.validate("b.json", "{}");
        assert_eq!(validator.cached_entries(), 3);

        assert_eq!(validator.invalidate_path("a.json"), 2);
        assert_eq!(validator.cached_entries(), 1);
    }
}
