//! Line-range edits with optional expected-content verification.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::endings::normalize;
use crate::error::{ToolError, ToolResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LineEdit {
    ReplaceLines {
        #[serde(alias = "startLine")]
        start_line: usize,
        #[serde(alias = "endLine")]
        end_line: usize,
        #[serde(alias = "newContent", default)]
        new_content: String,
        #[serde(alias = "expectedContent", default, skip_serializing_if = "Option::is_none")]
        expected_content: Option<String>,
    },
    InsertLines {
        #[serde(alias = "lineNumber")]
        line_number: usize,
        #[serde(alias = "newContent", default)]
        new_content: String,
    },
}

impl LineEdit {
    /// 1-based line the edit lands on; inserts land after `line_number`.
    fn target_line(&self) -> usize {
        match self {
            LineEdit::ReplaceLines { start_line, .. } => *start_line,
            LineEdit::InsertLines { line_number, .. } => line_number + 1,
        }
    }

    fn is_replace(&self) -> bool {
        matches!(self, LineEdit::ReplaceLines { .. })
    }
}

#[derive(Debug, Clone)]
pub struct LineEditOutcome {
    pub lines: Vec<String>,
    pub lines_affected: usize,
    pub warnings: Vec<String>,
}

/// Number of real lines; a trailing newline does not start a new line.
pub fn line_count(lines: &[String]) -> usize {
    if lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.len() - 1
    } else {
        lines.len()
    }
}

pub fn split_lines(content: &str) -> Vec<String> {
    content.split('\n').map(str::to_string).collect()
}

fn new_lines(content: &str) -> Vec<String> {
    let content = normalize(content);
    let content = content.strip_suffix('\n').unwrap_or(&content);
    if content.is_empty() {
        Vec::new()
    } else {
        split_lines(content)
    }
}

fn validate(lines: &[String], edits: &[LineEdit], warnings: &mut Vec<String>) -> ToolResult<()> {
    let total = line_count(lines);
    let mut ranges: Vec<(usize, usize)> = Vec::new();

    for edit in edits {
        match edit {
            LineEdit::ReplaceLines {
                start_line,
                end_line,
                expected_content,
                ..
            } => {
                let (start, end) = (*start_line, *end_line);
                if start < 1 || end < start || end > total {
                    return Err(ToolError::BadRequest(format!(
                        "Invalid line range {}-{}: file has {} lines (need 1 <= start_line <= end_line <= {})",
                        start, end, total, total
                    )));
                }
                match expected_content {
                    Some(expected) => {
                        let actual = lines[start - 1..end].join("\n");
                        let expected = normalize(expected);
                        if actual.trim() != expected.trim() {
                            return Err(ToolError::Conflict(format!(
                                "Expected content does not match lines {}-{}.\n\nExpected:\n{}\n\nActual:\n{}",
                                start, end, expected, actual
                            )));
                        }
                    }
                    None => warnings.push(format!(
                        "replace_lines {}-{} has no expected_content; edits without it are deprecated and may hit stale lines",
                        start, end
                    )),
                }
                if let Some((s, e)) = ranges.iter().find(|(s, e)| start <= *e && *s <= end) {
                    return Err(ToolError::BadRequest(format!(
                        "Line range {}-{} overlaps another edit on {}-{}",
                        start, end, s, e
                    )));
                }
                ranges.push((start, end));
            }
            LineEdit::InsertLines { line_number, .. } => {
                if *line_number > total {
                    return Err(ToolError::BadRequest(format!(
                        "Invalid line number {}: file has {} lines (need 0 <= line_number <= {})",
                        line_number, total, total
                    )));
                }
            }
        }
    }

    for edit in edits {
        if let LineEdit::InsertLines { line_number, .. } = edit {
            if let Some((s, e)) = ranges
                .iter()
                .find(|(s, e)| *s <= *line_number && *line_number < *e)
            {
                return Err(ToolError::BadRequest(format!(
                    "Insert after line {} falls inside replaced range {}-{}",
                    line_number, s, e
                )));
            }
        }
    }
    Ok(())
}

/// Validate every edit against `lines`, then apply them in one pass from
/// the bottom of the file up. Nothing is applied if any edit is invalid.
pub fn apply_line_edits(mut lines: Vec<String>, edits: &[LineEdit]) -> ToolResult<LineEditOutcome> {
    if edits.is_empty() {
        return Err(ToolError::BadRequest("No edits provided".to_string()));
    }
    let mut warnings = Vec::new();
    validate(&lines, edits, &mut warnings)?;

    let mut ordered: Vec<(usize, &LineEdit)> = edits.iter().enumerate().collect();
    ordered.sort_by(|(ia, a), (ib, b)| {
        b.target_line()
            .cmp(&a.target_line())
            .then_with(|| match (a.is_replace(), b.is_replace()) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => ib.cmp(ia),
            })
    });

    let mut lines_affected = 0;
    for (_, edit) in ordered {
        match edit {
            LineEdit::ReplaceLines {
                start_line,
                end_line,
                new_content,
                ..
            } => {
                let replacement = new_lines(new_content);
                let removed = end_line - start_line + 1;
                lines_affected += removed.max(replacement.len());
                lines.splice(start_line - 1..*end_line, replacement);
            }
            LineEdit::InsertLines {
                line_number,
                new_content,
            } => {
                let inserted = new_lines(new_content);
                lines_affected += inserted.len();
                lines.splice(*line_number..*line_number, inserted);
            }
        }
    }

    Ok(LineEditOutcome {
        lines,
        lines_affected,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn replace(start: usize, end: usize, new: &str, expected: Option<&str>) -> LineEdit {
        LineEdit::ReplaceLines {
            start_line: start,
            end_line: end,
            new_content: new.to_string(),
            expected_content: expected.map(str::to_string),
        }
    }

    fn insert(after: usize, new: &str) -> LineEdit {
        LineEdit::InsertLines {
            line_number: after,
            new_content: new.to_string(),
        }
    }

    fn run(content: &str, edits: &[LineEdit]) -> ToolResult<String> {
        apply_line_edits(split_lines(content), edits).map(|o| o.lines.join("\n"))
    }

    #[test]
    fn test_deserialize_snake_and_camel() {
        let snake: LineEdit = serde_json::from_str(
            r#"{"type":"replace_lines","start_line":1,"end_line":2,"new_content":"x","expected_content":"a"}"#,
        )
        .unwrap();
        let camel: LineEdit = serde_json::from_str(
            r#"{"type":"replace_lines","startLine":1,"endLine":2,"newContent":"x","expectedContent":"a"}"#,
        )
        .unwrap();
        assert_eq!(snake, camel);
    }

    #[test]
    fn test_expected_content_mismatch_is_conflict() {
        let err = run("different\n", &[replace(1, 1, "new", Some("old"))]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.message().contains("Actual:\ndifferent"));
    }

    #[test]
    fn test_expected_content_is_trim_compared() {
        let out = run("  old  \nkeep\n", &[replace(1, 1, "new", Some("old"))]).unwrap();
        assert_eq!(out, "new\nkeep\n");
    }

    #[test]
    fn test_missing_expected_content_warns() {
        let out = apply_line_edits(split_lines("a\nb\n"), &[replace(2, 2, "B", None)]).unwrap();
        assert_eq!(out.lines.join("\n"), "a\nB\n");
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_edits_apply_against_original_numbers() {
        let out = run(
            "1\n2\n3\n4\n",
            &[insert(0, "top"), replace(2, 3, "two-three", Some("2\n3")), insert(4, "end")],
        )
        .unwrap();
        assert_eq!(out, "top\n1\ntwo-three\n4\nend\n");
    }

    #[test]
    fn test_inserts_at_same_line_keep_input_order() {
        let out = run("a\nb\n", &[insert(1, "x"), insert(1, "y")]).unwrap();
        assert_eq!(out, "a\nx\ny\nb\n");
    }

    #[test]
    fn test_insert_before_replacement_at_same_target() {
        let out = run("a\nb\nc\n", &[insert(1, "new"), replace(2, 2, "B", Some("b"))]).unwrap();
        assert_eq!(out, "a\nnew\nB\nc\n");
    }

    #[test]
    fn test_invalid_ranges() {
        let err = run("a\nb\n", &[replace(2, 3, "x", None)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(err.message().contains("Invalid line range"));
        assert!(run("a\n", &[insert(2, "x")]).is_err());
        assert!(run("a\nb\nc\n", &[replace(1, 2, "x", None), replace(2, 3, "y", None)]).is_err());
        assert!(run("a\nb\nc\n", &[replace(1, 3, "x", None), insert(1, "y")]).is_err());
    }

    #[test]
    fn test_empty_new_content_deletes() {
        let out = run("a\nb\nc", &[replace(2, 2, "", Some("b"))]).unwrap();
        assert_eq!(out, "a\nc");
    }
}
