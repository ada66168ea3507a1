//! SEARCH/REPLACE diff blocks.
//!
//! ```text
//! <<<<<<< SEARCH
//! :start_line:<N>
//! -------
//! <old lines>
//! =======
//! <new lines>
//! >>>>>>> REPLACE
//! ```
//!
//! Blocks are applied from the bottom of the file upwards so earlier line
//! numbers stay valid. Each block is located by exact match at its start
//! line, then by trimmed comparison within ±10 lines, then by first/last
//! line comparison within ±5 lines.

use serde::Serialize;

use super::endings::normalize;
use crate::error::{ToolError, ToolResult};

const SEARCH_MARKER: &str = "<<<<<<< SEARCH";
const SEPARATOR: &str = "-------";
const DIVIDER: &str = "=======";
const REPLACE_MARKER: &str = ">>>>>>> REPLACE";
const START_LINE_PREFIX: &str = ":start_line:";

const TRIM_WINDOW: isize = 10;
const BOUNDARY_WINDOW: isize = 5;
const CONTEXT_LINES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBlock {
    pub start_line: usize,
    pub search: Vec<String>,
    pub replace: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    Exact,
    Trim,
    Boundary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockOutcome {
    pub start_line: usize,
    pub matched_line: usize,
    pub strategy: MatchStrategy,
    pub lines_removed: usize,
    pub lines_added: usize,
}

#[derive(Debug, Clone)]
pub struct DiffOutcome {
    pub content: String,
    pub blocks: Vec<BlockOutcome>,
}

impl DiffOutcome {
    /// True if any block needed a fuzzy strategy.
    pub fn used_fuzzy_match(&self) -> bool {
        self.blocks.iter().any(|b| b.strategy != MatchStrategy::Exact)
    }

    pub fn lines_affected(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| b.lines_removed.max(b.lines_added))
            .sum()
    }
}

fn marker_report(diff: &str) -> String {
    let markers = [
        (SEARCH_MARKER, diff.contains(SEARCH_MARKER)),
        (START_LINE_PREFIX, diff.contains(START_LINE_PREFIX)),
        (SEPARATOR, diff.lines().any(|l| l.trim() == SEPARATOR)),
        (DIVIDER, diff.lines().any(|l| l.trim() == DIVIDER)),
        (REPLACE_MARKER, diff.contains(REPLACE_MARKER)),
    ];
    markers
        .iter()
        .map(|(name, found)| format!("  {} {}", if *found { "[found]  " } else { "[missing]" }, name))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_help() -> String {
    format!(
        "Expected format:\n{}\n{}<N>\n{}\n<exact lines to find>\n{}\n<replacement lines>\n{}",
        SEARCH_MARKER, START_LINE_PREFIX, SEPARATOR, DIVIDER, REPLACE_MARKER
    )
}

fn malformed(diff: &str, block_no: usize, problem: &str) -> ToolError {
    ToolError::BadRequest(format!(
        "Malformed diff block {}: {}.\nDetected markers:\n{}\n{}",
        block_no,
        problem,
        marker_report(diff),
        format_help()
    ))
}

/// Parse a diff string into blocks, in input order.
pub fn parse_diff(diff: &str) -> ToolResult<Vec<EditBlock>> {
    let diff = normalize(diff);
    let mut segments = diff.split(SEARCH_MARKER);
    segments.next();

    let mut blocks = Vec::new();
    for (idx, segment) in segments.enumerate() {
        let block_no = idx + 1;
        let body = match segment.find(REPLACE_MARKER) {
            Some(end) => &segment[..end],
            None => return Err(malformed(&diff, block_no, "missing '>>>>>>> REPLACE'")),
        };

        let mut lines = body.split('\n').peekable();
        while matches!(lines.peek(), Some(l) if l.trim().is_empty()) {
            lines.next();
        }

        let header = lines.next().unwrap_or_default().trim();
        let start_line = header
            .strip_prefix(START_LINE_PREFIX)
            .ok_or_else(|| malformed(&diff, block_no, "missing ':start_line:N' header"))?
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                malformed(&diff, block_no, "':start_line:' must be a positive integer")
            })?;

        if lines.next().map(str::trim) != Some(SEPARATOR) {
            return Err(malformed(
                &diff,
                block_no,
                "expected '-------' after the start line header",
            ));
        }

        let mut search = Vec::new();
        let mut found_divider = false;
        for line in lines.by_ref() {
            if line.trim_end() == DIVIDER {
                found_divider = true;
                break;
            }
            search.push(line.to_string());
        }
        if !found_divider {
            return Err(malformed(&diff, block_no, "missing '=======' divider"));
        }
        if search.is_empty() {
            return Err(malformed(&diff, block_no, "search content is empty"));
        }

        let mut replace: Vec<String> = lines.map(str::to_string).collect();
        if replace.last().map(|l| l.is_empty()).unwrap_or(false) {
            replace.pop();
        }

        blocks.push(EditBlock {
            start_line,
            search,
            replace,
        });
    }

    if blocks.is_empty() {
        return Err(ToolError::BadRequest(format!(
            "No valid diff blocks found.\nDetected markers:\n{}\n{}",
            marker_report(&diff),
            format_help()
        )));
    }
    Ok(blocks)
}

fn logical_line_count(lines: &[String]) -> usize {
    if lines.len() > 1 && lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.len() - 1
    } else {
        lines.len()
    }
}

fn matches_exact(lines: &[String], at: usize, search: &[String]) -> bool {
    at + search.len() <= lines.len() && lines[at..at + search.len()] == *search
}

fn matches_trimmed(lines: &[String], at: usize, search: &[String]) -> bool {
    at + search.len() <= lines.len()
        && lines[at..at + search.len()]
            .iter()
            .zip(search)
            .all(|(a, b)| a.trim() == b.trim())
}

fn matches_boundary(lines: &[String], at: usize, search: &[String]) -> bool {
    let n = search.len();
    at + n <= lines.len()
        && lines[at].trim() == search[0].trim()
        && lines[at + n - 1].trim() == search[n - 1].trim()
}

/// Offsets 0, -1, +1, -2, +2, ... up to ±window.
fn nearest_first(start: usize, window: isize, len: usize) -> impl Iterator<Item = usize> {
    std::iter::once(0)
        .chain((1..=window).flat_map(|d| [-d, d]))
        .filter_map(move |off| {
            let at = start as isize + off;
            (at >= 0 && (at as usize) < len).then_some(at as usize)
        })
}

fn locate(lines: &[String], block: &EditBlock) -> Option<(usize, MatchStrategy)> {
    let start = block.start_line - 1;
    if matches_exact(lines, start, &block.search) {
        return Some((start, MatchStrategy::Exact));
    }
    if let Some(at) = nearest_first(start, TRIM_WINDOW, lines.len())
        .find(|&at| matches_trimmed(lines, at, &block.search))
    {
        return Some((at, MatchStrategy::Trim));
    }
    if block.search.len() > 2 {
        if let Some(at) = nearest_first(start, BOUNDARY_WINDOW, lines.len())
            .find(|&at| matches_boundary(lines, at, &block.search))
        {
            return Some((at, MatchStrategy::Boundary));
        }
    }
    None
}

fn mismatch_report(lines: &[String], block: &EditBlock) -> String {
    let total = logical_line_count(lines);
    let start = block.start_line;
    let lo = start.saturating_sub(CONTEXT_LINES).max(1);
    let hi = (start + block.search.len().saturating_sub(1) + CONTEXT_LINES).min(total);
    let context = (lo..=hi)
        .map(|n| {
            let marker = if n == start { ">>> " } else { "    " };
            format!("{}{}: {}", marker, n, lines[n - 1])
        })
        .collect::<Vec<_>>()
        .join("\n");
    let actual_end = (start - 1 + block.search.len()).min(lines.len());
    let actual = lines[start - 1..actual_end].join("\n");

    format!(
        "Search content does not match at line {} (tried exact, trimmed and boundary matching).\n\nContext:\n{}\n\nExpected:\n{}\n\nActual:\n{}",
        start,
        context,
        block.search.join("\n"),
        actual
    )
}

/// Apply `blocks` to `content`. Fails without partial results.
pub fn apply_blocks(content: &str, blocks: &[EditBlock]) -> ToolResult<DiffOutcome> {
    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
    let total = logical_line_count(&lines).max(1);

    for block in blocks {
        if block.start_line < 1 || block.start_line > total {
            return Err(ToolError::BadRequest(format!(
                "Invalid start_line {}: file has {} lines",
                block.start_line, total
            )));
        }
    }

    let mut ordered: Vec<&EditBlock> = blocks.iter().collect();
    ordered.sort_by(|a, b| b.start_line.cmp(&a.start_line));

    let mut outcomes = Vec::with_capacity(ordered.len());
    for block in ordered {
        let (at, strategy) = locate(&lines, block)
            .ok_or_else(|| ToolError::Conflict(mismatch_report(&lines, block)))?;
        lines.splice(at..at + block.search.len(), block.replace.iter().cloned());
        outcomes.push(BlockOutcome {
            start_line: block.start_line,
            matched_line: at + 1,
            strategy,
            lines_removed: block.search.len(),
            lines_added: block.replace.len(),
        });
    }

    Ok(DiffOutcome {
        content: lines.join("\n"),
        blocks: outcomes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(start: usize, search: &str, replace: &str) -> String {
        format!(
            "<<<<<<< SEARCH\n:start_line:{}\n-------\n{}\n=======\n{}\n>>>>>>> REPLACE\n",
            start, search, replace
        )
    }

    #[test]
    fn test_exact_replace() {
        let diff = "<<<<<<< SEARCH\n:start_line:2\n-------\ny\n=======\nY\n>>>>>>> REPLACE";
        let blocks = parse_diff(diff).unwrap();
        assert_eq!(blocks.len(), 1);
        let out = apply_blocks("x\ny\nz", &blocks).unwrap();
        assert_eq!(out.content, "x\nY\nz");
        assert_eq!(out.blocks[0].strategy, MatchStrategy::Exact);
    }

    #[test]
    fn test_mismatch_has_context_marker() {
        let blocks = parse_diff(&block(2, "q", "Q")).unwrap();
        let err = apply_blocks("x\ny\nz", &blocks).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);
        assert!(err.message().contains(">>> 2: y"));
        assert!(err.message().contains("    1: x"));
        assert!(err.message().contains("Expected:\nq"));
    }

    #[test]
    fn test_no_blocks_lists_markers() {
        let err = parse_diff("just some text").unwrap_err();
        assert!(err.message().starts_with("No valid diff blocks found"));
        assert!(err.message().contains("[missing] <<<<<<< SEARCH"));
    }

    #[test]
    fn test_missing_header_is_malformed() {
        let err = parse_diff("<<<<<<< SEARCH\n-------\na\n=======\nb\n>>>>>>> REPLACE").unwrap_err();
        assert!(err.message().contains(":start_line:N"));
    }

    #[test]
    fn test_trimmed_fuzzy_match_nearby() {
        let content = "a\nb\n    target();\nc";
        let blocks = parse_diff(&block(1, "target();", "done();")).unwrap();
        let out = apply_blocks(content, &blocks).unwrap();
        assert_eq!(out.content, "a\nb\ndone();\nc");
        assert_eq!(out.blocks[0].strategy, MatchStrategy::Trim);
        assert_eq!(out.blocks[0].matched_line, 3);
        assert!(out.used_fuzzy_match());
    }

    #[test]
    fn test_boundary_match() {
        let content = "fn a() {\n    let x = 1;\n}\n";
        let blocks = parse_diff(&block(1, "fn a() {\n    let x = 2;\n}", "fn a() {}")).unwrap();
        let out = apply_blocks(content, &blocks).unwrap();
        assert_eq!(out.content, "fn a() {}\n");
        assert_eq!(out.blocks[0].strategy, MatchStrategy::Boundary);
    }

    #[test]
    fn test_order_independence() {
        let content = "1\n2\n3\n4\n5\n";
        let forward = format!("{}{}", block(1, "1", "one\nuno"), block(4, "4", "four"));
        let backward = format!("{}{}", block(4, "4", "four"), block(1, "1", "one\nuno"));
        let a = apply_blocks(content, &parse_diff(&forward).unwrap()).unwrap();
        let b = apply_blocks(content, &parse_diff(&backward).unwrap()).unwrap();
        assert_eq!(a.content, b.content);
        assert_eq!(a.content, "one\nuno\n2\n3\nfour\n5\n");
    }

    #[test]
    fn test_start_line_out_of_bounds() {
        let blocks = parse_diff(&block(9, "x", "y")).unwrap();
        let err = apply_blocks("x\ny\n", &blocks).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::BadRequest);
    }

    #[test]
    fn test_empty_replacement_deletes_lines() {
        let diff = "<<<<<<< SEARCH\n:start_line:2\n-------\ny\n=======\n>>>>>>> REPLACE";
        let out = apply_blocks("x\ny\nz", &parse_diff(diff).unwrap()).unwrap();
        assert_eq!(out.content, "x\nz");
    }
}
