//! Error pattern analysis.
//!
//! Failures are matched against a small rule table to produce a remediation
//! suggestion and an alternative tool. Signatures (tool plus the first 100
//! characters of the message) are counted; a recurring signature gets an
//! extra note telling the model to change approach.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::ErrorInfo;
use crate::error::ToolError;

const SIGNATURE_CHARS: usize = 100;
const RECURRENCE_THRESHOLD: u32 = 3;
const MAX_CONTEXTS: usize = 5;

struct Rule {
    tool_prefix: Option<&'static str>,
    all_of: &'static [&'static str],
    any_of: &'static [&'static str],
    suggestion: &'static str,
    alternative: Option<&'static str>,
}

impl Rule {
    fn matches(&self, tool: &str, message: &str) -> bool {
        self.tool_prefix.map_or(true, |p| tool.starts_with(p))
            && self.all_of.iter().all(|needle| message.contains(needle))
            && (self.any_of.is_empty() || self.any_of.iter().any(|needle| message.contains(needle)))
    }
}

/// First match wins.
const RULES: &[Rule] = &[
    Rule {
        tool_prefix: Some("apply_diff"),
        all_of: &[],
        any_of: &["no valid diff blocks", "malformed diff"],
        suggestion: "Use the exact block format: '<<<<<<< SEARCH', ':start_line:N', '-------', the lines to find, '=======', the replacement, '>>>>>>> REPLACE'. Read the file with include_line_numbers first.",
        alternative: Some("read_file"),
    },
    Rule {
        tool_prefix: Some("apply_diff"),
        all_of: &["search content does not match"],
        any_of: &[],
        suggestion: "Re-read the file with include_line_numbers and copy the search lines verbatim, including indentation.",
        alternative: Some("read_file"),
    },
    Rule {
        tool_prefix: Some("create_file"),
        all_of: &["already exists"],
        any_of: &[],
        suggestion: "The file is already there; read it and change it with apply_diff or edit_file.",
        alternative: Some("apply_diff"),
    },
    Rule {
        tool_prefix: None,
        all_of: &[],
        any_of: &["not found", "notfounderror"],
        suggestion: "Verify the path with get_project_structure; paths are relative to the workspace root.",
        alternative: Some("get_project_structure"),
    },
    Rule {
        tool_prefix: None,
        all_of: &[],
        any_of: &["permission", "user activation"],
        suggestion: "Ask the user to interact with the page or grant workspace access, then retry.",
        alternative: None,
    },
    Rule {
        tool_prefix: Some("edit_"),
        all_of: &["syntax"],
        any_of: &[],
        suggestion: "Prefer a surgical apply_diff over rewriting whole regions.",
        alternative: Some("apply_diff"),
    },
    Rule {
        tool_prefix: None,
        all_of: &["line", "invalid"],
        any_of: &[],
        suggestion: "Read the file with include_line_numbers first and use the numbers it shows.",
        alternative: Some("read_file"),
    },
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPattern {
    pub tool: String,
    pub signature: String,
    pub count: u32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Most recent argument snippets that produced this error.
    pub contexts: Vec<String>,
}

#[derive(Default)]
pub struct ErrorAnalyzer {
    patterns: Mutex<HashMap<String, ErrorPattern>>,
}

fn signature(tool: &str, message: &str) -> String {
    let head: String = message.to_lowercase().chars().take(SIGNATURE_CHARS).collect();
    format!("{}:{}", tool, head)
}

impl ErrorAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `err` raised by `tool` and build its envelope.
    pub fn analyze(&self, tool: &str, err: &ToolError, context: &str) -> ErrorInfo {
        let mut info = ErrorInfo::from(err);
        let lowered = err.message().to_lowercase();
        if let Some(rule) = RULES.iter().find(|r| r.matches(tool, &lowered)) {
            info.suggestion = Some(rule.suggestion.to_string());
            info.alternative_tool = rule.alternative.map(str::to_string);
        }

        let count = self.observe(tool, err.message(), context);
        if count >= RECURRENCE_THRESHOLD {
            let note = format!(
                "This error has occurred {} times for {}; try a different approach instead of repeating the same call.",
                count, tool
            );
            info.suggestion = Some(match info.suggestion.take() {
                Some(s) => format!("{} {}", s, note),
                None => note,
            });
        }
        info
    }

    fn observe(&self, tool: &str, message: &str, context: &str) -> u32 {
        let Ok(mut patterns) = self.patterns.lock() else {
            return 0;
        };
        let now = Utc::now();
        let key = signature(tool, message);
        let pattern = patterns.entry(key.clone()).or_insert_with(|| ErrorPattern {
            tool: tool.to_string(),
            signature: key,
            count: 0,
            first_seen: now,
            last_seen: now,
            contexts: Vec::new(),
        });
        pattern.count += 1;
        pattern.last_seen = now;
        if !context.is_empty() {
            if pattern.contexts.len() == MAX_CONTEXTS {
                pattern.contexts.remove(0);
            }
            pattern.contexts.push(context.chars().take(200).collect());
        }
        pattern.count
    }

    /// Signatures seen at least three times, most frequent first.
    pub fn recurring_patterns(&self) -> Vec<ErrorPattern> {
        let mut recurring: Vec<ErrorPattern> = self
            .patterns
            .lock()
            .map(|p| {
                p.values()
                    .filter(|p| p.count >= RECURRENCE_THRESHOLD)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        recurring.sort_by(|a, b| b.count.cmp(&a.count).then(a.signature.cmp(&b.signature)));
        recurring
    }

    pub fn total_errors(&self) -> u32 {
        self.patterns
            .lock()
            .map(|p| p.values().map(|p| p.count).sum())
            .unwrap_or(0)
    }
}
