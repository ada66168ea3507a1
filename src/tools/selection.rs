use serde::Serialize;
use std::collections::HashSet;

use super::registry::ToolRegistry;
use crate::research::STOPWORDS;

/// Short words that carry no intent.
const FILLER: &[&str] = &[
    "a", "an", "and", "at", "by", "for", "in", "is", "it", "me", "my", "of", "on", "or", "the",
    "to", "up", "we",
];

/// Intent words mapped onto vocabulary used in tool names.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("modify", &["edit", "diff"]),
    ("change", &["edit", "diff"]),
    ("fix", &["edit", "diff", "debug"]),
    ("patch", &["diff"]),
    ("write", &["create", "edit"]),
    ("new", &["create"]),
    ("remove", &["delete"]),
    ("move", &["rename"]),
    ("open", &["read"]),
    ("show", &["read", "structure"]),
    ("view", &["read"]),
    ("find", &["search", "query"]),
    ("grep", &["search"]),
    ("lookup", &["search", "query"]),
    ("tree", &["structure"]),
    ("layout", &["structure"]),
    ("bug", &["debug"]),
    ("error", &["debug", "validate"]),
    ("check", &["validate"]),
    ("lint", &["validate", "quality"]),
    ("refactor", &["architecture", "optimize"]),
    ("web", &["url", "research", "search"]),
    ("internet", &["research", "search"]),
    ("investigate", &["research"]),
    ("todo", &["task"]),
    ("plan", &["task", "breakdown"]),
    ("revert", &["undo"]),
];

#[derive(Debug, Clone, Serialize)]
pub struct ToolRecommendation {
    pub name: String,
    pub score: u32,
    pub description: String,
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 1)
        .map(str::to_lowercase)
        .collect()
}

fn intent_terms(intent: &str) -> HashSet<String> {
    let mut terms = HashSet::new();
    for word in words(intent) {
        if STOPWORDS.contains(&word.as_str()) || FILLER.contains(&word.as_str()) {
            continue;
        }
        if let Some((_, extra)) = SYNONYMS.iter().find(|(w, _)| *w == word) {
            terms.extend(extra.iter().map(|s| s.to_string()));
        }
        // Crude plural folding so "files" meets "file".
        if let Some(stem) = word.strip_suffix('s').filter(|s| s.len() > 2) {
            terms.insert(stem.to_string());
        }
        terms.insert(word);
    }
    terms
}

pub struct ToolSelector;

impl ToolSelector {
    /// Rank registered tools for `intent`. Name tokens weigh three times as
    /// much as description words. Tools scoring zero are omitted.
    pub fn recommend(registry: &ToolRegistry, intent: &str, limit: usize) -> Vec<ToolRecommendation> {
        let terms = intent_terms(intent);
        if terms.is_empty() {
            return Vec::new();
        }

        let mut ranked: Vec<ToolRecommendation> = registry
            .list()
            .iter()
            .filter_map(|tool| {
                let name_hits = tool
                    .name
                    .split('_')
                    .filter(|token| terms.contains(*token))
                    .count() as u32;
                let description_words: HashSet<String> =
                    words(&tool.description).into_iter().collect();
                let description_hits =
                    description_words.iter().filter(|w| terms.contains(*w)).count() as u32;
                let score = name_hits * 3 + description_hits;
                (score > 0).then(|| ToolRecommendation {
                    name: tool.name.clone(),
                    score,
                    description: tool.description.clone(),
                })
            })
            .collect();

        ranked.sort_by(|a, b| b.score.cmp(&a.score).then(a.name.cmp(&b.name)));
        ranked.truncate(limit.max(1));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::registry::{handler, ToolDescriptor};

    fn registry() -> ToolRegistry {
        let registry = ToolRegistry::new();
        let noop = || handler(|_ctx, args| async move { Ok(args) });
        registry
            .register_all([
                ToolDescriptor::new("read_file", "Read the contents of a file", noop()),
                ToolDescriptor::new("apply_diff", "Apply search/replace blocks to a file", noop()),
                ToolDescriptor::new("perform_research", "Multi-stage web research", noop()),
                ToolDescriptor::new("undo_last_change", "Revert the most recent edit", noop()),
            ])
            .unwrap();
        registry
    }

    #[test]
    fn test_name_matches_rank_first() {
        let picks = ToolSelector::recommend(&registry(), "read a file", 3);
        assert_eq!(picks[0].name, "read_file");
        assert!(picks.iter().any(|p| p.name == "apply_diff"));
    }

    #[test]
    fn test_synonyms() {
        let picks = ToolSelector::recommend(&registry(), "patch the config", 1);
        assert_eq!(picks[0].name, "apply_diff");
        let picks = ToolSelector::recommend(&registry(), "revert my mistake", 1);
        assert_eq!(picks[0].name, "undo_last_change");
        let picks = ToolSelector::recommend(&registry(), "investigate on the internet", 5);
        assert_eq!(picks[0].name, "perform_research");
    }

    #[test]
    fn test_no_overlap_is_empty() {
        assert!(ToolSelector::recommend(&registry(), "the and of", 5).is_empty());
        assert!(ToolSelector::recommend(&registry(), "zebra", 5).is_empty());
    }
}
