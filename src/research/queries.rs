//! Query expansion for broad exploration.

use std::collections::HashSet;

pub(crate) const STOPWORDS: &[&str] = &[
    "about", "after", "also", "been", "before", "being", "between", "does", "each", "from",
    "have", "here", "into", "just", "like", "more", "most", "much", "only", "other", "over",
    "same", "should", "some", "such", "than", "that", "their", "them", "then", "there",
    "these", "they", "this", "those", "through", "very", "what", "when", "where", "which",
    "while", "will", "with", "would", "your",
];

const SUFFIXES: &[&str] = &["guide", "tutorial", "explained", "overview"];

// Pairs are drawn from at most this many leading concepts.
const MAX_CONCEPTS: usize = 4;

/// Alphabetic tokens longer than three characters that are not stopwords,
/// lowercased, in first-seen order.
pub fn concept_tokens(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3 && w.chars().all(|c| c.is_alphabetic()))
        .map(|w| w.to_lowercase())
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

/// The original query, concept pairs, then instructional variants;
/// case-insensitively deduplicated and capped at `max_queries`.
pub fn expand_queries(query: &str, max_queries: usize) -> Vec<String> {
    let query = query.trim();
    let mut candidates = vec![query.to_string()];

    let concepts = concept_tokens(query);
    let top = &concepts[..concepts.len().min(MAX_CONCEPTS)];
    for (i, first) in top.iter().enumerate() {
        for second in &top[i + 1..] {
            candidates.push(format!("{} {}", first, second));
        }
    }
    for suffix in SUFFIXES {
        candidates.push(format!("{} {}", query, suffix));
    }

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|q| !q.is_empty() && seen.insert(q.to_lowercase()))
        .take(max_queries.max(1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concepts_skip_short_and_stopwords() {
        assert_eq!(
            concept_tokens("How does Kafka log compaction work with v2 topics?"),
            vec!["kafka", "compaction", "work", "topics"]
        );
    }

    #[test]
    fn test_expansion_dedupes_and_caps() {
        let queries = expand_queries("Kafka compaction", 5);
        // The single concept pair repeats the original and is dropped.
        assert_eq!(
            queries,
            vec![
                "Kafka compaction",
                "Kafka compaction guide",
                "Kafka compaction tutorial",
                "Kafka compaction explained",
                "Kafka compaction overview",
            ]
        );
        assert_eq!(expand_queries("tokio runtime scheduler internals", 3).len(), 3);
        assert_eq!(expand_queries("rust", 0), vec!["rust"]);
    }
}
