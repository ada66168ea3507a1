//! Knowledge-gap detection over stage-one documents.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::queries::{concept_tokens, STOPWORDS};

/// A term must repeat this often inside one document to count.
const MIN_TERM_FREQUENCY: usize = 5;
/// Terms seen in at least this many sources are considered covered.
const COVERED_SOURCES: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeGap {
    pub term: String,
    pub frequency: usize,
    pub sources: Vec<String>,
}

fn term_frequencies(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for word in text.split(|c: char| !c.is_alphabetic()) {
        if word.len() <= 3 {
            continue;
        }
        let word = word.to_lowercase();
        if STOPWORDS.contains(&word.as_str()) {
            continue;
        }
        *counts.entry(word).or_insert(0) += 1;
    }
    counts
}

/// `documents` are `(url, content)` pairs.
pub fn find_gaps(documents: &[(String, String)], query: &str, max_gaps: usize) -> Vec<KnowledgeGap> {
    let query_terms: HashSet<String> = concept_tokens(query)
        .into_iter()
        .chain(query.split_whitespace().map(|w| w.to_lowercase()))
        .collect();

    let mut coverage: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut totals: HashMap<String, usize> = HashMap::new();
    for (url, content) in documents {
        for (term, count) in term_frequencies(content) {
            if count < MIN_TERM_FREQUENCY || query_terms.contains(&term) {
                continue;
            }
            coverage.entry(term.clone()).or_default().insert(url.clone());
            *totals.entry(term).or_insert(0) += count;
        }
    }

    let mut gaps: Vec<KnowledgeGap> = coverage
        .into_iter()
        .filter(|(_, sources)| sources.len() < COVERED_SOURCES)
        .map(|(term, sources)| KnowledgeGap {
            frequency: totals.get(&term).copied().unwrap_or(0),
            term,
            sources: sources.into_iter().collect(),
        })
        .collect();
    gaps.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.term.cmp(&b.term)));
    gaps.truncate(max_gaps);
    gaps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaps_skip_covered_and_query_terms() {
        let docs = vec![
            (
                "https://a".to_string(),
                "tombstone ".repeat(7) + &"segment ".repeat(5) + &"kafka ".repeat(9) + "offset",
            ),
            (
                "https://b".to_string(),
                "segment ".repeat(6) + &"cleaner ".repeat(5),
            ),
        ];
        let gaps = find_gaps(&docs, "kafka compaction", 3);
        let terms: Vec<&str> = gaps.iter().map(|g| g.term.as_str()).collect();
        // "segment" appears in both sources, "kafka" is part of the query.
        assert_eq!(terms, vec!["tombstone", "cleaner"]);
        assert_eq!(gaps[0].frequency, 7);
        assert_eq!(gaps[0].sources, vec!["https://a".to_string()]);
    }

    #[test]
    fn test_gap_limit() {
        let docs = vec![(
            "https://a".to_string(),
            ["alpha", "bravo", "charlie", "delta"]
                .iter()
                .map(|w| format!("{} ", w).repeat(5))
                .collect::<String>(),
        )];
        assert_eq!(find_gaps(&docs, "q", 2).len(), 2);
    }
}
