//! Relevance scoring for search results and discovered links.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

use super::queries::STOPWORDS;

const BASE_SCORE: f64 = 0.5;

const TRUSTED_HOSTS: &[&str] = &[
    "developer.mozilla.org",
    "docs.rs",
    "doc.rust-lang.org",
    "docs.python.org",
    "github.com",
    "gitlab.com",
    "stackoverflow.com",
    "wikipedia.org",
    "readthedocs.io",
    "kafka.apache.org",
    "learn.microsoft.com",
    "cloud.google.com",
    "aws.amazon.com",
];

const LOW_QUALITY_MARKERS: &[&str] = &[
    "doubleclick",
    "adservice",
    "adserver",
    "tracker",
    "tracking",
    "affiliate",
    "clickbank",
    "taboola",
    "outbrain",
    "coupon",
];

const CONTENT_KEYWORDS: &[&str] = &[
    "tutorial",
    "documentation",
    "guide",
    "reference",
    "example",
    "how to",
    "explained",
    "introduction",
];

const PATH_MARKERS: &[&str] = &[
    "/docs/",
    "/doc/",
    "/reference/",
    "/guide/",
    "/guides/",
    "/tutorial/",
    "/manual/",
    "/api/",
    "/learn/",
];

fn domain_adjustment(host: &str) -> f64 {
    if LOW_QUALITY_MARKERS.iter().any(|m| host.contains(m)) || host.starts_with("ads.") {
        return -0.3;
    }
    if host.ends_with(".edu") || host.ends_with(".gov") {
        return 0.15;
    }
    let trusted = TRUSTED_HOSTS
        .iter()
        .any(|t| host == *t || host.ends_with(&format!(".{}", t)));
    if trusted || host.starts_with("docs.") || host.starts_with("developer.") {
        return 0.2;
    }
    0.0
}

fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(|w| w.to_lowercase())
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

fn coverage(terms: &[String], text: &str) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let text = text.to_lowercase();
    let hits = terms.iter().filter(|t| text.contains(t.as_str())).count();
    hits as f64 / terms.len() as f64
}

/// Score a candidate URL against `query`, clamped to `[0, 1]`.
pub fn score_result(url: &str, title: &str, snippet: &str, query: &str) -> f64 {
    let mut score = BASE_SCORE;

    let parsed = Url::parse(url).ok();
    if let Some(host) = parsed.as_ref().and_then(|u| u.host_str()) {
        score += domain_adjustment(&host.to_ascii_lowercase());
    }

    let terms = query_terms(query);
    score += 0.2 * coverage(&terms, title) + 0.1 * coverage(&terms, snippet);

    let text = format!("{} {}", title, snippet).to_lowercase();
    let keyword_hits = CONTENT_KEYWORDS.iter().filter(|k| text.contains(*k)).count();
    score += (0.05 * keyword_hits as f64).min(0.15);

    if let Some(path) = parsed.as_ref().map(|u| u.path().to_ascii_lowercase()) {
        if PATH_MARKERS.iter().any(|m| path.contains(m)) {
            score += 0.1;
        }
        if path.ends_with(".pdf") || path.ends_with(".doc") || path.ends_with(".docx") {
            score += 0.05;
        }
    }

    score.clamp(0.0, 1.0)
}

fn username_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^@?[A-Za-z0-9_][A-Za-z0-9_.-]{2,38}$").ok())
        .as_ref()
}

/// A single token shaped like a handle (`@name`, `name_42`, `first.last`).
pub fn looks_like_username(query: &str) -> bool {
    let query = query.trim();
    username_regex().map_or(false, |re| re.is_match(query))
}

/// Profile pages to try when a handle-like query finds nothing.
pub fn profile_urls(query: &str) -> Vec<String> {
    let name = query.trim().trim_start_matches('@');
    vec![
        format!("https://github.com/{}", name),
        format!("https://twitter.com/{}", name),
        format!("https://www.reddit.com/user/{}", name),
        format!("https://www.linkedin.com/in/{}", name),
        format!("https://medium.com/@{}", name),
        format!("https://dev.to/{}", name),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docs_outrank_trackers() {
        let docs = score_result(
            "https://kafka.apache.org/documentation/#compaction",
            "Kafka log compaction documentation",
            "How compaction works",
            "kafka compaction",
        );
        let ad = score_result(
            "https://affiliate-deals.example/kafka",
            "Best deals",
            "",
            "kafka compaction",
        );
        assert!(docs > 0.8, "docs scored {}", docs);
        assert!(ad < 0.3, "ad scored {}", ad);
    }

    #[test]
    fn test_score_is_clamped() {
        let s = score_result(
            "https://docs.rs/docs/guide/tokio.pdf",
            "tokio runtime tutorial guide reference example",
            "tokio runtime documentation explained",
            "tokio runtime",
        );
        assert_eq!(s, 1.0);
        let s = score_result("not a url", "", "", "");
        assert_eq!(s, BASE_SCORE);
    }

    #[test]
    fn test_username_detection() {
        assert!(looks_like_username("@octocat"));
        assert!(looks_like_username("jane_doe42"));
        assert!(!looks_like_username("kafka compaction"));
        assert!(!looks_like_username("ab"));
        assert_eq!(profile_urls("@octocat")[0], "https://github.com/octocat");
    }
}
