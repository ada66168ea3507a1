use chrono::{DateTime, Utc};
use serde::Serialize;

use super::gaps::KnowledgeGap;

const EXCERPT_CHARS: usize = 300;
const FULL_CONTENT_CHARS: usize = 4_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResearchStatus {
    Success,
    Degraded,
}

/// A page that was read successfully.
#[derive(Debug, Clone)]
pub struct Document {
    pub url: String,
    pub title: String,
    pub content: String,
    pub score: f64,
    pub depth: u32,
    pub stage: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reference {
    pub index: usize,
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub url: String,
    pub title: String,
    pub relevance: f64,
    pub depth: u32,
    pub stage: u8,
    pub excerpt: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchStats {
    pub total_urls_read: usize,
    pub successful_reads: usize,
    pub failed_urls: usize,
    pub searches_run: usize,
    pub knowledge_gaps: Vec<KnowledgeGap>,
    pub stages_completed: u8,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResearchResults {
    pub sources: Vec<Source>,
    pub stats: ResearchStats,
    pub queries: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchMetadata {
    pub original_query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub max_total_urls: usize,
    pub max_depth: u32,
    pub relevance_threshold: f64,
    pub deadline_ms: u64,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchReport {
    pub status: ResearchStatus,
    pub summary: String,
    pub full_content: String,
    pub references: Vec<Reference>,
    pub results: ResearchResults,
    pub metadata: ResearchMetadata,
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sources ranked by relevance; references number them from 1.
pub(super) fn build_report(
    mut documents: Vec<Document>,
    queries: Vec<String>,
    stats: ResearchStats,
    metadata: ResearchMetadata,
) -> ResearchReport {
    documents.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.stage.cmp(&b.stage)));

    let status = if stats.degraded_reason.is_some() {
        ResearchStatus::Degraded
    } else {
        ResearchStatus::Success
    };

    let mut summary = format!(
        "Research on \"{}\": {} source(s) read successfully out of {} attempted ({} failed) across {} search(es).",
        metadata.original_query,
        stats.successful_reads,
        stats.total_urls_read,
        stats.failed_urls,
        stats.searches_run
    );
    if let Some(reason) = &stats.degraded_reason {
        summary.push_str(&format!(" Results are partial: {}.", reason));
    }
    if !stats.knowledge_gaps.is_empty() {
        let terms: Vec<&str> = stats.knowledge_gaps.iter().map(|g| g.term.as_str()).collect();
        summary.push_str(&format!(" Follow-up topics: {}.", terms.join(", ")));
    }
    for (i, doc) in documents.iter().take(5).enumerate() {
        summary.push_str(&format!("\n[{}] {} - {}", i + 1, doc.title, doc.url));
    }

    let mut full_content = String::new();
    let mut references = Vec::with_capacity(documents.len());
    let mut sources = Vec::with_capacity(documents.len());
    for (i, doc) in documents.into_iter().enumerate() {
        full_content.push_str(&format!(
            "## [{}] {}\nURL: {}\n\n{}\n\n",
            i + 1,
            doc.title,
            doc.url,
            truncate_chars(doc.content.trim(), FULL_CONTENT_CHARS)
        ));
        references.push(Reference {
            index: i + 1,
            url: doc.url.clone(),
            title: doc.title.clone(),
        });
        sources.push(Source {
            excerpt: truncate_chars(&collapse_whitespace(&doc.content), EXCERPT_CHARS).to_string(),
            url: doc.url,
            title: doc.title,
            relevance: doc.score,
            depth: doc.depth,
            stage: doc.stage,
        });
    }

    ResearchReport {
        status,
        summary,
        full_content,
        references,
        results: ResearchResults {
            sources,
            stats,
            queries,
        },
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    #[test]
    fn test_degraded_stats_serialize_reason() {
        let stats = ResearchStats {
            degraded_reason: Some("Timeout".into()),
            ..ResearchStats::default()
        };
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["degradedReason"], "Timeout");
        assert!(serde_json::to_value(ResearchStats::default())
            .unwrap()
            .get("degradedReason")
            .is_none());
    }
}
