//! Multi-stage web research.
//!
//! A session runs three stages against a [`WebSource`]:
//!
//! 1. Broad exploration: expanded queries seed a relevance-ordered frontier
//!    which is traversed, following outbound links up to the depth limit.
//! 2. Gap analysis: frequent terms that only one source covers.
//! 3. Focused reading: one search per gap, reading its best two hits.
//!
//! The whole session runs under a deadline. Hitting it after some content
//! was gathered yields a `Degraded` report; too many failed reads is an
//! error.

mod frontier;
mod gaps;
mod queries;
mod report;
mod scoring;

use chrono::Utc;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ResearchConfig;
use crate::error::{ToolError, ToolResult};
use crate::tasks::{NewTask, TaskStatus, TaskTracker, TaskUpdate};
use crate::web::{PageContent, SearchResult, WebSource};

pub use frontier::{Frontier, UrlInfo};
pub use gaps::{find_gaps, KnowledgeGap};
pub use queries::{concept_tokens, expand_queries};
pub(crate) use queries::STOPWORDS;
pub use report::{Document, ResearchMetadata, ResearchReport, ResearchStats, ResearchStatus};
pub use scoring::{looks_like_username, profile_urls, score_result};

/// Stage one reads below the configured threshold, stage three above it.
const STAGE_ONE_THRESHOLD_DELTA: f64 = -0.2;
const STAGE_THREE_THRESHOLD_DELTA: f64 = 0.1;
const READS_PER_GAP: usize = 2;

const STAGE_TITLES: [&str; 3] = [
    "Stage 1: broad exploration",
    "Stage 2: gap analysis",
    "Stage 3: focused reading",
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
    #[serde(default)]
    pub queries: Option<Vec<String>>,
    #[serde(default, alias = "maxResults")]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub depth: Option<u32>,
    #[serde(default, alias = "relevanceThreshold")]
    pub relevance_threshold: Option<f64>,
    #[serde(default, alias = "taskId")]
    pub task_id: Option<String>,
    #[serde(default, alias = "deadlineMs")]
    pub deadline_ms: Option<u64>,
}

impl ResearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

/// Largest tolerated share of failed reads for `attempts` reads.
pub fn failure_threshold(attempts: usize) -> f64 {
    (0.20 + 0.15 * (attempts.max(1) as f64).log10()).min(0.6)
}

struct Session {
    original_query: String,
    visited: HashSet<String>,
    frontier: Frontier,
    documents: Vec<Document>,
    search_history: Vec<String>,
    knowledge_gaps: Vec<KnowledgeGap>,
    total_urls_read: usize,
    failed_url_count: usize,
    max_total_urls: usize,
    max_depth: u32,
    relevance_threshold: f64,
    stages_completed: u8,
}

impl Session {
    fn has_budget(&self) -> bool {
        self.total_urls_read < self.max_total_urls
    }

    // Visiting and counting happen together so the two never drift apart.
    fn mark_visited(&mut self, url: &str) {
        if self.visited.insert(url.to_string()) {
            self.total_urls_read += 1;
        }
    }
}

/// Task-tree bookkeeping for a linked session. Tracker errors are logged
/// and otherwise ignored.
struct Linkage {
    tracker: Arc<dyn TaskTracker>,
    parent: String,
    stages: Vec<String>,
}

impl Linkage {
    async fn start(tracker: Arc<dyn TaskTracker>, parent: &str, query: &str) -> Option<Self> {
        if let Err(e) = tracker
            .update(
                parent,
                TaskUpdate::status(TaskStatus::InProgress)
                    .with_note(format!("Research started: {}", query)),
            )
            .await
        {
            warn!(task = parent, "research task linkage disabled: {}", e);
            return None;
        }

        let mut stages = Vec::with_capacity(STAGE_TITLES.len());
        for title in STAGE_TITLES {
            match tracker.create(NewTask::titled(title).under(parent)).await {
                Ok(task) => stages.push(task.id),
                Err(e) => {
                    warn!(task = parent, "failed to create research stage task: {}", e);
                    return None;
                }
            }
        }
        Some(Self {
            tracker,
            parent: parent.to_string(),
            stages,
        })
    }

    async fn touch(&self, id: &str, update: TaskUpdate) {
        if let Err(e) = self.tracker.update(id, update).await {
            warn!(task = id, "failed to update research task: {}", e);
        }
    }

    async fn stage_started(&self, stage: usize) {
        if let Some(id) = self.stages.get(stage) {
            self.touch(id, TaskUpdate::status(TaskStatus::InProgress)).await;
        }
    }

    async fn stage_finished(&self, stage: usize, note: String) {
        if let Some(id) = self.stages.get(stage) {
            self.touch(id, TaskUpdate::status(TaskStatus::Completed).with_note(note))
                .await;
        }
    }

    async fn finish(&self, outcome: &ToolResult<ResearchReport>, stages_completed: u8) {
        match outcome {
            Ok(report) => {
                self.touch(
                    &self.parent,
                    TaskUpdate::status(TaskStatus::Completed).with_note(format!(
                        "{:?}: {} source(s) gathered",
                        report.status,
                        report.results.sources.len()
                    )),
                )
                .await;
            }
            Err(e) => {
                if let Some(id) = self.stages.get(stages_completed as usize) {
                    self.touch(id, TaskUpdate::status(TaskStatus::Failed).with_note(e.to_string()))
                        .await;
                }
                self.touch(
                    &self.parent,
                    TaskUpdate::status(TaskStatus::Failed).with_note(e.to_string()),
                )
                .await;
            }
        }
    }
}

fn resolve_link(base: Option<&Url>, raw: &str) -> Option<String> {
    let mut url = match base {
        Some(base) => base.join(raw).ok()?,
        None => Url::parse(raw).ok()?,
    };
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

fn deadline_elapsed() -> ToolError {
    ToolError::Timeout("Research deadline elapsed".to_string())
}

pub struct ResearchEngine {
    web: Arc<dyn WebSource>,
    tasks: Option<Arc<dyn TaskTracker>>,
    config: ResearchConfig,
}

impl ResearchEngine {
    pub fn new(
        web: Arc<dyn WebSource>,
        tasks: Option<Arc<dyn TaskTracker>>,
        config: ResearchConfig,
    ) -> Self {
        Self { web, tasks, config }
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// `performResearch`.
    pub async fn perform(&self, request: ResearchRequest) -> ToolResult<ResearchReport> {
        let query = request.query.trim().to_string();
        if query.is_empty() {
            return Err(ToolError::BadRequest("Research query must not be empty".to_string()));
        }
        let relevance_threshold = request
            .relevance_threshold
            .unwrap_or(self.config.relevance_threshold);
        if !(0.0..=1.0).contains(&relevance_threshold) {
            return Err(ToolError::BadRequest(format!(
                "relevance_threshold must be between 0 and 1, got {}",
                relevance_threshold
            )));
        }
        let deadline = match request.deadline_ms {
            Some(0) => {
                return Err(ToolError::BadRequest(
                    "deadline_ms must be greater than zero".to_string(),
                ))
            }
            Some(ms) => Duration::from_millis(ms),
            None => self.config.deadline,
        };

        let mut session = Session {
            original_query: query.clone(),
            visited: HashSet::new(),
            frontier: Frontier::new(),
            documents: Vec::new(),
            search_history: Vec::new(),
            knowledge_gaps: Vec::new(),
            total_urls_read: 0,
            failed_url_count: 0,
            max_total_urls: request.max_results.unwrap_or(self.config.max_total_urls).max(1),
            max_depth: request.depth.unwrap_or(self.config.max_depth).max(1),
            relevance_threshold,
            stages_completed: 0,
        };
        let metadata = ResearchMetadata {
            original_query: query.clone(),
            task_id: request.task_id.clone(),
            max_total_urls: session.max_total_urls,
            max_depth: session.max_depth,
            relevance_threshold,
            deadline_ms: deadline.as_millis() as u64,
            started_at: Utc::now(),
        };

        let linkage = match (&self.tasks, &request.task_id) {
            (Some(tracker), Some(task_id)) => Linkage::start(tracker.clone(), task_id, &query).await,
            _ => None,
        };

        let cancel = CancellationToken::new();
        let timer = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(deadline).await;
                cancel.cancel();
            }
        });

        let started = Instant::now();
        info!(query = %query, deadline_ms = metadata.deadline_ms, "research started");
        self.run(&mut session, request.queries, linkage.as_ref(), &cancel)
            .await;
        timer.abort();

        let outcome = self.conclude(session_snapshot(&mut session), metadata, started, &cancel);
        if let Some(linkage) = &linkage {
            linkage.finish(&outcome, session.stages_completed).await;
        }
        match &outcome {
            Ok(report) => info!(
                status = ?report.status,
                sources = report.results.sources.len(),
                duration_ms = started.elapsed().as_millis() as u64,
                "research finished"
            ),
            Err(e) => warn!(duration_ms = started.elapsed().as_millis() as u64, "research failed: {}", e),
        }
        outcome
    }

    async fn run(
        &self,
        session: &mut Session,
        explicit_queries: Option<Vec<String>>,
        linkage: Option<&Linkage>,
        cancel: &CancellationToken,
    ) {
        // Stage 1
        if let Some(l) = linkage {
            l.stage_started(0).await;
        }
        let queries = match explicit_queries {
            Some(list) if list.iter().any(|q| !q.trim().is_empty()) => {
                let mut seen = HashSet::new();
                list.into_iter()
                    .map(|q| q.trim().to_string())
                    .filter(|q| !q.is_empty() && seen.insert(q.to_lowercase()))
                    .take(self.config.max_queries.max(1))
                    .collect()
            }
            _ => expand_queries(&session.original_query, self.config.max_queries),
        };

        let mut any_results = false;
        for query in &queries {
            if cancel.is_cancelled() {
                break;
            }
            session.search_history.push(query.clone());
            match self.search(query, cancel).await {
                Ok(results) => {
                    any_results |= !results.is_empty();
                    let seeds: Vec<UrlInfo> = results
                        .into_iter()
                        .filter_map(|r| seed(r, &session.original_query, 1))
                        .filter(|s| !session.visited.contains(&s.url))
                        .collect();
                    session.frontier.extend(seeds);
                }
                Err(_) if cancel.is_cancelled() => break,
                Err(e) => warn!(query = %query, "research search failed: {}", e),
            }
        }

        if !any_results && !cancel.is_cancelled() && looks_like_username(&session.original_query) {
            debug!(query = %session.original_query, "no search results, trying profile pages");
            let profiles: Vec<UrlInfo> = profile_urls(&session.original_query)
                .into_iter()
                .map(|url| UrlInfo {
                    title: format!("Profile: {}", url),
                    url,
                    snippet: String::new(),
                    score: 0.5,
                    depth: 1,
                })
                .collect();
            session.frontier.extend(profiles);
        }

        let threshold = session.relevance_threshold + STAGE_ONE_THRESHOLD_DELTA;
        self.traverse(session, threshold, cancel).await;
        if cancel.is_cancelled() {
            return;
        }
        session.stages_completed = 1;
        if let Some(l) = linkage {
            l.stage_finished(
                0,
                format!(
                    "Read {} URL(s), {} failed",
                    session.total_urls_read, session.failed_url_count
                ),
            )
            .await;
        }

        // Stage 2
        if let Some(l) = linkage {
            l.stage_started(1).await;
        }
        let stage_one: Vec<(String, String)> = session
            .documents
            .iter()
            .map(|d| (d.url.clone(), d.content.clone()))
            .collect();
        session.knowledge_gaps = find_gaps(&stage_one, &session.original_query, self.config.max_gaps);
        session.stages_completed = 2;
        if let Some(l) = linkage {
            let terms: Vec<&str> = session.knowledge_gaps.iter().map(|g| g.term.as_str()).collect();
            l.stage_finished(1, format!("Knowledge gaps: [{}]", terms.join(", ")))
                .await;
        }

        // Stage 3
        if let Some(l) = linkage {
            l.stage_started(2).await;
        }
        let threshold = session.relevance_threshold + STAGE_THREE_THRESHOLD_DELTA;
        let gap_terms: Vec<String> = session.knowledge_gaps.iter().map(|g| g.term.clone()).collect();
        for term in gap_terms {
            if cancel.is_cancelled() || !session.has_budget() {
                break;
            }
            let query = format!("{} {}", session.original_query, term);
            session.search_history.push(query.clone());
            let results = match self.search(&query, cancel).await {
                Ok(results) => results,
                Err(_) if cancel.is_cancelled() => return,
                Err(e) => {
                    warn!(query = %query, "focused search failed: {}", e);
                    continue;
                }
            };

            let mut candidates: Vec<UrlInfo> = results
                .into_iter()
                .filter_map(|r| seed(r, &query, 1))
                .filter(|c| c.score >= threshold && !session.visited.contains(&c.url))
                .collect();
            candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
            for candidate in candidates.into_iter().take(READS_PER_GAP) {
                if cancel.is_cancelled() || !session.has_budget() {
                    break;
                }
                self.read_one(session, &candidate, 3, cancel).await;
            }
        }
        if cancel.is_cancelled() {
            return;
        }
        session.stages_completed = 3;
        if let Some(l) = linkage {
            l.stage_finished(2, format!("Collected {} source(s)", session.documents.len()))
                .await;
        }
    }

    async fn traverse(&self, session: &mut Session, threshold: f64, cancel: &CancellationToken) {
        while let Some(info) = session.frontier.pop() {
            if cancel.is_cancelled() || !session.has_budget() {
                break;
            }
            if info.score < threshold || session.visited.contains(&info.url) {
                continue;
            }
            let Some(page) = self.read_one(session, &info, 1, cancel).await else {
                continue;
            };
            if info.depth >= session.max_depth {
                continue;
            }

            let base = Url::parse(&info.url).ok();
            for link in page.links {
                let Some(url) = resolve_link(base.as_ref(), &link.url) else {
                    continue;
                };
                if session.visited.contains(&url) {
                    continue;
                }
                let synthetic = format!("{} {}", link.text, session.original_query);
                let score = score_result(&url, &link.text, "", &synthetic);
                session.frontier.push(UrlInfo {
                    url,
                    title: link.text,
                    snippet: String::new(),
                    score,
                    depth: info.depth + 1,
                });
            }
        }
    }

    async fn read_one(
        &self,
        session: &mut Session,
        info: &UrlInfo,
        stage: u8,
        cancel: &CancellationToken,
    ) -> Option<PageContent> {
        session.mark_visited(&info.url);
        match self.fetch(&info.url, cancel).await {
            Ok(page) if !page.content.trim().is_empty() => {
                debug!(url = %info.url, stage, score = info.score, "research read");
                session.documents.push(Document {
                    url: info.url.clone(),
                    title: if info.title.trim().is_empty() {
                        info.url.clone()
                    } else {
                        info.title.clone()
                    },
                    content: page.content.clone(),
                    score: info.score,
                    depth: info.depth,
                    stage,
                });
                Some(page)
            }
            Ok(_) => {
                session.failed_url_count += 1;
                debug!(url = %info.url, "research read returned no content");
                None
            }
            Err(e) => {
                session.failed_url_count += 1;
                debug!(url = %info.url, "research read failed: {}", e);
                None
            }
        }
    }

    // The web source gets the token too; racing it here bounds sources that
    // ignore it.
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> ToolResult<PageContent> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(deadline_elapsed()),
            page = self.web.read_url(url, cancel) => page,
        }
    }

    async fn search(&self, query: &str, cancel: &CancellationToken) -> ToolResult<Vec<SearchResult>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(deadline_elapsed()),
            results = self.web.search(query, cancel) => results,
        }
    }

    fn conclude(
        &self,
        snapshot: SessionSnapshot,
        metadata: ResearchMetadata,
        started: Instant,
        cancel: &CancellationToken,
    ) -> ToolResult<ResearchReport> {
        let aborted = cancel.is_cancelled() && snapshot.stages_completed < 3;
        let mut stats = ResearchStats {
            total_urls_read: snapshot.total_urls_read,
            successful_reads: snapshot.documents.len(),
            failed_urls: snapshot.failed_url_count,
            searches_run: snapshot.search_history.len(),
            knowledge_gaps: snapshot.knowledge_gaps,
            stages_completed: snapshot.stages_completed,
            duration_ms: started.elapsed().as_millis() as u64,
            degraded_reason: None,
        };

        if aborted {
            if snapshot.documents.is_empty() {
                return Err(ToolError::Timeout(format!(
                    "Research deadline of {}ms elapsed before any content was gathered",
                    metadata.deadline_ms
                )));
            }
            stats.degraded_reason = Some("Timeout".to_string());
        } else if stats.total_urls_read > 0 {
            let ratio = stats.failed_urls as f64 / stats.total_urls_read as f64;
            let limit = failure_threshold(stats.total_urls_read);
            if ratio > limit {
                return Err(ToolError::QualityCompromised(format!(
                    "{} of {} URL reads failed ({:.0}% exceeds the {:.0}% limit)",
                    stats.failed_urls,
                    stats.total_urls_read,
                    ratio * 100.0,
                    limit * 100.0
                )));
            }
        }

        Ok(report::build_report(
            snapshot.documents,
            snapshot.search_history,
            stats,
            metadata,
        ))
    }
}

struct SessionSnapshot {
    documents: Vec<Document>,
    search_history: Vec<String>,
    knowledge_gaps: Vec<KnowledgeGap>,
    total_urls_read: usize,
    failed_url_count: usize,
    stages_completed: u8,
}

fn session_snapshot(session: &mut Session) -> SessionSnapshot {
    SessionSnapshot {
        documents: std::mem::take(&mut session.documents),
        search_history: std::mem::take(&mut session.search_history),
        knowledge_gaps: std::mem::take(&mut session.knowledge_gaps),
        total_urls_read: session.total_urls_read,
        failed_url_count: session.failed_url_count,
        stages_completed: session.stages_completed,
    }
}

/// Search hits with unusable URLs are dropped; fragments are stripped so
/// `page#a` and `page` count as one URL.
fn seed(result: SearchResult, query: &str, depth: u32) -> Option<UrlInfo> {
    let url = resolve_link(None, &result.link)?;
    let score = score_result(&url, &result.title, &result.snippet, query);
    Some(UrlInfo {
        url,
        title: result.title,
        snippet: result.snippet,
        score,
        depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::ErrorKind;
    use crate::tasks::InMemoryTaskTracker;
    use crate::web::PageLink;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Clone)]
    struct Page {
        content: String,
        links: Vec<PageLink>,
        delay: Option<Duration>,
    }

    #[derive(Default)]
    struct ScriptedWeb {
        by_query: HashMap<String, Vec<SearchResult>>,
        default_results: Vec<SearchResult>,
        pages: HashMap<String, Page>,
        reads: Mutex<Vec<String>>,
    }

    impl ScriptedWeb {
        fn result(&mut self, url: &str, title: &str) -> &mut Self {
            self.default_results.push(SearchResult {
                title: title.into(),
                link: url.into(),
                snippet: String::new(),
            });
            self
        }

        fn page(&mut self, url: &str, content: &str, links: &[(&str, &str)]) -> &mut Self {
            self.pages.insert(
                url.into(),
                Page {
                    content: content.into(),
                    links: links
                        .iter()
                        .map(|(u, t)| PageLink {
                            url: u.to_string(),
                            text: t.to_string(),
                        })
                        .collect(),
                    delay: None,
                },
            );
            self
        }

        fn reads(&self) -> Vec<String> {
            self.reads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WebSource for ScriptedWeb {
        async fn read_url(&self, url: &str, _cancel: &CancellationToken) -> ToolResult<PageContent> {
            self.reads.lock().unwrap().push(url.to_string());
            let page = self
                .pages
                .get(url)
                .cloned()
                .ok_or_else(|| ToolError::NotFound(format!("Host returned 404 for {}", url)))?;
            if let Some(delay) = page.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(PageContent {
                url: url.to_string(),
                content: page.content,
                links: page.links,
            })
        }

        async fn search(&self, query: &str, _cancel: &CancellationToken) -> ToolResult<Vec<SearchResult>> {
            Ok(self
                .by_query
                .get(query)
                .cloned()
                .unwrap_or_else(|| self.default_results.clone()))
        }
    }

    fn engine(web: ScriptedWeb) -> (ResearchEngine, Arc<ScriptedWeb>) {
        let web = Arc::new(web);
        let engine = ResearchEngine::new(web.clone(), None, Config::default().research);
        (engine, web)
    }

    #[test]
    fn test_failure_threshold_curve() {
        assert!((failure_threshold(0) - 0.20).abs() < 1e-9);
        assert!((failure_threshold(10) - 0.35).abs() < 1e-9);
        assert_eq!(failure_threshold(1_000), 0.6);
    }

    #[tokio::test]
    async fn test_deadline_returns_degraded_partial_results() {
        let mut web = ScriptedWeb::default();
        web.result(
            "https://kafka.apache.org/documentation/compaction",
            "Kafka compaction documentation",
        )
        .result("https://blog.example.com/a", "Misc")
        .result("https://blog.example.com/b", "Misc")
        .page(
            "https://kafka.apache.org/documentation/compaction",
            "Log compaction retains the last value per key.",
            &[],
        );
        for slow in ["https://blog.example.com/a", "https://blog.example.com/b"] {
            web.pages.insert(
                slow.into(),
                Page {
                    content: "slow".into(),
                    links: Vec::new(),
                    delay: Some(Duration::from_secs(5)),
                },
            );
        }
        let (engine, _web) = engine(web);

        let started = Instant::now();
        let mut request = ResearchRequest::new("kafka compaction");
        request.deadline_ms = Some(300);
        let report = engine.perform(request).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(report.status, ResearchStatus::Degraded);
        assert_eq!(report.results.stats.degraded_reason.as_deref(), Some("Timeout"));
        assert_eq!(report.results.sources.len(), 1);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["status"], "Degraded");
        assert_eq!(value["results"]["stats"]["degradedReason"], "Timeout");
    }

    #[tokio::test]
    async fn test_deadline_without_content_is_timeout() {
        let mut web = ScriptedWeb::default();
        web.result("https://docs.example.com/slow", "Slow docs");
        web.pages.insert(
            "https://docs.example.com/slow".into(),
            Page {
                content: "slow".into(),
                links: Vec::new(),
                delay: Some(Duration::from_secs(5)),
            },
        );
        let (engine, _web) = engine(web);
        let mut request = ResearchRequest::new("slow docs");
        request.deadline_ms = Some(100);
        let err = engine.perform(request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_urls_are_never_read_twice() {
        let mut web = ScriptedWeb::default();
        web.result("https://docs.example.com/a", "Tokio docs")
            .result("https://docs.example.com/a#intro", "Tokio docs again")
            .page(
                "https://docs.example.com/a",
                "Tokio runtime overview",
                &[("/b", "Tokio scheduler"), ("https://docs.example.com/a", "self")],
            )
            .page(
                "https://docs.example.com/b",
                "Scheduler details",
                &[("https://docs.example.com/a", "back"), ("/c", "deeper")],
            );
        let (engine, web) = engine(web);

        let report = engine.perform(ResearchRequest::new("tokio runtime")).await.unwrap();
        let reads = web.reads();
        let unique: HashSet<&String> = reads.iter().collect();
        assert_eq!(unique.len(), reads.len());
        assert_eq!(report.results.stats.total_urls_read, reads.len());
        // The fragment variant collapses into /a; links on depth-2 /b are not followed.
        assert!(!reads.iter().any(|u| u.ends_with("/c")));
        assert!(reads.contains(&"https://docs.example.com/b".to_string()));
    }

    #[tokio::test]
    async fn test_many_failed_reads_compromise_quality() {
        let mut web = ScriptedWeb::default();
        for i in 0..6 {
            web.result(&format!("https://docs.example.com/missing/{}", i), "Docs");
        }
        web.result("https://docs.example.com/ok", "Docs")
            .page("https://docs.example.com/ok", "fine", &[]);
        let (engine, _web) = engine(web);

        let err = engine
            .perform(ResearchRequest::new("example docs"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QualityCompromised);
        assert!(err.message().contains("6 of 7"));
    }

    #[tokio::test]
    async fn test_gaps_drive_focused_reading_and_task_updates() {
        let mut web = ScriptedWeb::default();
        web.result("https://kafka.apache.org/documentation", "Kafka compaction documentation")
            .page(
                "https://kafka.apache.org/documentation",
                &format!("{} kafka compaction", "tombstone ".repeat(6)),
                &[],
            )
            .page(
                "https://docs.confluent.io/kafka/tombstone",
                "Tombstones mark deleted keys.",
                &[],
            );
        web.by_query.insert(
            "kafka compaction tombstone".into(),
            vec![SearchResult {
                title: "Kafka tombstone guide".into(),
                link: "https://docs.confluent.io/kafka/tombstone".into(),
                snippet: String::new(),
            }],
        );
        let web = Arc::new(web);
        let tracker = Arc::new(InMemoryTaskTracker::new());
        let parent = tracker.create(NewTask::titled("Research compaction")).await.unwrap();
        let engine = ResearchEngine::new(
            web.clone(),
            Some(tracker.clone() as Arc<dyn TaskTracker>),
            Config::default().research,
        );

        let mut request = ResearchRequest::new("kafka compaction");
        request.task_id = Some(parent.id.clone());
        let report = engine.perform(request).await.unwrap();

        assert_eq!(report.status, ResearchStatus::Success);
        assert_eq!(report.results.stats.knowledge_gaps[0].term, "tombstone");
        assert!(report.results.sources.iter().any(|s| s.stage == 3));
        assert_eq!(report.references.len(), 2);
        assert!(report.results.queries.contains(&"kafka compaction tombstone".to_string()));

        let parent = tracker.get(&parent.id).await.unwrap();
        assert_eq!(parent.status, TaskStatus::Completed);
        let stages = tracker.list(Some(&parent.id)).await.unwrap();
        assert_eq!(stages.len(), 3);
        assert!(stages.iter().all(|s| s.status == TaskStatus::Completed));
    }

    #[tokio::test]
    async fn test_rejects_bad_requests() {
        let (engine, _web) = engine(ScriptedWeb::default());
        let err = engine.perform(ResearchRequest::new("  ")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);

        let mut request = ResearchRequest::new("rust");
        request.relevance_threshold = Some(1.5);
        assert!(engine.perform(request).await.is_err());
    }
}
