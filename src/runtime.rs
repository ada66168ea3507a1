//! Composition root.
//!
//! Every long-lived collaborator (undo stack, caches, worker pool, registry)
//! is built here once and handed to the dispatcher. Tests build a fresh
//! runtime per case with in-memory collaborators.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analysis::SyntaxValidator;
use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::domain::{CallMode, ToolCall, ToolResponse};
use crate::edit::{EditEngine, UndoStack};
use crate::editor::{DetachedEditor, EditorHost};
use crate::research::ResearchEngine;
use crate::store::{FileStore, MemoryStore, ObjectStore};
use crate::tasks::{InMemoryTaskTracker, TaskTracker};
use crate::tools::{
    builtin_tools, ErrorAnalyzer, ExecuteOptions, ExecutionLog, ResultCache, Services,
    ToolDispatcher, ToolMetrics, ToolRegistry, ToolSummary,
};
use crate::web::{HostWebClient, WebSource};
use crate::worker::WorkerPool;
use crate::workspace::{Indexer, Workspace};

/// Capacity of the syntax validation cache.
const VALIDATION_CACHE_CAPACITY: usize = 256;

/// External collaborators the core talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn ObjectStore>,
    pub editor: Arc<dyn EditorHost>,
    pub web: Arc<dyn WebSource>,
    pub tasks: Arc<dyn TaskTracker>,
}

pub struct Runtime {
    dispatcher: ToolDispatcher,
    workspace: Option<Arc<Workspace>>,
}

impl Runtime {
    /// Wire every service together. Must be called inside a tokio runtime
    /// because the worker pool spawns its workers immediately.
    pub fn build(config: Config, root: Option<PathBuf>, collab: Collaborators) -> Result<Self> {
        let workspace = root.map(|root| Arc::new(Workspace::new(root, config.ignore_patterns.clone())));

        let validator = Arc::new(SyntaxValidator::new(VALIDATION_CACHE_CAPACITY));
        let undo = Arc::new(UndoStack::new(config.edit.undo_capacity));
        let edits = EditEngine::new(
            undo,
            validator.clone(),
            collab.editor.clone(),
            config.edit.clone(),
        );

        let indexer = Indexer::new(collab.store.clone(), config.text_extensions.clone());
        if let Err(e) = indexer.load() {
            warn!("Starting with an empty code index: {}", e);
        }

        let workers = WorkerPool::new(
            config.workers.workers,
            config.workers.request_timeout,
            validator.clone(),
        );
        let research = ResearchEngine::new(
            collab.web.clone(),
            Some(collab.tasks.clone()),
            config.research.clone(),
        );

        let registry = Arc::new(ToolRegistry::new());
        registry
            .register_all(builtin_tools())
            .map_err(|e| anyhow::anyhow!("Failed to register built-in tools: {}", e))?;
        debug!("Registered {} tools", registry.len());

        let services = Services {
            cache: ResultCache::new(config.cache.capacity, config.cache.ttl),
            metrics: Arc::new(ToolMetrics::new(config.slow_call_threshold)),
            analyzer: ErrorAnalyzer::new(),
            checkpoints: CheckpointStore::new(collab.store.clone()),
            log: ExecutionLog::new(collab.store.clone()),
            edits,
            indexer,
            validator,
            workers,
            research,
            web: collab.web,
            tasks: collab.tasks,
            editor: collab.editor,
            registry,
            config,
        };

        Ok(Self {
            dispatcher: ToolDispatcher::new(Arc::new(services)),
            workspace,
        })
    }

    /// Production wiring: persisted state under the data directory, the
    /// host web client, a detached editor and the in-memory task tracker.
    pub fn from_config(config: Config, root: Option<PathBuf>) -> Result<Self> {
        let root = match root {
            Some(root) => {
                let root = root
                    .canonicalize()
                    .with_context(|| format!("Workspace root {} does not exist", root.display()))?;
                if !root.is_dir() {
                    bail!("Workspace root {} is not a directory", root.display());
                }
                Some(root)
            }
            None => None,
        };

        let store: Arc<dyn ObjectStore> = match (config.resolve_data_dir(), &root) {
            (Some(dir), Some(root)) => Arc::new(FileStore::new(&dir, root)?),
            _ => {
                info!("No workspace or data directory; state is kept in memory");
                Arc::new(MemoryStore::new())
            }
        };
        let editor_root = match &root {
            Some(root) => root.clone(),
            None => std::env::current_dir().context("Failed to read current directory")?,
        };
        let collab = Collaborators {
            store,
            editor: Arc::new(DetachedEditor::new(editor_root)),
            web: Arc::new(HostWebClient::new(&config.http)?),
            tasks: Arc::new(InMemoryTaskTracker::new()),
        };
        Self::build(config, root, collab)
    }

    pub fn workspace(&self) -> Option<&Arc<Workspace>> {
        self.workspace.as_ref()
    }

    pub fn services(&self) -> &Arc<Services> {
        self.dispatcher.services()
    }

    pub async fn execute(&self, name: &str, args: Value, mode: CallMode) -> ToolResponse {
        self.execute_call(ToolCall::new(name, args), ExecuteOptions::with_mode(mode))
            .await
    }

    pub async fn execute_call(&self, call: ToolCall, options: ExecuteOptions) -> ToolResponse {
        self.dispatcher
            .execute(call, self.workspace.clone(), options)
            .await
    }

    pub fn list_tools(&self) -> Vec<ToolSummary> {
        self.services()
            .registry
            .list()
            .iter()
            .map(|tool| tool.summary())
            .collect()
    }

    /// Flush pending log events and stop the workers.
    pub async fn shutdown(&self) {
        let services = self.services();
        services.log.flush().await;
        services.workers.shutdown();
        debug!("Runtime shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ToolError, ToolResult};
    use crate::web::{PageContent, SearchResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    struct OfflineWeb;

    #[async_trait]
    impl WebSource for OfflineWeb {
        async fn read_url(&self, url: &str, _cancel: &CancellationToken) -> ToolResult<PageContent> {
            Err(ToolError::Transient(format!("offline: {}", url)))
        }

        async fn search(&self, _query: &str, _cancel: &CancellationToken) -> ToolResult<Vec<SearchResult>> {
            Ok(Vec::new())
        }
    }

    fn runtime(dir: &TempDir) -> Runtime {
        let collab = Collaborators {
            store: Arc::new(MemoryStore::new()),
            editor: Arc::new(DetachedEditor::new(dir.path().to_path_buf())),
            web: Arc::new(OfflineWeb),
            tasks: Arc::new(InMemoryTaskTracker::new()),
        };
        Runtime::build(Config::default(), Some(dir.path().to_path_buf()), collab).unwrap()
    }

    async fn call(rt: &Runtime, name: &str, args: Value) -> ToolResponse {
        rt.execute(name, args, CallMode::Default).await
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let dir = TempDir::new().unwrap();
        let rt = runtime(&dir);

        let created = call(&rt, "create_file", json!({"filename": "a.txt", "content": "hello\n"})).await;
        assert!(created.is_success(), "{:?}", created.error);

        let read = call(&rt, "read_file", json!({"filename": "a.txt"})).await;
        assert!(read.is_success());
        assert_eq!(read.payload.unwrap()["content"], "hello\n");
    }

    #[tokio::test]
    async fn test_apply_diff_then_undo() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "x\ny\nz").unwrap();
        let rt = runtime(&dir);

        let diff = "<<<<<<< SEARCH\n:start_line:2\n-------\ny\n=======\nY\n>>>>>>> REPLACE";
        let resp = call(&rt, "apply_diff", json!({"filename": "b.txt", "diff": diff})).await;
        assert!(resp.is_success(), "{:?}", resp.error);
        assert_eq!(fs::read_to_string(dir.path().join("b.txt")).unwrap(), "x\nY\nz");

        let undo = call(&rt, "undo_last_change", json!({})).await;
        assert!(undo.is_success(), "{:?}", undo.error);
        assert_eq!(fs::read_to_string(dir.path().join("b.txt")).unwrap(), "x\ny\nz");
    }

    #[tokio::test]
    async fn test_apply_diff_mismatch_is_conflict() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "x\ny\nz").unwrap();
        let rt = runtime(&dir);

        let diff = "<<<<<<< SEARCH\n:start_line:2\n-------\nq\n=======\nY\n>>>>>>> REPLACE";
        let resp = call(&rt, "apply_diff", json!({"filename": "b.txt", "diff": diff})).await;
        assert_eq!(resp.error_kind(), Some(ErrorKind::Conflict));
        let error = resp.error.unwrap();
        assert!(error.message.contains(">>> 2: y"));
        assert_eq!(error.alternative_tool.as_deref(), Some("read_file"));
        assert_eq!(fs::read_to_string(dir.path().join("b.txt")).unwrap(), "x\ny\nz");
    }

    #[tokio::test]
    async fn test_line_edit_verification_leaves_file_unchanged() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("c.txt"), "different\nsecond\n").unwrap();
        let rt = runtime(&dir);

        let resp = call(
            &rt,
            "edit_file",
            json!({
                "filename": "c.txt",
                "edits": [{"type": "replace_lines", "start_line": 1, "end_line": 1,
                           "expected_content": "old", "new_content": "new"}]
            }),
        )
        .await;
        assert_eq!(resp.error_kind(), Some(ErrorKind::Conflict));
        assert_eq!(
            fs::read_to_string(dir.path().join("c.txt")).unwrap(),
            "different\nsecond\n"
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_and_missing_workspace() {
        let dir = TempDir::new().unwrap();
        let rt = runtime(&dir);
        let resp = call(&rt, "no_such_tool", json!({})).await;
        assert_eq!(resp.error_kind(), Some(ErrorKind::NotFound));

        let collab = Collaborators {
            store: Arc::new(MemoryStore::new()),
            editor: Arc::new(DetachedEditor::new(dir.path().to_path_buf())),
            web: Arc::new(OfflineWeb),
            tasks: Arc::new(InMemoryTaskTracker::new()),
        };
        let detached = Runtime::build(Config::default(), None, collab).unwrap();
        let resp = call(&detached, "read_file", json!({"filename": "a.txt"})).await;
        assert_eq!(resp.error_kind(), Some(ErrorKind::BadRequest));

        // Tools without a project still run.
        let resp = call(&detached, "task_get_status", json!({})).await;
        assert!(resp.is_success(), "{:?}", resp.error);
    }

    #[tokio::test]
    async fn test_cached_read_is_invalidated_by_edit() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("d.txt"), "one\n").unwrap();
        let rt = runtime(&dir);

        let first = call(&rt, "read_file", json!({"filename": "d.txt"})).await;
        assert!(!first.cached);
        let second = call(&rt, "read_file", json!({"filename": "d.txt"})).await;
        assert!(second.cached);

        let edit = call(&rt, "edit_file", json!({"filename": "d.txt", "content": "two\n"})).await;
        assert!(edit.is_success(), "{:?}", edit.error);

        let third = call(&rt, "read_file", json!({"filename": "d.txt"})).await;
        assert!(!third.cached);
        assert_eq!(third.payload.unwrap()["content"], "two\n");
    }

    #[tokio::test]
    async fn test_amend_mode_rejects_full_rewrite() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("e.txt"), "keep\n").unwrap();
        let rt = runtime(&dir);

        let resp = rt
            .execute("edit_file", json!({"filename": "e.txt", "content": "gone\n"}), CallMode::Amend)
            .await;
        assert_eq!(resp.error_kind(), Some(ErrorKind::BadRequest));
        assert_eq!(fs::read_to_string(dir.path().join("e.txt")).unwrap(), "keep\n");
    }

    #[tokio::test]
    async fn test_mutations_create_checkpoints() {
        let dir = TempDir::new().unwrap();
        let rt = runtime(&dir);

        call(&rt, "create_file", json!({"filename": "f.txt", "content": "x"})).await;
        let resp = call(&rt, "list_checkpoints", json!({})).await;
        let payload = resp.payload.unwrap();
        assert_eq!(payload["count"], 1);
        assert_eq!(payload["checkpoints"][0]["name"], "Before create_file");
    }

    #[tokio::test]
    async fn test_analysis_tools_run_through_workers() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("lib.rs"),
            "pub fn total(items: &[u32]) -> u32 {\n    let mut sum = 0;\n    for i in items {\n        if *i > 0 {\n            sum += i;\n        }\n    }\n    sum\n}\n",
        )
        .unwrap();
        let rt = runtime(&dir);

        let resp = call(&rt, "analyze_code", json!({"filename": "lib.rs"})).await;
        assert!(resp.is_success(), "{:?}", resp.error);
        let payload = resp.payload.unwrap();
        assert_eq!(payload["outline"]["symbols"][0]["name"], "total");

        let resp = call(&rt, "trace_data_flow", json!({"filename": "lib.rs", "variable": "sum"})).await;
        assert!(resp.is_success(), "{:?}", resp.error);

        let resp = call(
            &rt,
            "batch_validate_files",
            json!({"filenames": ["lib.rs", "missing.rs"]}),
        )
        .await;
        let payload = resp.payload.unwrap();
        assert_eq!(payload["succeeded"], 1);
        assert_eq!(payload["failed"], 1);
        assert_eq!(payload["files"][1]["ok"], false);
    }

    #[tokio::test]
    async fn test_metrics_and_recommendations() {
        let dir = TempDir::new().unwrap();
        let rt = runtime(&dir);

        call(&rt, "read_file", json!({"filename": "nope.txt"})).await;
        let resp = call(&rt, "get_tool_metrics", json!({})).await;
        let payload = resp.payload.unwrap();
        assert_eq!(payload["tools"]["read_file"]["failures"], 1);
        assert_eq!(payload["errors"]["total"], 1);

        let resp = call(&rt, "recommend_tools", json!({"intent": "read a file"})).await;
        let picks = resp.payload.unwrap()["recommendations"].clone();
        assert!(picks
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p["name"] == "read_file"));
        assert!(!rt.list_tools().is_empty());
        rt.shutdown().await;
    }
}
