use std::sync::Arc;

use super::analyzer::ErrorAnalyzer;
use super::cache::ResultCache;
use super::execution_log::ExecutionLog;
use super::metrics::ToolMetrics;
use super::registry::ToolRegistry;
use crate::analysis::SyntaxValidator;
use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::edit::EditEngine;
use crate::editor::EditorHost;
use crate::error::{ToolError, ToolResult};
use crate::research::ResearchEngine;
use crate::tasks::TaskTracker;
use crate::web::WebSource;
use crate::worker::WorkerPool;
use crate::workspace::{Indexer, Workspace};

/// Everything a handler can reach. Built once by the runtime.
pub struct Services {
    pub config: Config,
    pub edits: EditEngine,
    pub indexer: Indexer,
    pub validator: Arc<SyntaxValidator>,
    pub workers: WorkerPool,
    pub research: ResearchEngine,
    pub web: Arc<dyn WebSource>,
    pub tasks: Arc<dyn TaskTracker>,
    pub checkpoints: CheckpointStore,
    pub editor: Arc<dyn EditorHost>,
    pub cache: ResultCache,
    pub metrics: Arc<ToolMetrics>,
    pub analyzer: ErrorAnalyzer,
    pub registry: Arc<ToolRegistry>,
    pub log: ExecutionLog,
}

/// Per-call handle passed to handlers.
#[derive(Clone)]
pub struct ToolContext {
    pub services: Arc<Services>,
    pub workspace: Option<Arc<Workspace>>,
}

impl ToolContext {
    pub fn new(services: Arc<Services>, workspace: Option<Arc<Workspace>>) -> Self {
        Self {
            services,
            workspace,
        }
    }

    pub fn workspace(&self) -> ToolResult<&Workspace> {
        self.workspace.as_deref().ok_or_else(|| {
            ToolError::BadRequest(
                "No workspace is open; select a project folder first".to_string(),
            )
        })
    }
}
