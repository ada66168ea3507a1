//! Tool registry, dispatch and the built-in catalog.

pub mod analyzer;
pub mod cache;
pub mod catalog;
pub mod context;
pub mod dispatcher;
pub mod execution_log;
pub mod metrics;
pub mod params;
pub mod registry;
pub mod selection;

pub use analyzer::ErrorAnalyzer;
pub use cache::ResultCache;
pub use catalog::builtin_tools;
pub use context::Services;
pub use dispatcher::{ExecuteOptions, ToolDispatcher};
pub use execution_log::ExecutionLog;
pub use metrics::ToolMetrics;
pub use registry::{ToolRegistry, ToolSummary};
