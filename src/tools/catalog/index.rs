use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::to_payload;
use crate::error::{ToolError, ToolResult};
use crate::tools::context::ToolContext;
use crate::tools::params::{parse_args, ParamSpec, ParamType};
use crate::tools::registry::{handler, ToolDescriptor};

/// Full passes over large trees outlive the default budget.
const INDEX_TIMEOUT: Duration = Duration::from_secs(300);

pub(super) fn tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "build_or_update_codebase_index",
            "Index definitions (functions, classes, variables, TODOs) across the workspace. Unchanged files are skipped.",
            handler(build_or_update_codebase_index),
        )
        .requires_project()
        .timeout(INDEX_TIMEOUT),
        ToolDescriptor::new(
            "query_codebase",
            "Find definitions and lines matching a term in the code index.",
            handler(query_codebase),
        )
        .param(ParamSpec::string("query", "Case-insensitive search term").required())
        .param(ParamSpec::integer("max_results", "Maximum hits to return"))
        .requires_project(),
        ToolDescriptor::new(
            "reindex_codebase_paths",
            "Re-index specific files or folders after they changed.",
            handler(reindex_codebase_paths),
        )
        .param(ParamSpec::array("paths", ParamType::String, "Files or folders to re-index").required())
        .requires_project()
        .timeout(INDEX_TIMEOUT),
    ]
}

async fn build_or_update_codebase_index(ctx: ToolContext, _args: Value) -> ToolResult<Value> {
    let indexer = &ctx.services.indexer;
    let stats = indexer.build_or_update(ctx.workspace()?).await?;
    let index = indexer.snapshot();
    Ok(json!({
        "indexed": stats.indexed,
        "skipped": stats.skipped,
        "deleted": stats.deleted,
        "total_files": index.len(),
        "total_definitions": index.definition_count(),
    }))
}

#[derive(Deserialize)]
struct QueryArgs {
    query: String,
    max_results: Option<usize>,
}

async fn query_codebase(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: QueryArgs = parse_args("query_codebase", args)?;
    if args.query.trim().is_empty() {
        return Err(ToolError::BadRequest("query must not be empty".to_string()));
    }
    let indexer = &ctx.services.indexer;
    if indexer.snapshot().is_empty() {
        indexer.build_or_update(ctx.workspace()?).await?;
    }

    let mut hits = indexer.query(&args.query);
    let total = hits.len();
    if let Some(max) = args.max_results {
        hits.truncate(max.max(1));
    }
    Ok(json!({
        "query": args.query,
        "total": total,
        "results": to_payload(&hits)?,
    }))
}

#[derive(Deserialize)]
struct ReindexArgs {
    paths: Vec<String>,
}

async fn reindex_codebase_paths(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: ReindexArgs = parse_args("reindex_codebase_paths", args)?;
    if args.paths.is_empty() {
        return Err(ToolError::BadRequest("paths must not be empty".to_string()));
    }
    let stats = ctx
        .services
        .indexer
        .reindex_paths(ctx.workspace()?, &args.paths)
        .await?;
    to_payload(&stats)
}
