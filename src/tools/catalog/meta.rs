//! Tools that report on the tool system itself.

use serde::Deserialize;
use serde_json::{json, Value};

use super::to_payload;
use crate::error::{ToolError, ToolResult};
use crate::tools::context::ToolContext;
use crate::tools::params::{parse_args, ParamSpec};
use crate::tools::registry::{handler, ToolDescriptor};
use crate::tools::selection::ToolSelector;

const DEFAULT_RECOMMENDATIONS: usize = 5;

pub(super) fn tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "recommend_tools",
            "Suggest the tools best suited to a described intent.",
            handler(recommend_tools),
        )
        .param(ParamSpec::string("intent", "What you are trying to do").required())
        .param(ParamSpec::integer("limit", "Maximum suggestions")),
        ToolDescriptor::new(
            "get_tool_metrics",
            "Per-tool call counts, failures and latency, cache hits and recurring error patterns.",
            handler(get_tool_metrics),
        ),
        ToolDescriptor::new(
            "list_checkpoints",
            "Editor checkpoints taken before mutating tools, newest first.",
            handler(list_checkpoints),
        ),
    ]
}

#[derive(Deserialize)]
struct RecommendArgs {
    intent: String,
    limit: Option<usize>,
}

async fn recommend_tools(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: RecommendArgs = parse_args("recommend_tools", args)?;
    let limit = args.limit.unwrap_or(DEFAULT_RECOMMENDATIONS).max(1);
    let picks = ToolSelector::recommend(&ctx.services.registry, &args.intent, limit);
    Ok(json!({
        "intent": args.intent,
        "recommendations": to_payload(&picks)?,
    }))
}

async fn get_tool_metrics(ctx: ToolContext, _args: Value) -> ToolResult<Value> {
    let services = &ctx.services;
    let log_pending = services.log.pending_count().await;
    Ok(json!({
        "tools": to_payload(&services.metrics.snapshot())?,
        "cache": {
            "hits": services.cache.hits(),
            "entries": services.cache.len(),
        },
        "errors": {
            "total": services.analyzer.total_errors(),
            "recurring": to_payload(&services.analyzer.recurring_patterns())?,
        },
        "workers": {
            "count": services.workers.workers(),
            "pending": services.workers.pending_count(),
        },
        "validation_cache_entries": services.validator.cached_entries(),
        "undo_depth": services.edits.undo_stack().len(),
        "execution_log": {
            "enabled": services.log.is_enabled(),
            "pending": log_pending,
        },
    }))
}

async fn list_checkpoints(ctx: ToolContext, _args: Value) -> ToolResult<Value> {
    let checkpoints = ctx
        .services
        .checkpoints
        .list()
        .map_err(|e| ToolError::Internal(format!("Failed to list checkpoints: {}", e)))?;
    Ok(json!({
        "count": checkpoints.len(),
        "checkpoints": to_payload(&checkpoints)?,
    }))
}
