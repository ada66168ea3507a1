use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::to_payload;
use crate::error::{ToolError, ToolResult};
use crate::research::ResearchRequest;
use crate::tools::context::ToolContext;
use crate::tools::params::{parse_args, ParamSpec, ParamType};
use crate::tools::registry::{handler, ToolDescriptor};

/// Research enforces its own deadline; this only bounds a runaway session.
const RESEARCH_TIMEOUT: Duration = Duration::from_secs(600);

pub(super) fn tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new("read_url", "Fetch a web page as text with its links.", handler(read_url))
            .param(ParamSpec::string("url", "Absolute http(s) URL").required()),
        ToolDescriptor::new(
            "duckduckgo_search",
            "Web search returning titles, links and snippets.",
            handler(duckduckgo_search),
        )
        .param(ParamSpec::string("query", "Search query").required()),
        ToolDescriptor::new(
            "perform_research",
            "Multi-stage web research: expands the query, reads the most relevant pages, \
             follows up on knowledge gaps and returns ranked sources with a summary. \
             Returns partial results with status Degraded when the deadline or network cuts it short.",
            handler(perform_research),
        )
        .param(ParamSpec::string("query", "Research question").required())
        .param(ParamSpec::array("queries", ParamType::String, "Explicit search queries to use instead of expansions"))
        .param(ParamSpec::integer("max_results", "Maximum pages to read"))
        .param(ParamSpec::integer("depth", "Link-following depth"))
        .param(ParamSpec::number("relevance_threshold", "Minimum relevance (0-1) for a source to be kept"))
        .param(ParamSpec::string("task_id", "Task to record progress on"))
        .param(ParamSpec::integer("deadline_ms", "Overall time budget in milliseconds"))
        .timeout(RESEARCH_TIMEOUT),
    ]
}

#[derive(Deserialize)]
struct UrlArgs {
    url: String,
}

async fn read_url(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: UrlArgs = parse_args("read_url", args)?;
    let parsed = url::Url::parse(args.url.trim())
        .map_err(|e| ToolError::BadRequest(format!("Invalid URL '{}': {}", args.url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ToolError::BadRequest(format!(
            "Unsupported URL scheme '{}': only http and https can be read",
            parsed.scheme()
        )));
    }
    let page = ctx
        .services
        .web
        .read_url(parsed.as_str(), &CancellationToken::new())
        .await?;
    to_payload(&page)
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
}

async fn duckduckgo_search(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: SearchArgs = parse_args("duckduckgo_search", args)?;
    let query = args.query.trim();
    if query.is_empty() {
        return Err(ToolError::BadRequest("query must not be empty".to_string()));
    }
    let results = ctx
        .services
        .web
        .search(query, &CancellationToken::new())
        .await?;
    Ok(json!({
        "query": query,
        "count": results.len(),
        "results": to_payload(&results)?,
    }))
}

async fn perform_research(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let request: ResearchRequest = parse_args("perform_research", args)?;
    if request.query.trim().is_empty() {
        return Err(ToolError::BadRequest("query must not be empty".to_string()));
    }
    let report = ctx.services.research.perform(request).await?;
    to_payload(&report)
}
