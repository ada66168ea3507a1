//! Single entry point for tool calls.
//!
//! `execute` never returns `Err`: every failure, including unknown tools,
//! timeouts and handler panics, becomes an error envelope annotated by the
//! [`ErrorAnalyzer`](super::analyzer::ErrorAnalyzer).

use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cache::referenced_paths;
use super::context::{Services, ToolContext};
use super::metrics::MetricsSink;
use super::params::coerce_args;
use super::registry::ToolDescriptor;
use crate::domain::{CallMode, ErrorInfo, ToolCall, ToolResponse};
use crate::error::{ToolError, ToolResult};
use crate::workspace::Workspace;

/// Tools whose results describe the tree itself.
const STRUCTURE_TOOLS: &[&str] = &["get_project_structure"];

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    pub mode: CallMode,
    /// Log at debug instead of info.
    pub silent: bool,
}

impl ExecuteOptions {
    pub fn with_mode(mode: CallMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

pub struct ToolDispatcher {
    services: Arc<Services>,
    sink: Arc<dyn MetricsSink>,
}

fn mode_guard(mode: CallMode, name: &str, args: &Value) -> ToolResult<()> {
    if mode == CallMode::Amend && name == "edit_file" && args.get("content").is_some() {
        return Err(ToolError::BadRequest(
            "Full-file rewrites are disabled in amend mode; use apply_diff or edit_file with edits"
                .to_string(),
        ));
    }
    Ok(())
}

fn describe_args(args: &Value) -> String {
    let text = args.to_string();
    text.chars().take(200).collect()
}

impl ToolDispatcher {
    pub fn new(services: Arc<Services>) -> Self {
        let sink: Arc<dyn MetricsSink> = services.metrics.clone();
        Self { services, sink }
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub async fn execute(
        &self,
        call: ToolCall,
        workspace: Option<Arc<Workspace>>,
        options: ExecuteOptions,
    ) -> ToolResponse {
        let started = Instant::now();
        let request_id = Uuid::new_v4().to_string();
        let name = call.name.trim().to_string();

        let descriptor = self.services.registry.get(&name);
        let outcome = match &descriptor {
            Some(descriptor) => {
                self.run(descriptor.clone(), call.args.clone(), workspace, options)
                    .await
            }
            None => Err(ToolError::NotFound(format!("Unknown tool: {}", name))),
        };

        let duration = started.elapsed();
        let duration_ms = duration.as_millis() as u64;
        let (is_error, cached, fallback) = match &outcome {
            Ok((payload, cached)) => (
                false,
                *cached,
                payload.get("fallback").and_then(Value::as_bool).unwrap_or(false),
            ),
            Err(_) => (true, false, false),
        };

        if descriptor.is_some() {
            self.sink.record(&name, duration, !is_error);
        }
        self.services
            .log
            .record(request_id.clone(), &name, &call.args, is_error, duration_ms, cached)
            .await;

        let status = if is_error { "error" } else { "success" };
        if options.silent {
            debug!(request = %request_id, tool = %name, duration_ms, status, cached, fallback, "tool executed");
        } else {
            info!(request = %request_id, tool = %name, duration_ms, status, cached, fallback, "tool executed");
        }

        let mut response = match outcome {
            Ok((payload, cached)) => {
                let mut response = ToolResponse::success(payload);
                response.cached = cached;
                response
            }
            Err(err) => {
                let info: ErrorInfo =
                    self.services
                        .analyzer
                        .analyze(&name, &err, &describe_args(&call.args));
                warn!(tool = %name, kind = %err.kind(), retryable = err.is_retryable(), "tool failed: {}", err);
                ToolResponse::failure(info)
            }
        };
        response.duration_ms = duration_ms;
        response
    }

    async fn run(
        &self,
        descriptor: Arc<ToolDescriptor>,
        raw_args: Value,
        workspace: Option<Arc<Workspace>>,
        options: ExecuteOptions,
    ) -> ToolResult<(Value, bool)> {
        let name = descriptor.name.as_str();
        if descriptor.requires_project && workspace.is_none() {
            return Err(ToolError::BadRequest(format!(
                "No workspace: {} requires an open project folder",
                name
            )));
        }

        let args = coerce_args(&descriptor.parameters, raw_args)?;
        mode_guard(options.mode, name, &args)?;

        if descriptor.cacheable {
            if let Some(hit) = self.services.cache.get(name, &args) {
                debug!(tool = %name, "result cache hit");
                return Ok((hit, true));
            }
        }

        if descriptor.creates_checkpoint {
            self.checkpoint(name);
        }

        let ctx = ToolContext::new(self.services.clone(), workspace);
        let budget = descriptor.timeout.unwrap_or(self.services.config.tool_timeout);
        let payload = self.invoke(&descriptor, ctx, args.clone(), budget).await?;

        if descriptor.creates_checkpoint {
            self.invalidate_after_mutation(&args, &payload);
        }
        if descriptor.cacheable {
            self.services.cache.put(name, &args, payload.clone());
        }
        Ok((payload, false))
    }

    async fn invoke(
        &self,
        descriptor: &ToolDescriptor,
        ctx: ToolContext,
        args: Value,
        budget: Duration,
    ) -> ToolResult<Value> {
        let mut task = tokio::spawn((descriptor.handler)(ctx, args));
        match tokio::time::timeout(budget, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(ToolError::Internal(format!(
                "Tool {} crashed: {}",
                descriptor.name, join_err
            ))),
            Err(_) => {
                task.abort();
                Err(ToolError::Timeout(format!(
                    "Tool {} timed out after {}ms",
                    descriptor.name,
                    budget.as_millis()
                )))
            }
        }
    }

    /// Failures are logged and never block the tool.
    fn checkpoint(&self, name: &str) {
        let state = match self.services.editor.snapshot_state() {
            Ok(state) => state,
            Err(e) => {
                warn!(tool = %name, "editor snapshot failed, skipping checkpoint: {:#}", e);
                return;
            }
        };
        if let Err(e) = self
            .services
            .checkpoints
            .create(&format!("Before {}", name), state)
        {
            warn!(tool = %name, "checkpoint failed: {:#}", e);
        }
    }

    fn invalidate_after_mutation(&self, args: &Value, payload: &Value) {
        let mut paths = referenced_paths(args);
        for key in ["path", "previousPath"] {
            if let Some(p) = payload.get(key).and_then(Value::as_str) {
                paths.push(p.to_string());
            }
        }
        for path in &paths {
            self.services.cache.invalidate_path(path);
            self.services.validator.invalidate_path(path);
        }
        for tool in STRUCTURE_TOOLS {
            self.services.cache.invalidate_tool(tool);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mode_guard() {
        let rewrite = json!({"filename": "a.rs", "content": "x"});
        assert!(mode_guard(CallMode::Amend, "edit_file", &rewrite).is_err());
        assert!(mode_guard(CallMode::Default, "edit_file", &rewrite).is_ok());
        let surgical = json!({"filename": "a.rs", "edits": []});
        assert!(mode_guard(CallMode::Amend, "edit_file", &surgical).is_ok());
        assert!(mode_guard(CallMode::Amend, "apply_diff", &rewrite).is_ok());
    }

    #[test]
    fn test_describe_args_is_bounded() {
        let long = json!({"content": "x".repeat(1000)});
        assert_eq!(describe_args(&long).chars().count(), 200);
    }
}
