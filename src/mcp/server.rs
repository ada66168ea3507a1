//! MCP server implementation.

use rmcp::{
    handler::server::router::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::types::*;
use crate::domain::CallMode;
use crate::runtime::Runtime;

fn tool_error(message: impl Into<String>) -> CallToolResult {
    CallToolResult::error(vec![Content::text(message.into())])
}

/// Toolsmith MCP Server
#[derive(Clone)]
pub struct ToolsmithMcpServer {
    runtime: Arc<Runtime>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl ToolsmithMcpServer {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            runtime,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "execute_tool",
        description = r#"Run one tool from the catalog and return its response envelope as JSON:
{"status": "Success" | "Error", "payload": ..., "error": {"kind", "message", "suggestion", "alternativeTool"}, "cached", "duration_ms"}.

Call list_tools first to see the available tools and their parameters.
Pass mode "amend" to forbid full-file rewrites and force surgical edits (apply_diff, line edits)."#
    )]
    async fn execute_tool(
        &self,
        Parameters(args): Parameters<ExecuteToolArgs>,
    ) -> Result<CallToolResult, McpError> {
        let mode = match args.mode.as_deref().map(str::parse::<CallMode>).transpose() {
            Ok(mode) => mode.unwrap_or_default(),
            Err(e) => return Ok(tool_error(format!("Error: {}", e))),
        };
        let tool_args = args.args.unwrap_or_else(|| Value::Object(Default::default()));
        debug!(tool = %args.name, ?mode, "MCP execute_tool");

        let response = self.runtime.execute(&args.name, tool_args, mode).await;
        let text = response.to_json_string();
        if response.is_success() {
            Ok(CallToolResult::success(vec![Content::text(text)]))
        } else {
            Ok(CallToolResult::error(vec![Content::text(text)]))
        }
    }

    #[tool(
        name = "list_tools",
        description = "Describe every tool execute_tool can run: name, description, JSON parameter schema, and whether it needs a workspace or creates a checkpoint."
    )]
    fn list_tools(
        &self,
        Parameters(_): Parameters<ListToolsArgs>,
    ) -> Result<CallToolResult, McpError> {
        let tools = self.runtime.list_tools();
        let text = serde_json::to_string_pretty(&tools)
            .map_err(|e| McpError::internal_error(format!("Failed to encode tool list: {}", e), None))?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

#[tool_handler]
impl ServerHandler for ToolsmithMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "toolsmith".to_string(),
                title: None,
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Toolsmith runs file, edit, code intelligence, research and task tools against the workspace. Use list_tools, then execute_tool."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::editor::DetachedEditor;
    use crate::runtime::Collaborators;
    use crate::store::MemoryStore;
    use crate::tasks::InMemoryTaskTracker;
    use crate::web::HostWebClient;
    use serde_json::json;
    use tempfile::TempDir;

    fn server(dir: &TempDir) -> ToolsmithMcpServer {
        let config = Config::default();
        let collab = Collaborators {
            store: Arc::new(MemoryStore::new()),
            editor: Arc::new(DetachedEditor::new(dir.path().to_path_buf())),
            web: Arc::new(HostWebClient::new(&config.http).unwrap()),
            tasks: Arc::new(InMemoryTaskTracker::new()),
        };
        let runtime = Runtime::build(config, Some(dir.path().to_path_buf()), collab).unwrap();
        ToolsmithMcpServer::new(Arc::new(runtime))
    }

    fn text_of(result: &CallToolResult) -> String {
        result
            .content
            .iter()
            .filter_map(|c| c.as_text().map(|t| t.text.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_execute_tool_returns_envelope() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello\n").unwrap();
        let server = server(&dir);

        let result = server
            .execute_tool(Parameters(ExecuteToolArgs {
                name: "read_file".into(),
                args: Some(json!({"filename": "a.txt"})),
                mode: None,
            }))
            .await
            .unwrap();
        assert_ne!(result.is_error, Some(true));
        let envelope: Value = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(envelope["status"], "Success");
        assert_eq!(envelope["payload"]["content"], "hello\n");
    }

    #[tokio::test]
    async fn test_execute_tool_flags_errors_and_bad_modes() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir);

        let result = server
            .execute_tool(Parameters(ExecuteToolArgs {
                name: "nope".into(),
                args: None,
                mode: None,
            }))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
        let envelope: Value = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(envelope["error"]["kind"], "NotFound");

        let result = server
            .execute_tool(Parameters(ExecuteToolArgs {
                name: "read_file".into(),
                args: None,
                mode: Some("sideways".into()),
            }))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn test_list_tools_and_info() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir);
        let result = server.list_tools(Parameters(ListToolsArgs {})).unwrap();
        let tools: Value = serde_json::from_str(&text_of(&result)).unwrap();
        assert!(tools
            .as_array()
            .unwrap()
            .iter()
            .any(|t| t["name"] == "apply_diff" && t["createsCheckpoint"] == true));
        assert_eq!(server.get_info().server_info.name, "toolsmith");
    }
}
