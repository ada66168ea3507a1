//! MCP server startup.

use anyhow::Result;
use rmcp::{transport::stdio, ServiceExt};
use std::sync::Arc;
use tracing::{error, info};

use super::server::ToolsmithMcpServer;
use crate::runtime::Runtime;

/// Serve the runtime's tools over stdio until the client disconnects.
pub async fn run_mcp_server(runtime: Arc<Runtime>) -> Result<()> {
    info!(
        tools = runtime.list_tools().len(),
        workspace = ?runtime.workspace().map(|w| w.root().display().to_string()),
        "Starting MCP tool server on stdio"
    );

    let server = ToolsmithMcpServer::new(runtime.clone());
    let service = server.serve(stdio()).await.map_err(|e| {
        error!("Failed to start MCP service: {:?}", e);
        anyhow::anyhow!("Failed to start MCP service: {:?}", e)
    })?;

    let outcome = service.waiting().await;
    runtime.shutdown().await;
    outcome.map_err(|e| {
        error!("MCP service error: {:?}", e);
        anyhow::anyhow!("MCP service error: {:?}", e)
    })?;

    info!("MCP server shutting down");
    Ok(())
}
