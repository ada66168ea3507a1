//! MCP (Model Context Protocol) server over stdio, built on rmcp.
//!
//! The whole tool catalog is reachable through two MCP tools: `execute_tool`
//! dispatches a named tool and returns its response envelope, `list_tools`
//! describes the catalog.

mod handlers;
mod server;
pub mod types;

pub use handlers::run_mcp_server;
