//! MCP tool parameter types.
//!
//! These types are used with rmcp's `Parameters<T>` wrapper for automatic
//! deserialization and JSON schema generation.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

/// Parameters for the execute_tool tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteToolArgs {
    /// Name of the tool to run, e.g. read_file or apply_diff
    pub name: String,
    /// Arguments object for the tool
    #[serde(default)]
    pub args: Option<Value>,
    /// Call mode: "default" or "amend" (amend forbids full-file rewrites)
    #[serde(default)]
    pub mode: Option<String>,
}

/// Parameters for the list_tools tool (no arguments needed)
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListToolsArgs {}
