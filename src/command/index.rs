use anyhow::Result;
use serde_json::json;

use crate::domain::CallMode;
use crate::runtime::Runtime;

pub async fn run_index(runtime: &Runtime) -> Result<()> {
    let Some(workspace) = runtime.workspace() else {
        anyhow::bail!("No workspace: pass --workspace-root or run inside a project");
    };
    println!("Indexing workspace: {}\n", workspace.root().display());

    let response = runtime
        .execute("build_or_update_codebase_index", json!({}), CallMode::Default)
        .await;
    match (&response.payload, &response.error) {
        (Some(stats), _) => {
            println!("Summary:");
            println!("  Indexed: {}", stats["indexed"]);
            println!("  Unchanged: {}", stats["skipped"]);
            println!("  Deleted: {}", stats["deleted"]);
            println!("  Files in index: {}", stats["total_files"]);
            println!("  Definitions: {}", stats["total_definitions"]);
            Ok(())
        }
        (None, Some(error)) => anyhow::bail!("Indexing failed: {}", error.message),
        (None, None) => anyhow::bail!("Indexing returned no result"),
    }
}
