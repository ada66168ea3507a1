use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use crate::domain::CallMode;
use crate::runtime::Runtime;

/// Run one tool and print the envelope. Returns whether the call succeeded.
pub async fn run_call(runtime: &Runtime, name: &str, raw_args: &str, mode: CallMode) -> Result<bool> {
    let args: Value = serde_json::from_str(raw_args)
        .with_context(|| format!("Arguments must be a JSON object, got: {}", raw_args))?;
    if !args.is_object() {
        anyhow::bail!("Arguments must be a JSON object, got: {}", raw_args);
    }

    let response = runtime.execute(name, args, mode).await;
    let pretty = serde_json::to_string_pretty(&response)
        .unwrap_or_else(|_| response.to_json_string());
    println!("{}", pretty);
    if let Some(kind) = response.error_kind() {
        debug!(tool = name, %kind, "call failed");
    }
    Ok(response.is_success())
}
