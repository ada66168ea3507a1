use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

mod analysis;
mod checkpoint;
mod cli;
mod command;
mod config;
mod domain;
mod edit;
mod editor;
mod error;
mod mcp;
mod research;
mod runtime;
mod store;
mod tasks;
mod tools;
mod web;
mod worker;
mod workspace;

use cli::{Cli, Commands};
use config::Config;
use domain::CallMode;
use runtime::Runtime;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::from_env();
    if let Some(url) = &cli.host_url {
        config.http.host_url = url.clone();
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    let default_mode: CallMode = cli.mode.parse()?;

    let root = cli::resolve_workspace_root(cli.workspace_root.clone())?;
    debug!("Workspace root: {}", root.display());
    let runtime = Arc::new(Runtime::from_config(config, Some(root))?);

    if cli.mcp {
        return mcp::run_mcp_server(runtime).await;
    }

    let outcome = match cli.command {
        Some(Commands::Call { name, args, mode }) => {
            let mode = match mode {
                Some(raw) => raw.parse()?,
                None => default_mode,
            };
            command::run_call(&runtime, &name, &args, mode)
                .await
                .map(|ok| !ok)
        }
        Some(Commands::Tools { json }) => command::run_tools(&runtime, json).await.map(|_| false),
        Some(Commands::Index) => command::run_index(&runtime).await.map(|_| false),
        None => {
            eprintln!("No command specified. Use --help for usage information.");
            eprintln!("Use 'toolsmith --mcp' to start the MCP server or 'toolsmith tools' to list tools.");
            Ok(false)
        }
    };

    runtime.shutdown().await;
    if outcome? {
        std::process::exit(1);
    }
    Ok(())
}
