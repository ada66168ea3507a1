use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Toolsmith - tool execution core for code assistants
#[derive(Parser)]
#[command(name = "toolsmith")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as MCP server over stdio
    #[arg(long)]
    pub mcp: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Workspace root (auto-detects git root if absent)
    #[arg(short = 'w', long)]
    pub workspace_root: Option<String>,

    /// Host serving the read-url and search endpoints
    #[arg(long, env = "TOOLSMITH_HOST_URL")]
    pub host_url: Option<String>,

    /// Directory for persisted state (index, checkpoints, logs). Defaults to ~/.toolsmith
    #[arg(long, env = "TOOLSMITH_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Default call mode: "default" or "amend"
    #[arg(long, default_value = "default")]
    pub mode: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single tool and print its response envelope
    Call {
        /// Tool name, e.g. read_file
        name: String,

        /// JSON arguments object
        #[arg(default_value = "{}")]
        args: String,

        /// Call mode for this invocation (overrides --mode)
        #[arg(long)]
        mode: Option<String>,
    },
    /// List the tool catalog
    Tools {
        /// Print full descriptors as JSON
        #[arg(long)]
        json: bool,
    },
    /// Build or update the code index and print what changed
    Index,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_call_subcommand() {
        let cli = Cli::try_parse_from([
            "toolsmith",
            "-w",
            "/tmp/project",
            "call",
            "read_file",
            r#"{"filename":"a.txt"}"#,
            "--mode",
            "amend",
        ])
        .unwrap();
        assert_eq!(cli.workspace_root.as_deref(), Some("/tmp/project"));
        match cli.command {
            Some(Commands::Call { name, args, mode }) => {
                assert_eq!(name, "read_file");
                assert!(args.contains("a.txt"));
                assert_eq!(mode.as_deref(), Some("amend"));
            }
            _ => panic!("expected call subcommand"),
        }
    }

    #[test]
    fn test_call_args_default_to_empty_object() {
        let cli = Cli::try_parse_from(["toolsmith", "call", "task_get_status"]).unwrap();
        match cli.command {
            Some(Commands::Call { args, .. }) => assert_eq!(args, "{}"),
            _ => panic!("expected call subcommand"),
        }
        assert_eq!(cli.mode, "default");
    }
}
