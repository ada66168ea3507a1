//! Command-line surface.

mod args;
mod paths;

pub use args::{Cli, Commands};
pub use paths::resolve_workspace_root;
