//! Workspace access and the code index.
//!
//! - `types`: the workspace handle and relative path rules
//! - `scanner`: gitignore-aware walking with prefix ignore patterns
//! - `index` / `definitions` / `indexer`: the incremental code index
//! - `search`: substring search over indexed content

mod definitions;
pub mod index;
mod indexer;
pub mod scanner;
mod search;
mod types;
#[cfg(test)]
mod tests;

pub use definitions::extract_definitions;
pub use index::{CodeIndex, DefinitionKind};
pub use indexer::{todo_count, Indexer};
pub use search::{search_content, LineMatch};
pub use types::Workspace;
