//! Web access through the hosting collaborator.

mod client;
mod http;
mod types;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ToolResult;

pub use client::HostWebClient;
pub use types::{PageContent, PageLink, SearchResult};

/// Source of web pages and search results.
#[async_trait]
pub trait WebSource: Send + Sync {
    async fn read_url(&self, url: &str, cancel: &CancellationToken) -> ToolResult<PageContent>;

    async fn search(&self, query: &str, cancel: &CancellationToken) -> ToolResult<Vec<SearchResult>>;
}
