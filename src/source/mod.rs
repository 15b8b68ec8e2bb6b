//! Content source adapters
//!
//! A [`ContentSource`] is where posts come from. [`PrismicSource`]
//! queries a Prismic repository over HTTP; [`MemorySource`] serves
//! pages held in memory.

mod memory;
mod prismic;

use async_trait::async_trait;

use crate::config::CmsConfig;
use crate::content::{InvalidDocument, QueryPage, RawPost};

pub use memory::MemorySource;
pub use prismic::{link_resolver, PrismicSource};

#[cfg(test)]
pub(crate) use memory::tests as memory_tests;

/// Errors raised by a content source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error(transparent)]
    InvalidDocument(#[from] InvalidDocument),

    #[error("API metadata has no master ref")]
    MissingMasterRef,

    #[error("Content source is not configured: {0}")]
    NotConfigured(String),

    #[error("No page at {0}")]
    UnknownPage(String),
}

/// A listing query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub document_type: String,
    pub page_size: usize,
    /// Qualified fields to fetch (`posts.title`); empty fetches everything
    pub fetch_fields: Vec<String>,
    /// Page number to start from, 1-based
    pub page: Option<usize>,
    /// Preview ref; when set, draft content is returned
    pub preview_ref: Option<String>,
}

impl QueryRequest {
    /// First-page listing query built from configuration
    pub fn listing(config: &CmsConfig, preview_ref: Option<String>) -> Self {
        Self {
            document_type: config.document_type.clone(),
            page_size: config.page_size,
            fetch_fields: config.qualified_fetch(),
            page: None,
            preview_ref,
        }
    }
}

/// Where posts come from
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Run a listing query and return its first requested page
    async fn query(&self, request: &QueryRequest) -> Result<QueryPage, SourceError>;

    /// Follow an opaque `next_page` URL returned by an earlier page
    async fn fetch_page(&self, url: &str) -> Result<QueryPage, SourceError>;

    /// Fetch a single document by uid
    async fn get_by_uid(
        &self,
        document_type: &str,
        uid: &str,
        preview_ref: Option<&str>,
    ) -> Result<Option<RawPost>, SourceError>;

    /// Resolve a preview token and document id to the path to redirect to
    ///
    /// Returns `None` when the token does not resolve.
    async fn resolve_preview(
        &self,
        token: &str,
        document_id: &str,
    ) -> Result<Option<String>, SourceError>;
}
