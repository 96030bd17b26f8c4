//! Remote title/chapter catalog.
//!
//! The [`Catalog`] trait is the seam the update cycle and the interactive
//! handlers query through; [`HttpCatalog`] is the REST implementation.

mod client;

pub use client::HttpCatalog;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Maximum accepted search query length.
pub const MAX_SEARCH_QUERY_LENGTH: usize = 256;

/// Errors returned by catalog lookups.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// The request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Non-2xx response other than 404
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// The title does not exist (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),
    /// The title exists but has published nothing yet
    #[error("No chapters published for {0}")]
    NoChapters(String),
    /// The body was not the JSON shape we expect
    #[error("Malformed catalog response: {0}")]
    Decode(String),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Query rejected before any request was made
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// The configured catalog base URL cannot carry path segments
    #[error("Invalid catalog base URL: {0}")]
    InvalidBaseUrl(String),
}

impl CatalogError {
    /// True if retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            CatalogError::Network(_) | CatalogError::Timeout => true,
            CatalogError::HttpStatus(status) => *status >= 500 || *status == 429,
            CatalogError::NotFound(_)
            | CatalogError::NoChapters(_)
            | CatalogError::Decode(_)
            | CatalogError::ResponseTooLarge
            | CatalogError::InvalidQuery(_)
            | CatalogError::InvalidBaseUrl(_) => false,
        }
    }
}

/// One installment of a title.
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub chapter_id: String,
    /// Ordinal; fractional for special chapters (e.g. 12.5).
    pub number: f64,
    pub released_at: Option<DateTime<Utc>>,
}

impl Chapter {
    /// Display label for the ordinal, one decimal place.
    pub fn label(&self) -> String {
        format!("{:.1}", self.number)
    }
}

/// Identity and artwork for a title.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleSummary {
    pub title_id: String,
    pub name: String,
    pub cover_url: Option<String>,
    pub description: Option<String>,
}

/// One page of catalog search results.
#[derive(Debug, Clone)]
pub struct SearchResults {
    pub items: Vec<TitleSummary>,
    /// Page count reported by the catalog.
    pub total_pages: u32,
}

/// Query interface to the remote catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Search titles by name. `page` is 1-based.
    async fn search(&self, query: &str, page: u32) -> Result<SearchResults, CatalogError>;

    /// Title details, including cover art.
    async fn detail(&self, title_id: &str) -> Result<TitleSummary, CatalogError>;

    /// One page of chapters, highest ordinal first.
    async fn chapters(
        &self,
        title_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Chapter>, CatalogError>;

    /// The highest-numbered chapter.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NoChapters`] if the title has no chapters;
    /// [`CatalogError::NotFound`] if the title itself is unknown.
    async fn latest_chapter(&self, title_id: &str) -> Result<Chapter, CatalogError>;
}

/// Validate a search query before sending it to the catalog.
pub fn validate_query(query: &str) -> Result<&str, CatalogError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::InvalidQuery("query is empty".to_string()));
    }
    if trimmed.chars().count() > MAX_SEARCH_QUERY_LENGTH {
        return Err(CatalogError::InvalidQuery(format!(
            "query exceeds {} characters",
            MAX_SEARCH_QUERY_LENGTH
        )));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(CatalogError::Timeout.is_transient());
        assert!(CatalogError::HttpStatus(503).is_transient());
        assert!(CatalogError::HttpStatus(429).is_transient());
        assert!(!CatalogError::HttpStatus(400).is_transient());
        assert!(!CatalogError::NotFound("t1".into()).is_transient());
        assert!(!CatalogError::NoChapters("t1".into()).is_transient());
        assert!(!CatalogError::Decode("bad".into()).is_transient());
    }

    #[test]
    fn test_chapter_label_one_decimal() {
        let chapter = Chapter {
            chapter_id: "c1".into(),
            number: 12.5,
            released_at: None,
        };
        assert_eq!(chapter.label(), "12.5");
        let whole = Chapter {
            number: 7.0,
            ..chapter
        };
        assert_eq!(whole.label(), "7.0");
    }

    #[test]
    fn test_validate_query() {
        assert_eq!(validate_query("  solo  ").unwrap(), "solo");
        assert!(validate_query("   ").is_err());
        assert!(validate_query(&"x".repeat(MAX_SEARCH_QUERY_LENGTH + 1)).is_err());
        assert!(validate_query(&"x".repeat(MAX_SEARCH_QUERY_LENGTH)).is_ok());
    }
}
