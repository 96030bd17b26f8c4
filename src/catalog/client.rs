use super::{validate_query, Catalog, CatalogError, Chapter, SearchResults, TitleSummary};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const MAX_RESPONSE_SIZE: usize = 2 * 1024 * 1024; // 2MB

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36";

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TitleWire {
    #[serde(rename = "manga_id")]
    id: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "cover_image_url", default)]
    cover_url: Option<String>,
}

impl TitleWire {
    fn into_summary(self) -> TitleSummary {
        TitleSummary {
            title_id: self.id,
            name: self.title,
            cover_url: self.cover_url.filter(|u| !u.trim().is_empty()),
            description: self.description.filter(|d| !d.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChapterWire {
    chapter_id: String,
    chapter_number: f64,
    #[serde(default)]
    release_date: Option<String>,
}

impl ChapterWire {
    fn into_chapter(self) -> Chapter {
        // An unparseable date only loses the timestamp
        let released_at = self.release_date.as_deref().and_then(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    tracing::debug!(chapter_id = %self.chapter_id, raw = %raw, error = %e, "Unparseable release date");
                })
                .ok()
        });
        Chapter {
            chapter_id: self.chapter_id,
            number: self.chapter_number,
            released_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct MetaWire {
    #[serde(default)]
    total_page: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<TitleWire>,
    #[serde(default)]
    meta: MetaWire,
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    data: TitleWire,
}

#[derive(Debug, Deserialize)]
struct ChapterListResponse {
    #[serde(default)]
    data: Vec<ChapterWire>,
}

// ============================================================================
// Client
// ============================================================================

/// REST client for the title/chapter catalog.
#[derive(Clone)]
pub struct HttpCatalog {
    client: reqwest::Client,
    base: Url,
    timeout: Duration,
    search_page_size: u32,
}

impl HttpCatalog {
    /// Build a client for the catalog rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// [`CatalogError::InvalidBaseUrl`] if the URL does not parse or cannot
    /// carry a path. [`CatalogError::Network`] if the HTTP client cannot be
    /// built (TLS backend failure).
    pub fn new(
        base_url: &str,
        timeout: Duration,
        search_page_size: u32,
    ) -> Result<Self, CatalogError> {
        let base =
            Url::parse(base_url).map_err(|e| CatalogError::InvalidBaseUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(CatalogError::InvalidBaseUrl(base_url.to_string()));
        }
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            base,
            timeout,
            search_page_size: search_page_size.max(1),
        })
    }

    /// Join path segments onto the base URL, escaping each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, CatalogError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| CatalogError::InvalidBaseUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn chapter_list_url(&self, title_id: &str, page: u32, page_size: u32) -> Result<Url, CatalogError> {
        let mut url = self.endpoint(&["v1", "chapter", title_id, "list"])?;
        url.query_pairs_mut()
            .append_pair("page", &page.max(1).to_string())
            .append_pair("page_size", &page_size.max(1).to_string())
            .append_pair("sort_by", "chapter_number")
            .append_pair("sort_order", "desc");
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, subject: &str) -> Result<T, CatalogError> {
        tracing::debug!(url = %url, "Catalog request");

        let response = tokio::time::timeout(self.timeout, self.client.get(url).send())
            .await
            .map_err(|_| CatalogError::Timeout)?
            .map_err(CatalogError::Network)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(subject.to_string()));
        }
        if !status.is_success() {
            return Err(CatalogError::HttpStatus(status.as_u16()));
        }

        let bytes = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;
        serde_json::from_slice(&bytes).map_err(|e| CatalogError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn search(&self, query: &str, page: u32) -> Result<SearchResults, CatalogError> {
        let query = validate_query(query)?;
        let mut url = self.endpoint(&["v1", "manga", "list"])?;
        url.query_pairs_mut()
            .append_pair("page", &page.max(1).to_string())
            .append_pair("page_size", &self.search_page_size.to_string())
            .append_pair("sort", "latest")
            .append_pair("sort_order", "desc")
            .append_pair("q", query);

        let response: SearchResponse = self.get_json(url, query).await?;
        Ok(SearchResults {
            items: response
                .data
                .into_iter()
                .map(TitleWire::into_summary)
                .collect(),
            total_pages: response.meta.total_page,
        })
    }

    async fn detail(&self, title_id: &str) -> Result<TitleSummary, CatalogError> {
        let url = self.endpoint(&["v1", "manga", "detail", title_id])?;
        let response: DetailResponse = self.get_json(url, title_id).await?;
        Ok(response.data.into_summary())
    }

    async fn chapters(
        &self,
        title_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Chapter>, CatalogError> {
        let url = self.chapter_list_url(title_id, page, page_size)?;
        let response: ChapterListResponse = self.get_json(url, title_id).await?;
        Ok(response
            .data
            .into_iter()
            .map(ChapterWire::into_chapter)
            .collect())
    }

    async fn latest_chapter(&self, title_id: &str) -> Result<Chapter, CatalogError> {
        let url = self.chapter_list_url(title_id, 1, 1)?;
        let response: ChapterListResponse = self.get_json(url, title_id).await?;
        response
            .data
            .into_iter()
            .next()
            .map(ChapterWire::into_chapter)
            .ok_or_else(|| CatalogError::NoChapters(title_id.to_string()))
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, CatalogError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(CatalogError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(CatalogError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(CatalogError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
