//! Review page fetching for a catalog item.
//!
//! Fetches a single page of reviews from the Steam `appreviews` endpoint
//! through the shared [`Requester`] and hands each raw review to a sink.
//! Choosing which cursor to request next is left to the caller.

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use super::requester::{FetchError, RequestOptions, Requester};
use crate::storage::{ReviewSink, StorageError, StoredReview};

/// Default review endpoint; the app id is appended as a path segment.
pub const DEFAULT_REVIEWS_URL: &str = "https://store.steampowered.com/appreviews";

/// Largest page size the endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("review endpoint returned HTTP {0}")]
    Status(u16),

    #[error("review endpoint reported failure: {0}")]
    Api(String),

    #[error("malformed review payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to store review: {0}")]
    Storage(#[from] StorageError),
}

/// Query parameters for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    /// Opaque cursor; `*` requests the first page.
    pub cursor: String,
    pub filter: String,
    pub language: String,
    pub num_per_page: u32,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            cursor: "*".to_string(),
            filter: "recent".to_string(),
            language: "all".to_string(),
            num_per_page: MAX_PAGE_SIZE,
        }
    }
}

impl PageQuery {
    fn to_options(&self) -> RequestOptions {
        RequestOptions::new()
            .query("json", "1")
            .query("filter", &self.filter)
            .query("language", &self.language)
            .query("purchase_type", "all")
            .query("num_per_page", self.num_per_page.min(MAX_PAGE_SIZE).to_string())
            .query("cursor", &self.cursor)
    }
}

#[derive(Debug, Deserialize)]
struct ReviewsPayload {
    success: i64,
    #[serde(default)]
    query_summary: Option<QuerySummary>,
    #[serde(default)]
    reviews: Vec<serde_json::Value>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuerySummary {
    #[serde(default)]
    total_reviews: Option<u64>,
}

/// One page of raw reviews.
#[derive(Debug, Clone)]
pub struct ReviewPage {
    pub app_id: u64,
    pub reviews: Vec<serde_json::Value>,
    /// Cursor returned by the endpoint for the following page.
    pub cursor: Option<String>,
    /// Only reported on the first page.
    pub total_reviews: Option<u64>,
}

/// Result of storing one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeSummary {
    pub saved: usize,
    pub cursor: Option<String>,
    pub total_reviews: Option<u64>,
}

/// Fetches review pages through a shared requester.
#[derive(Debug, Clone)]
pub struct ReviewScraper {
    requester: Requester,
    base_url: String,
}

impl ReviewScraper {
    pub fn new(requester: Requester) -> Self {
        Self::with_base_url(requester, DEFAULT_REVIEWS_URL)
    }

    pub fn with_base_url(requester: Requester, base_url: &str) -> Self {
        Self {
            requester,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn page_url(&self, app_id: u64) -> String {
        format!("{}/{}", self.base_url, app_id)
    }

    /// Fetch a single page of reviews.
    pub async fn fetch_page(
        &self,
        app_id: u64,
        query: &PageQuery,
    ) -> Result<ReviewPage, ScrapeError> {
        let url = self.page_url(app_id);
        debug!("Fetching reviews for app {} (cursor {})", app_id, query.cursor);

        let response = self.requester.get(&url, query.to_options()).await?;
        if !response.is_success() {
            return Err(ScrapeError::Status(response.status.as_u16()));
        }

        let payload: ReviewsPayload = response.json()?;
        if payload.success != 1 {
            return Err(ScrapeError::Api(format!(
                "success={} for app {}",
                payload.success, app_id
            )));
        }

        Ok(ReviewPage {
            app_id,
            reviews: payload.reviews,
            cursor: payload.cursor,
            total_reviews: payload.query_summary.and_then(|s| s.total_reviews),
        })
    }

    /// Fetch a page and save every review in it.
    pub async fn scrape_page(
        &self,
        app_id: u64,
        query: &PageQuery,
        sink: &dyn ReviewSink,
    ) -> Result<ScrapeSummary, ScrapeError> {
        let page = self.fetch_page(app_id, query).await?;

        let mut saved = 0;
        for review in page.reviews {
            sink.save(&StoredReview::new(app_id, review)).await?;
            saved += 1;
        }

        info!("Saved {} reviews for app {}", saved, app_id);
        Ok(ScrapeSummary {
            saved,
            cursor: page.cursor,
            total_reviews: page.total_reviews,
        })
    }
}
