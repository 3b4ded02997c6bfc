//! Upstream API access: the paced requester and the review page fetcher.

pub mod requester;
pub mod reviews;

pub use requester::{
    FetchError, FetchResponse, PacingStats, RequestOptions, Requester, RequesterConfig,
    RequesterError, Transport, TransportError,
};
pub use reviews::{PageQuery, ReviewPage, ReviewScraper, ScrapeError, ScrapeSummary};
