//! reviewscrape - ingest user reviews from a rate-limited web API.
//!
//! The [`scrapers::Requester`] paces and retries outbound calls; the review
//! scraper and storage sinks build on it.

pub mod cli;
pub mod config;
pub mod scrapers;
pub mod storage;
