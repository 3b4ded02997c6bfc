//! Per-attempt classification and the values a fetch resolves to.

use std::collections::HashMap;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::config::{RequesterConfig, BACKOFF_STATUS};
use super::transport::{TransportError, TransportResponse};

/// Errors building a requester.
#[derive(Debug, Error)]
pub enum RequesterError {
    #[error("invalid requester configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// A fetch that produced no usable outcome.
///
/// Exhausting the retry budget while still receiving responses is not an
/// error; the last response is returned instead.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("no response obtained after {attempts} attempts: {last_error}")]
    NoResponse {
        attempts: u32,
        #[source]
        last_error: TransportError,
    },
}

/// Outcome of a single attempt, decided once and threaded through the retry loop.
#[derive(Debug)]
pub enum Attempt {
    /// Ends the loop; returned as-is whatever the status.
    Terminal(TransportResponse),
    /// Consumes budget and retries. `backoff` is set for the overload signal.
    Retryable {
        response: TransportResponse,
        backoff: bool,
    },
    /// No status code was received.
    Failed(TransportError),
}

impl Attempt {
    /// Classify a transport result against the retry-status set.
    pub fn classify(
        result: Result<TransportResponse, TransportError>,
        config: &RequesterConfig,
    ) -> Self {
        match result {
            Err(e) => Attempt::Failed(e),
            Ok(response) => {
                let code = response.status.as_u16();
                if config.is_retry_status(code) {
                    Attempt::Retryable {
                        response,
                        backoff: code == BACKOFF_STATUS,
                    }
                } else {
                    Attempt::Terminal(response)
                }
            }
        }
    }
}

/// Final response handed back to the caller.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    /// Attempts consumed by the fetch that produced this response.
    pub attempts: u32,
}

impl FetchResponse {
    pub(crate) fn from_transport(response: TransportResponse, attempts: u32) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
            attempts,
        }
    }

    /// Check if the response is 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get a header by lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|s| s.as_str())
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}
