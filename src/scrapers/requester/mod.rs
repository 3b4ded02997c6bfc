//! Rate-limited, retrying HTTP requester.
//!
//! Spaces sends at `60s / rate_limit`, grows the spacing when the upstream
//! answers 429, and retries transient statuses and network failures up to
//! a fixed number of attempts per fetch.

mod config;
mod outcome;
mod pacing;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use reqwest::Method;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, error, warn};
use url::Url;

pub use config::{
    RequesterConfig, BACKOFF_STATUS, DEFAULT_BACKOFF_OFFSET, DEFAULT_MAX_INTERVAL,
    DEFAULT_MAX_RETRIES, DEFAULT_RATE_LIMIT, DEFAULT_RETRY_STATUSES, DEFAULT_TIMEOUT,
};
pub use outcome::{Attempt, FetchError, FetchResponse, RequesterError};
pub use pacing::{PacingState, PacingStats, Reservation};
pub use transport::{
    OutboundRequest, ReqwestTransport, RequestOptions, Transport, TransportError,
    TransportResponse, USER_AGENT,
};

/// Paced HTTP client. Clones share pacing state and transport.
#[derive(Clone)]
pub struct Requester {
    config: Arc<RequesterConfig>,
    transport: Arc<dyn Transport>,
    pacing: Arc<Mutex<PacingState>>,
    /// Held by the one caller waiting for the next slot.
    send_gate: Arc<Mutex<()>>,
    /// Wakes the waiting caller when a response moves `next_allowed`.
    pacing_changed: Arc<Notify>,
}

impl std::fmt::Debug for Requester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Requester")
            .field("config", &self.config)
            .field("transport", &"<transport>")
            .finish()
    }
}

impl Requester {
    /// Create a requester with a pooled reqwest transport.
    pub fn new(config: RequesterConfig) -> Result<Self, RequesterError> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config.user_agent)?;
        Ok(Self::build(config, Arc::new(transport)))
    }

    /// Create a requester over an injected transport.
    pub fn with_transport(
        config: RequesterConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, RequesterError> {
        config.validate()?;
        Ok(Self::build(config, transport))
    }

    fn build(config: RequesterConfig, transport: Arc<dyn Transport>) -> Self {
        let pacing = PacingState::new(&config, Instant::now());
        Self {
            config: Arc::new(config),
            transport,
            pacing: Arc::new(Mutex::new(pacing)),
            send_gate: Arc::new(Mutex::new(())),
            pacing_changed: Arc::new(Notify::new()),
        }
    }

    pub fn config(&self) -> &RequesterConfig {
        &self.config
    }

    /// Current pacing statistics.
    pub async fn stats(&self) -> PacingStats {
        self.pacing.lock().await.stats()
    }

    /// GET shorthand for [`fetch`](Self::fetch).
    pub async fn get(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<FetchResponse, FetchError> {
        self.fetch(Method::GET, url, options).await
    }

    /// Issue one logical request.
    ///
    /// Returns the first terminal response, or the last retryable response
    /// once the budget is spent. Fails with [`FetchError::NoResponse`] only
    /// when no attempt received a status code.
    pub async fn fetch(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<FetchResponse, FetchError> {
        let url = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        let request = OutboundRequest {
            method,
            url,
            options,
        };

        let max_retries = self.config.max_retries;
        let mut last_response = None;
        let mut last_error = None;

        for attempt in 1..=max_retries {
            let reservation = self.acquire_slot(&request).await;
            let result = self.transport.send(&request, self.config.timeout).await;

            match Attempt::classify(result, &self.config) {
                Attempt::Terminal(response) => {
                    self.record_response(reservation, false).await;
                    return Ok(FetchResponse::from_transport(response, attempt));
                }
                Attempt::Retryable { response, backoff } => {
                    let interval = self.record_response(reservation, backoff).await;
                    if backoff {
                        warn!(
                            "Rate limited by {} (HTTP {}), backing off to {:?}",
                            request.url, response.status, interval
                        );
                    } else {
                        debug!(
                            "Request to {} failed with HTTP {} (attempt {}/{}), retrying",
                            request.url, response.status, attempt, max_retries
                        );
                    }
                    last_response = Some(response);
                }
                Attempt::Failed(e) => {
                    error!(
                        "Request to {} failed (attempt {}/{}): {}",
                        request.url, attempt, max_retries, e
                    );
                    self.pacing.lock().await.record_failure(reservation);
                    self.pacing_changed.notify_waiters();
                    last_error = Some(e);
                }
            }
        }

        if let Some(response) = last_response {
            warn!(
                "Giving up on {} after {} attempts, last status {}",
                request.url, max_retries, response.status
            );
            return Ok(FetchResponse::from_transport(response, max_retries));
        }

        Err(FetchError::NoResponse {
            attempts: max_retries,
            last_error: last_error
                .unwrap_or_else(|| TransportError::Other("no attempt was made".to_string())),
        })
    }

    /// Wait for the next permitted send time and claim it.
    ///
    /// Callers queue on the send gate; the pacing lock is only taken to read
    /// and reserve, never across the sleep. The wait is recomputed whenever
    /// an in-flight response moves `next_allowed`.
    async fn acquire_slot(&self, request: &OutboundRequest) -> Reservation {
        let _gate = self.send_gate.lock().await;
        loop {
            let changed = self.pacing_changed.notified();
            let wait = {
                let mut pacing = self.pacing.lock().await;
                let now = Instant::now();
                let wait = pacing.time_until_ready(now);
                if wait.is_zero() {
                    return pacing.reserve(now);
                }
                wait
            };
            debug!("Pacing {} {}: waiting {:?}", request.method, request.url, wait);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = changed => {}
            }
        }
    }

    async fn record_response(
        &self,
        reservation: Reservation,
        backoff: bool,
    ) -> std::time::Duration {
        let interval = {
            let mut pacing = self.pacing.lock().await;
            pacing.record_response(reservation, backoff, Instant::now());
            pacing.current_interval()
        };
        self.pacing_changed.notify_waiters();
        interval
    }
}
