//! Pacing state shared by every caller of one requester.

use std::time::Duration;

use tokio::time::Instant;

use super::config::RequesterConfig;

/// A send slot claimed before the network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    /// When the slot opened (the send time).
    pub start: Instant,
    /// `next_allowed` as left by this reservation.
    pub end: Instant,
}

/// Snapshot of pacing state for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct PacingStats {
    pub base_interval: Duration,
    pub current_interval: Duration,
    pub in_backoff: bool,
    pub total_attempts: u64,
    pub backoff_hits: u64,
    pub transport_failures: u64,
}

/// Interval and next-send bookkeeping.
///
/// Steady while `current_interval == base_interval`, backing off otherwise.
#[derive(Debug, Clone)]
pub struct PacingState {
    base_interval: Duration,
    current_interval: Duration,
    next_allowed: Instant,
    in_backoff: bool,
    backoff_offset: f64,
    max_interval: Duration,
    total_attempts: u64,
    backoff_hits: u64,
    transport_failures: u64,
}

impl PacingState {
    pub fn new(config: &RequesterConfig, now: Instant) -> Self {
        let base_interval = config.base_interval();
        Self {
            base_interval,
            current_interval: base_interval,
            next_allowed: now,
            in_backoff: false,
            backoff_offset: config.backoff_offset,
            max_interval: config.max_interval,
            total_attempts: 0,
            backoff_hits: 0,
            transport_failures: 0,
        }
    }

    pub fn base_interval(&self) -> Duration {
        self.base_interval
    }

    pub fn current_interval(&self) -> Duration {
        self.current_interval
    }

    pub fn next_allowed(&self) -> Instant {
        self.next_allowed
    }

    pub fn in_backoff(&self) -> bool {
        self.in_backoff
    }

    /// Time until the next send is permitted.
    pub fn time_until_ready(&self, now: Instant) -> Duration {
        self.next_allowed.saturating_duration_since(now)
    }

    /// Claim the next slot so concurrent callers queue behind this send.
    pub fn reserve(&mut self, now: Instant) -> Reservation {
        let start = self.next_allowed.max(now);
        self.next_allowed = start + self.current_interval;
        self.total_attempts += 1;
        Reservation {
            start,
            end: self.next_allowed,
        }
    }

    /// Apply a received status to the interval and push `next_allowed` forward.
    ///
    /// If nobody reserved after us the provisional slot is replaced, so a
    /// lone caller is paced from the response time. Otherwise later
    /// reservations are kept and only pushed out if the interval grew.
    pub fn record_response(&mut self, reservation: Reservation, backoff: bool, now: Instant) {
        if backoff {
            self.grow();
        } else {
            self.reset();
        }

        self.next_allowed = if self.next_allowed == reservation.end {
            reservation.start.max(now) + self.current_interval
        } else {
            self.next_allowed.max(now + self.current_interval)
        };
    }

    /// Release the slot of an attempt that got no status code.
    pub fn record_failure(&mut self, reservation: Reservation) {
        self.transport_failures += 1;
        if self.next_allowed == reservation.end {
            self.next_allowed = reservation.start;
        }
    }

    /// Additive kick-off from steady, squaring once already backing off.
    fn grow(&mut self) {
        let secs = if self.in_backoff {
            self.current_interval.as_secs_f64().powi(2)
        } else {
            (self.base_interval.as_secs_f64() + self.backoff_offset).powi(2)
        };
        self.current_interval = Duration::try_from_secs_f64(secs)
            .map(|d| d.min(self.max_interval))
            .unwrap_or(self.max_interval);
        self.in_backoff = true;
        self.backoff_hits += 1;
    }

    fn reset(&mut self) {
        self.current_interval = self.base_interval;
        self.in_backoff = false;
    }

    pub fn stats(&self) -> PacingStats {
        PacingStats {
            base_interval: self.base_interval,
            current_interval: self.current_interval,
            in_backoff: self.in_backoff,
            total_attempts: self.total_attempts,
            backoff_hits: self.backoff_hits,
            transport_failures: self.transport_failures,
        }
    }
}
