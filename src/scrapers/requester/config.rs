//! Construction options for the requester.

use std::time::Duration;

use super::outcome::RequesterError;
use super::transport::USER_AGENT;

/// Default requests allowed per minute.
pub const DEFAULT_RATE_LIMIT: u32 = 60;
/// Default attempts per logical fetch.
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// Default per-attempt network deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Statuses that consume an attempt and trigger a retry.
pub const DEFAULT_RETRY_STATUSES: [u16; 4] = [404, 408, 429, 500];
/// The overload signal that grows the pacing interval.
pub const BACKOFF_STATUS: u16 = 429;
/// Seconds added to the base interval before the first squaring.
pub const DEFAULT_BACKOFF_OFFSET: f64 = 1.0;
/// Default ceiling on the backed-off interval.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// Largest ceiling a caller may configure.
pub const MAX_INTERVAL_CEILING: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Window the rate limit is expressed over.
const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Configuration for a [`Requester`](super::Requester).
#[derive(Debug, Clone, PartialEq)]
pub struct RequesterConfig {
    /// Maximum requests per 60 seconds.
    pub rate_limit: u32,
    /// Attempts per fetch before giving up.
    pub max_retries: u32,
    /// Network deadline for each attempt.
    pub timeout: Duration,
    /// Statuses treated as transient. 429 is always retried regardless.
    pub retry_statuses: Vec<u16>,
    /// Additive kick-off (seconds) applied before the first squaring.
    /// Must be at least 1.0 so that squaring always lengthens the interval.
    pub backoff_offset: f64,
    /// Upper bound for the backed-off interval.
    pub max_interval: Duration,
    /// User agent sent by the default transport.
    pub user_agent: String,
}

impl Default for RequesterConfig {
    fn default() -> Self {
        Self {
            rate_limit: DEFAULT_RATE_LIMIT,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            retry_statuses: DEFAULT_RETRY_STATUSES.to_vec(),
            backoff_offset: DEFAULT_BACKOFF_OFFSET,
            max_interval: DEFAULT_MAX_INTERVAL,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl RequesterConfig {
    /// Config with a custom rate limit and defaults elsewhere.
    pub fn with_rate_limit(rate_limit: u32) -> Self {
        Self {
            rate_limit,
            ..Default::default()
        }
    }

    /// Minimum spacing between sends when not backing off.
    ///
    /// Returns zero for a zero rate limit; [`validate`](Self::validate) rejects that case.
    pub fn base_interval(&self) -> Duration {
        if self.rate_limit == 0 {
            return Duration::ZERO;
        }
        RATE_WINDOW / self.rate_limit
    }

    /// Whether a status should be retried.
    pub fn is_retry_status(&self, status: u16) -> bool {
        status == BACKOFF_STATUS || self.retry_statuses.contains(&status)
    }

    /// Check every option is in range.
    pub fn validate(&self) -> Result<(), RequesterError> {
        if self.rate_limit == 0 {
            return Err(RequesterError::InvalidConfig(
                "rate_limit must be greater than zero".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(RequesterError::InvalidConfig(
                "max_retries must be greater than zero".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(RequesterError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        if !self.backoff_offset.is_finite() || self.backoff_offset < 1.0 {
            return Err(RequesterError::InvalidConfig(format!(
                "backoff_offset must be a finite value >= 1.0, got {}",
                self.backoff_offset
            )));
        }
        // Backing off must leave the interval above base.
        if self.max_interval <= self.base_interval() || self.max_interval > MAX_INTERVAL_CEILING {
            return Err(RequesterError::InvalidConfig(format!(
                "max_interval must be above {:?} and at most {:?}, got {:?}",
                self.base_interval(),
                MAX_INTERVAL_CEILING,
                self.max_interval
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_interval_from_rate_limit() {
        assert_eq!(
            RequesterConfig::with_rate_limit(60).base_interval(),
            Duration::from_secs(1)
        );
        assert_eq!(
            RequesterConfig::with_rate_limit(120).base_interval(),
            Duration::from_millis(500)
        );
        assert_eq!(
            RequesterConfig::with_rate_limit(1).base_interval(),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_defaults_validate() {
        let config = RequesterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let zero_rate = RequesterConfig::with_rate_limit(0);
        assert!(zero_rate.validate().is_err());

        let zero_retries = RequesterConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert!(zero_retries.validate().is_err());

        let zero_timeout = RequesterConfig {
            timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero_timeout.validate().is_err());

        let small_offset = RequesterConfig {
            backoff_offset: 0.5,
            ..Default::default()
        };
        assert!(small_offset.validate().is_err());

        let tiny_ceiling = RequesterConfig {
            max_interval: Duration::from_millis(10),
            ..Default::default()
        };
        assert!(tiny_ceiling.validate().is_err());

        let huge_ceiling = RequesterConfig {
            max_interval: MAX_INTERVAL_CEILING + Duration::from_secs(1),
            ..Default::default()
        };
        assert!(huge_ceiling.validate().is_err());
    }

    #[test]
    fn test_ceiling_must_exceed_base_interval() {
        let at_base = RequesterConfig {
            rate_limit: 1,
            max_interval: Duration::from_secs(60),
            ..Default::default()
        };
        assert!(at_base.validate().is_err());

        let above_base = RequesterConfig {
            max_interval: Duration::from_secs(61),
            ..at_base
        };
        assert!(above_base.validate().is_ok());
    }

    #[test]
    fn test_retry_status_set() {
        let config = RequesterConfig {
            retry_statuses: vec![500],
            ..Default::default()
        };
        assert!(config.is_retry_status(500));
        assert!(config.is_retry_status(BACKOFF_STATUS));
        assert!(!config.is_retry_status(404));
        assert!(!config.is_retry_status(200));
    }
}
