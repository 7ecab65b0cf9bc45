use std::time::Duration;

use crate::config::RetryConfig;

/// Why a transfer failed, as far as retrying is concerned. Produced by
/// `TransferError::retry_kind`; only `TransientIo` maps to anything but `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connect or read-idle timeout, or HTTP 408.
    Timeout,
    /// 429, or 503 from a repository shedding load.
    Throttled,
    /// Reset, refused or short connection; DNS or proxy lookup failure.
    Connection,
    /// Any other 5xx from the repository.
    Http5xx(u16),
    /// Not worth retrying: missing artifact, auth, checksum, protocol, local I/O.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    RetryAfter(Duration),
}

/// Attempt cap plus doubling backoff bounded by `max_delay`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per transfer, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

/// Longest base delay accepted from configuration.
const MAX_BASE_DELAY_SECS: f64 = 3600.0;

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        // NaN and negatives become 0; infinity is capped.
        let base = if cfg.base_delay_secs.is_nan() {
            0.0
        } else {
            cfg.base_delay_secs.clamp(0.0, MAX_BASE_DELAY_SECS)
        };
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(base),
            max_delay: Duration::from_secs(cfg.max_delay_secs),
        }
    }
}

impl RetryPolicy {
    /// Decide after failed `attempt` (1-based) of kind `kind`.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts || kind == ErrorKind::Other {
            return RetryDecision::NoRetry;
        }
        let factor = 1u32 << attempt.saturating_sub(1).min(8);
        RetryDecision::RetryAfter(self.base_delay.saturating_mul(factor).min(self.max_delay))
    }
}
