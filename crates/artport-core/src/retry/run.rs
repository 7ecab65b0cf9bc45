//! Retry loop: run a transfer until success or the policy says stop.

use std::time::Duration;

use super::policy::{RetryDecision, RetryPolicy};
use crate::classify::TransferError;

/// Runs `f` until it succeeds or the retry policy says to stop.
///
/// `f` receives the error of the previous attempt (None on the first), so a
/// download can pick up the resume token a failed attempt left behind.
/// `sleep` is injected so callers (and tests) control how backoff waits.
pub fn run_with_retry<T, F, S>(policy: &RetryPolicy, mut f: F, mut sleep: S) -> Result<T, TransferError>
where
    F: FnMut(Option<&TransferError>) -> Result<T, TransferError>,
    S: FnMut(Duration),
{
    let mut attempt = 1u32;
    let mut last: Option<TransferError> = None;
    loop {
        match f(last.as_ref()) {
            Ok(v) => return Ok(v),
            Err(e) => match policy.decide(attempt, e.retry_kind()) {
                RetryDecision::NoRetry => return Err(e),
                RetryDecision::RetryAfter(d) => {
                    tracing::info!(attempt, delay_ms = d.as_millis() as u64, "retrying after: {}", e);
                    sleep(d);
                    attempt += 1;
                    last = Some(e);
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::ErrorKind;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn transient_errors_are_retried_until_success() {
        let mut calls = 0;
        let mut slept = Vec::new();
        let r = run_with_retry(
            &policy(5),
            |prev| {
                calls += 1;
                if calls < 3 {
                    assert_eq!(prev.is_some(), calls > 1);
                    Err(TransferError::transient(ErrorKind::Connection, "reset"))
                } else {
                    Ok(calls)
                }
            },
            |d| slept.push(d),
        );
        assert_eq!(r.unwrap(), 3);
        assert_eq!(slept.len(), 2);
        assert!(slept[1] >= slept[0]);
    }

    #[test]
    fn fatal_errors_are_not_retried() {
        let mut calls = 0;
        let r: Result<(), _> = run_with_retry(
            &policy(5),
            |_| {
                calls += 1;
                Err(TransferError::NotFound {
                    url: "http://x/y".into(),
                    status: 404,
                })
            },
            |_| panic!("must not sleep"),
        );
        assert!(matches!(r, Err(TransferError::NotFound { .. })));
        assert_eq!(calls, 1);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut calls = 0;
        let r: Result<(), _> = run_with_retry(
            &policy(3),
            |_| {
                calls += 1;
                Err(TransferError::transient(ErrorKind::Http5xx(502), "bad gateway"))
            },
            |_| {},
        );
        assert!(r.unwrap_err().is_retryable());
        assert_eq!(calls, 3);
    }
}
