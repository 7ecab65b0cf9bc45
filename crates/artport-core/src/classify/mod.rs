//! Failure classification.
//!
//! Every abnormal outcome of peek/get/put, whether an HTTP status or a libcurl
//! error, is turned into a `TransferError` here, so the same policy applies
//! to all three operations. `TransferError::retry_kind` bridges to the
//! caller-side retry policy.

mod error;

pub use error::{TransferError, TransferOutcome, Transferred};

use crate::retry::ErrorKind;

/// Map a final HTTP status to success or a typed error.
///
/// `scope` names what a 401 applies to (usually the target host).
pub fn classify_status(status: u32, url: &str, scope: &str) -> Result<(), TransferError> {
    match status {
        200..=299 => Ok(()),
        404 | 410 => Err(TransferError::NotFound {
            url: url.to_string(),
            status,
        }),
        401 => Err(TransferError::AuthRequired {
            scope: scope.to_string(),
            status: Some(status),
        }),
        407 => Err(TransferError::AuthRequired {
            scope: "proxy".to_string(),
            status: Some(status),
        }),
        408 => Err(TransferError::transient(
            ErrorKind::Timeout,
            format!("HTTP 408 from {}", url),
        )),
        429 | 503 => Err(TransferError::transient(
            ErrorKind::Throttled,
            format!("HTTP {} from {}", status, url),
        )),
        500..=599 => Err(TransferError::transient(
            ErrorKind::Http5xx(status as u16),
            format!("HTTP {} from {}", status, url),
        )),
        300..=399 => Err(TransferError::FatalProtocol(format!(
            "unexpected redirect (HTTP {}) from {}",
            status, url
        ))),
        _ => Err(TransferError::FatalProtocol(format!(
            "HTTP {} from {}",
            status, url
        ))),
    }
}

/// Map a libcurl error. `cancelled` wins over everything else: an interrupted
/// socket surfaces as a recv/partial-file error, but the cause is the caller.
pub fn classify_curl_error(e: &curl::Error, cancelled: bool) -> TransferError {
    if cancelled || e.is_aborted_by_callback() {
        return TransferError::Cancelled { partial: None };
    }
    if e.is_operation_timedout() {
        return TransferError::transient(ErrorKind::Timeout, e.to_string());
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
        || e.is_ssl_connect_error()
        || e.is_http2_error()
    {
        return TransferError::transient(ErrorKind::Connection, e.to_string());
    }
    if e.is_too_many_redirects() {
        return TransferError::FatalProtocol(format!("redirect loop: {}", e));
    }
    TransferError::FatalProtocol(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://repo.example.com/a/b.jar";

    fn kind(r: Result<(), TransferError>) -> ErrorKind {
        r.unwrap_err().retry_kind()
    }

    #[test]
    fn success_statuses() {
        for s in [200, 201, 204, 206] {
            assert!(classify_status(s, URL, "repo.example.com").is_ok());
        }
    }

    #[test]
    fn not_found_statuses() {
        for s in [404, 410] {
            assert!(matches!(
                classify_status(s, URL, "h"),
                Err(TransferError::NotFound { status, .. }) if status == s
            ));
        }
    }

    #[test]
    fn auth_statuses() {
        match classify_status(401, URL, "repo.example.com") {
            Err(TransferError::AuthRequired { scope, .. }) => assert_eq!(scope, "repo.example.com"),
            other => panic!("expected AuthRequired, got {:?}", other),
        }
        match classify_status(407, URL, "repo.example.com") {
            Err(TransferError::AuthRequired { scope, .. }) => assert_eq!(scope, "proxy"),
            other => panic!("expected AuthRequired, got {:?}", other),
        }
    }

    #[test]
    fn transient_statuses() {
        assert_eq!(kind(classify_status(429, URL, "h")), ErrorKind::Throttled);
        assert_eq!(kind(classify_status(503, URL, "h")), ErrorKind::Throttled);
        assert_eq!(kind(classify_status(502, URL, "h")), ErrorKind::Http5xx(502));
        assert_eq!(kind(classify_status(408, URL, "h")), ErrorKind::Timeout);
        assert!(classify_status(500, URL, "h").unwrap_err().is_retryable());
    }

    #[test]
    fn fatal_statuses() {
        for s in [301, 400, 403, 405, 409, 422] {
            let e = classify_status(s, URL, "h").unwrap_err();
            assert!(matches!(e, TransferError::FatalProtocol(_)), "{}", s);
            assert!(!e.is_retryable());
        }
    }

    #[test]
    fn curl_errors() {
        let timeout = curl::Error::new(curl_sys::CURLE_OPERATION_TIMEDOUT);
        assert_eq!(
            classify_curl_error(&timeout, false).retry_kind(),
            ErrorKind::Timeout
        );
        let reset = curl::Error::new(curl_sys::CURLE_RECV_ERROR);
        assert_eq!(
            classify_curl_error(&reset, false).retry_kind(),
            ErrorKind::Connection
        );
        let dns = curl::Error::new(curl_sys::CURLE_COULDNT_RESOLVE_HOST);
        assert!(classify_curl_error(&dns, false).is_retryable());
        let loop_err = curl::Error::new(curl_sys::CURLE_TOO_MANY_REDIRECTS);
        assert!(matches!(
            classify_curl_error(&loop_err, false),
            TransferError::FatalProtocol(_)
        ));
        let unsupported = curl::Error::new(curl_sys::CURLE_UNSUPPORTED_PROTOCOL);
        assert!(matches!(
            classify_curl_error(&unsupported, false),
            TransferError::FatalProtocol(_)
        ));
    }

    #[test]
    fn cancellation_wins_over_io_error() {
        let reset = curl::Error::new(curl_sys::CURLE_RECV_ERROR);
        assert!(matches!(
            classify_curl_error(&reset, true),
            TransferError::Cancelled { .. }
        ));
        let aborted = curl::Error::new(curl_sys::CURLE_ABORTED_BY_CALLBACK);
        assert!(matches!(
            classify_curl_error(&aborted, false),
            TransferError::Cancelled { .. }
        ));
    }
}
