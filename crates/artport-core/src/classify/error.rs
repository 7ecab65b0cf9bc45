//! Typed transfer outcome.

use thiserror::Error;

use crate::checksum::ChecksumAlgorithm;
use crate::resume::ResumeToken;
use crate::retry::ErrorKind;
use crate::validators::Validators;

/// Successful peek/get/put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transferred {
    /// Body bytes moved by this call (0 for peek; remaining bytes for a resume).
    pub bytes: u64,
    /// Final validator snapshot reported by the server.
    pub validators: Validators,
    /// Offset the body was written from (non-zero only for an accepted resume).
    pub resumed_from: u64,
    /// Hex digest of the full artifact when a checksum was requested.
    pub digest: Option<String>,
}

/// Result of every transporter operation.
pub type TransferOutcome = Result<Transferred, TransferError>;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("resource not found: {url} (HTTP {status})")]
    NotFound { url: String, status: u32 },

    #[error("authentication required for {scope}")]
    AuthRequired { scope: String, status: Option<u32> },

    #[error("{algorithm} checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        algorithm: ChecksumAlgorithm,
        expected: String,
        actual: String,
    },

    #[error("transfer cancelled")]
    Cancelled { partial: Option<ResumeToken> },

    #[error("transient I/O failure: {reason}")]
    TransientIo {
        kind: ErrorKind,
        reason: String,
        partial: Option<ResumeToken>,
    },

    #[error("protocol error: {0}")]
    FatalProtocol(String),

    #[error("local I/O failed: {0}")]
    LocalIo(#[source] std::io::Error),
}

impl TransferError {
    pub(crate) fn transient(kind: ErrorKind, reason: impl Into<String>) -> Self {
        TransferError::TransientIo {
            kind,
            reason: reason.into(),
            partial: None,
        }
    }

    /// Kind for the caller's retry policy; only `TransientIo` is retryable.
    pub fn retry_kind(&self) -> ErrorKind {
        match self {
            TransferError::TransientIo { kind, .. } => *kind,
            _ => ErrorKind::Other,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retry_kind() != ErrorKind::Other
    }

    /// Token to continue an interrupted download, if bytes were kept.
    pub fn resume_token(&self) -> Option<&ResumeToken> {
        match self {
            TransferError::Cancelled { partial } | TransferError::TransientIo { partial, .. } => {
                partial.as_ref()
            }
            _ => None,
        }
    }

    /// Attach a resume token to a cancelled or transient failure.
    pub(crate) fn with_partial(self, token: Option<ResumeToken>) -> Self {
        match self {
            TransferError::Cancelled { .. } => TransferError::Cancelled { partial: token },
            TransferError::TransientIo { kind, reason, .. } => TransferError::TransientIo {
                kind,
                reason,
                partial: token,
            },
            other => other,
        }
    }
}

impl From<std::io::Error> for TransferError {
    fn from(e: std::io::Error) -> Self {
        TransferError::LocalIo(e)
    }
}
