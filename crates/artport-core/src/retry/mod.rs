//! Caller-side retry and backoff.
//!
//! The transporter never retries transient failures itself; it reports them
//! as `TransferError::TransientIo` with an `ErrorKind`. Callers that want
//! retries (the CLI does) wrap operations in `run_with_retry`.

mod policy;
mod run;

pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
