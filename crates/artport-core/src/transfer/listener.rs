//! Progress notifications for one call.

/// Receives progress of a transfer. Called on the thread running the call.
pub trait TransferListener: Send + Sync {
    /// A body starts flowing. `offset` is where it lands in the artifact (non-zero
    /// for an accepted resume); `length` is the body length the server announced.
    /// Called again with offset 0 when a rejected resume restarts.
    fn transfer_started(&self, offset: u64, length: Option<u64>) {
        let _ = (offset, length);
    }

    /// Body bytes moved since the matching `transfer_started`. Monotonic.
    fn transfer_progressed(&self, transferred: u64) {
        let _ = transferred;
    }
}

/// Listener that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl TransferListener for NoopListener {}
