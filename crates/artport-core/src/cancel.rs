//! Cooperative cancellation for in-flight transfers.
//!
//! Each `TransferRequest` carries a `CancelToken`. While a call is running, the
//! engine binds the socket set of its pooled connection to the token;
//! `cancel()` flips the flag and interrupts exactly those sockets, which
//! unblocks a thread parked in connect/read. Other calls' connections are
//! never bound to the token and are untouched.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::socket::SocketSet;

#[derive(Default)]
struct TokenInner {
    cancelled: AtomicBool,
    bound: Mutex<Vec<Arc<SocketSet>>>,
}

/// Cloneable handle; all clones observe the same cancellation.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent; safe to call from any thread.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let bound = self
            .inner
            .bound
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for set in bound.iter() {
            set.interrupt();
        }
        tracing::debug!(connections = bound.len(), "cancel requested");
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Attach a connection's sockets for the duration of one call.
    /// If the token is already cancelled, the set is interrupted immediately.
    pub(crate) fn bind(&self, set: Arc<SocketSet>) -> Binding {
        {
            let mut bound = self
                .inner
                .bound
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            bound.push(Arc::clone(&set));
        }
        // Checked after registering so a concurrent cancel() cannot slip between.
        if self.is_cancelled() {
            set.interrupt();
        }
        Binding {
            token: self.clone(),
            set,
        }
    }
}

/// Unbinds the socket set when the call finishes.
pub(crate) struct Binding {
    token: CancelToken,
    set: Arc<SocketSet>,
}

impl Drop for Binding {
    fn drop(&mut self) {
        let mut bound = self
            .token
            .inner
            .bound
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = bound.iter().position(|s| Arc::ptr_eq(s, &self.set)) {
            bound.swap_remove(pos);
        }
    }
}
