//! Per-connection registry of live sockets.

use std::sync::{Mutex, MutexGuard, PoisonError};

#[cfg(unix)]
pub(crate) type RawSocket = std::os::unix::io::RawFd;
#[cfg(not(unix))]
pub(crate) type RawSocket = u64;

#[derive(Debug, Default)]
pub(crate) struct SetState {
    pub(crate) live: Vec<RawSocket>,
    pub(crate) interrupted: bool,
}

/// Sockets currently open for one pooled connection.
///
/// Opening, closing and interrupting all happen under the same lock, so an
/// interrupt never reaches a descriptor that was already closed (and possibly
/// reused by another connection).
#[derive(Debug, Default)]
pub struct SocketSet {
    state: Mutex<SetState>,
}

impl SocketSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shut down every live socket and refuse new ones. A connection whose set
    /// was interrupted must not go back to the pool.
    pub fn interrupt(&self) {
        let mut state = self.lock();
        state.interrupted = true;
        #[cfg(unix)]
        for fd in &state.live {
            // SAFETY: fd is registered only while open; close removes it under this lock.
            unsafe {
                libc::shutdown(*fd, libc::SHUT_RDWR);
            }
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.lock().interrupted
    }

    /// Number of sockets currently open through this set.
    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }
}
