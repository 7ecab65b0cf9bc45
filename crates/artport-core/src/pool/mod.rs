//! Connection pool.
//!
//! A connection is a libcurl easy handle together with its socket set; libcurl
//! keeps the TCP/TLS connections alive inside the handle between calls. Idle
//! handles are kept per route. A call owns its handle exclusively until the
//! `PooledConnection` guard drops, which returns it only if the transfer ended
//! cleanly and its sockets were never interrupted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use curl::easy::Easy2;

use crate::classify::TransferError;
use crate::route::Route;
use crate::transfer::TransferHandler;

#[derive(Default)]
struct PoolState {
    idle: HashMap<Arc<Route>, Vec<Easy2<TransferHandler>>>,
    closed: bool,
}

pub struct ConnectionPool {
    state: Mutex<PoolState>,
    max_idle_per_route: usize,
    created: AtomicUsize,
}

impl ConnectionPool {
    pub fn new(max_idle_per_route: usize) -> Self {
        Self {
            state: Mutex::new(PoolState::default()),
            max_idle_per_route,
            created: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take an idle connection for `route` or open a new one.
    pub fn acquire(&self, route: &Arc<Route>) -> Result<PooledConnection<'_>, TransferError> {
        let reused = {
            let mut state = self.state();
            if state.closed {
                return Err(TransferError::FatalProtocol("transporter closed".into()));
            }
            state.idle.get_mut(route).and_then(Vec::pop)
        };
        let easy = match reused {
            Some(easy) => easy,
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                Easy2::new(TransferHandler::new())
            }
        };
        Ok(PooledConnection {
            pool: self,
            route: Arc::clone(route),
            easy: Some(easy),
            reusable: false,
        })
    }

    fn release(&self, route: Arc<Route>, easy: Easy2<TransferHandler>) {
        let mut state = self.state();
        if state.closed {
            return;
        }
        let slot = state.idle.entry(route).or_default();
        if slot.len() < self.max_idle_per_route {
            slot.push(easy);
        }
    }

    /// Drop all idle connections and refuse new acquisitions. Idempotent.
    pub fn close(&self) {
        let idle = {
            let mut state = self.state();
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        let count: usize = idle.values().map(Vec::len).sum();
        drop(idle);
        tracing::debug!(released = count, "connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Idle connections currently pooled across all routes.
    pub fn idle_count(&self) -> usize {
        self.state().idle.values().map(Vec::len).sum()
    }

    /// Connections opened over the pool's lifetime.
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}

/// Exclusive use of one connection for one call.
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    route: Arc<Route>,
    easy: Option<Easy2<TransferHandler>>,
    reusable: bool,
}

impl PooledConnection<'_> {
    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub(crate) fn easy(&mut self) -> &mut Easy2<TransferHandler> {
        // Only taken in Drop.
        self.easy.as_mut().unwrap_or_else(|| unreachable!("connection used after release"))
    }

    /// The last transfer completed at the HTTP level; the connection may be reused.
    pub(crate) fn mark_reusable(&mut self) {
        self.reusable = true;
    }

    /// The last transfer ended in a transport error; do not pool it.
    pub(crate) fn mark_broken(&mut self) {
        self.reusable = false;
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        let Some(mut easy) = self.easy.take() else {
            return;
        };
        let interrupted = easy.get_ref().sockets().is_interrupted();
        easy.get_mut().finish_call();
        if self.reusable && !interrupted {
            self.pool.release(Arc::clone(&self.route), easy);
        } else {
            tracing::debug!(
                target = %self.route.target,
                interrupted,
                "dropping connection instead of pooling it"
            );
        }
    }
}
