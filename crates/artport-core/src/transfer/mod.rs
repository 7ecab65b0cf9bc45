//! Transfer engine: peek, get and put against one repository.
//!
//! An `HttpTransporter` owns its connection pool and route/credential caches.
//! It spawns no threads; calls run on the caller's thread and may run
//! concurrently from many threads. Each call takes one pooled connection for
//! each request it issues and gives it back (or drops it) before returning.

mod get;
mod handler;
mod listener;
mod options;
mod peek;
mod put;
mod request;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use url::Url;

use crate::cancel::CancelToken;
use crate::classify::{classify_curl_error, classify_status, TransferError};
use crate::config::TransportConfig;
use crate::pool::{ConnectionPool, PooledConnection};
use crate::resource::{RemoteResource, Repository};
use crate::route::{AuthState, CredentialsProvider, Route, RouteAuth, RouteManager, RoutePlanner};
use crate::validators::ResponseHead;

pub(crate) use handler::{Abort, BodyTarget};
pub use handler::{TransferHandler, UploadReader};
pub use listener::{NoopListener, TransferListener};
pub use request::{BodySource, TransferRequest};

use options::{configure, Method, RequestOptions};

/// How a performed request ended when libcurl itself did not fail.
pub(crate) enum Completion {
    /// The final response was received in full.
    Finished(ResponseHead),
    /// A callback stopped the transfer on purpose.
    Stopped(Abort, ResponseHead),
}

/// HTTP/HTTPS transporter bound to one repository.
pub struct HttpTransporter {
    repository: Repository,
    config: Arc<TransportConfig>,
    routes: RouteManager,
    pool: ConnectionPool,
    /// Outcome of the OPTIONS request for `webdav = "auto"`.
    dav_support: Mutex<Option<bool>>,
    closed: AtomicBool,
}

impl HttpTransporter {
    pub fn new(
        repository: Repository,
        config: Arc<TransportConfig>,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Result<Self, TransferError> {
        let planner = RoutePlanner::from_config(config.proxy.as_ref())?;
        let routes = RouteManager::new(planner, credentials, repository.auth_required);
        let pool = ConnectionPool::new(config.max_idle_per_route);
        tracing::debug!(repository = %repository.id, url = %repository.base_url(), "transporter created");
        Ok(Self {
            repository,
            config,
            routes,
            pool,
            dav_support: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Release pooled connections and cached routes/credentials. Idempotent;
    /// later calls fail with a protocol error.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pool.close();
        self.routes.clear();
        tracing::debug!(repository = %self.repository.id, "transporter closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Idle pooled connections; exposed for diagnostics.
    pub fn idle_connections(&self) -> usize {
        self.pool.idle_count()
    }

    fn ensure_open(&self, cancel: &CancelToken) -> Result<(), TransferError> {
        if self.is_closed() {
            return Err(TransferError::FatalProtocol("transporter closed".into()));
        }
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled { partial: None });
        }
        Ok(())
    }

    fn url_for(&self, path: &str) -> Result<Url, TransferError> {
        self.repository.url_for(path).map_err(|e| {
            TransferError::FatalProtocol(format!("cannot build URL for {}: {}", path, e))
        })
    }

    fn resource_url(&self, resource: &RemoteResource) -> Result<Url, TransferError> {
        self.url_for(resource.path())
    }

    /// Route and credentials for `url`, or `AuthRequired` without touching the
    /// network when the host needs credentials nobody provided.
    fn prepare(&self, url: &Url) -> Result<(Arc<Route>, RouteAuth), TransferError> {
        let route = self.routes.resolve_route(url)?;
        let auth = self.routes.auth_for(&route);
        if auth.server == AuthState::Missing {
            tracing::debug!(target = %route.target, "no credentials for host that requires them");
            return Err(TransferError::AuthRequired {
                scope: route.target.to_string(),
                status: None,
            });
        }
        Ok((route, auth))
    }

    fn options<'a>(
        &'a self,
        method: Method,
        url: &'a Url,
        route: &'a Route,
        auth: &'a RouteAuth,
        headers: Vec<String>,
    ) -> RequestOptions<'a> {
        RequestOptions {
            method,
            url,
            route,
            auth,
            config: &self.config,
            headers,
        }
    }

    /// Run the configured request on `conn` with the call's cancel token bound
    /// to the connection's sockets.
    fn perform(
        &self,
        conn: &mut PooledConnection<'_>,
        cancel: &CancelToken,
    ) -> Result<Completion, TransferError> {
        let result = {
            let sockets = Arc::clone(conn.easy().get_ref().sockets());
            let _binding = cancel.bind(sockets);
            conn.easy().perform()
        };
        let head = conn.easy().get_ref().response_head();
        let abort = conn.easy().get_mut().take_abort();
        match result {
            Ok(()) => {
                conn.mark_reusable();
                Ok(Completion::Finished(head))
            }
            Err(e) => {
                conn.mark_broken();
                if cancel.is_cancelled() {
                    return Err(TransferError::Cancelled { partial: None });
                }
                match abort {
                    Some(Abort::Local(io)) => Err(TransferError::LocalIo(io)),
                    Some(abort) => Ok(Completion::Stopped(abort, head)),
                    None => {
                        if e.is_couldnt_connect()
                            || e.is_couldnt_resolve_host()
                            || e.is_couldnt_resolve_proxy()
                        {
                            self.routes.invalidate_route(&conn.route().target);
                        }
                        let err = classify_curl_error(&e, false);
                        tracing::debug!(target = %conn.route().target, "request failed: {}", err);
                        Err(err)
                    }
                }
            }
        }
    }

    /// Turn a final status into success or a typed error, remembering 401s.
    fn check_status(&self, head: &ResponseHead, url: &Url, route: &Route) -> Result<u32, TransferError> {
        let status = head
            .status
            .ok_or_else(|| TransferError::FatalProtocol(format!("no status line from {}", url)))?;
        if status == 401 {
            self.routes.record_auth_challenge(&route.target);
        }
        classify_status(status, url.as_str(), &route.target.to_string())?;
        Ok(status)
    }

    /// Issue a bodyless request and return the final response head.
    fn simple_request(
        &self,
        method: Method,
        url: &Url,
        request: &TransferRequest,
    ) -> Result<ResponseHead, TransferError> {
        let (route, auth) = self.prepare(url)?;
        let mut conn = self.pool.acquire(&route)?;
        configure(conn.easy(), &self.options(method, url, &route, &auth, Vec::new()))?;
        conn.easy().get_mut().begin(
            request.cancel_token(),
            request.listener(),
            BodyTarget::Discard,
            None,
        );
        match self.perform(&mut conn, request.cancel_token())? {
            Completion::Finished(head) => Ok(head),
            Completion::Stopped(abort, _) => Err(unexpected_abort(abort)),
        }
    }
}

impl Drop for HttpTransporter {
    fn drop(&mut self) {
        self.close();
    }
}

fn unexpected_abort(abort: Abort) -> TransferError {
    match abort {
        Abort::Local(e) => TransferError::LocalIo(e),
        Abort::UnexpectedPartial => {
            TransferError::FatalProtocol("partial content to a request without a range".into())
        }
        Abort::ResumeRejected(reason) => TransferError::FatalProtocol(reason),
        Abort::HeadersComplete => TransferError::FatalProtocol("transfer stopped early".into()),
    }
}
