//! Route and credential cache shared by all calls on one transporter.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use url::Url;

use super::credentials::{AuthScope, Credentials, CredentialsProvider};
use super::planner::RoutePlanner;
use super::{HostKey, Route};
use crate::classify::TransferError;

/// Server-side authentication for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// No credentials and none known to be needed; send anonymously.
    Anonymous,
    Provided(Credentials),
    /// Host requires authentication but the provider has nothing: the engine
    /// reports `AuthRequired` without sending the request.
    Missing,
}

/// Credentials to attach to a request on a given route.
#[derive(Debug, Clone)]
pub struct RouteAuth {
    pub server: AuthState,
    pub proxy: Option<Credentials>,
}

#[derive(Default)]
struct Caches {
    routes: HashMap<HostKey, Arc<Route>>,
    credentials: HashMap<AuthScope, Option<Credentials>>,
    /// Hosts that answered 401 during this transporter's lifetime.
    challenged: HashSet<HostKey>,
}

pub struct RouteManager {
    planner: RoutePlanner,
    provider: Arc<dyn CredentialsProvider>,
    /// Repository descriptor says anonymous access is refused.
    auth_hint: bool,
    caches: Mutex<Caches>,
}

impl RouteManager {
    pub fn new(planner: RoutePlanner, provider: Arc<dyn CredentialsProvider>, auth_hint: bool) -> Self {
        Self {
            planner,
            provider,
            auth_hint,
            caches: Mutex::new(Caches::default()),
        }
    }

    fn caches(&self) -> MutexGuard<'_, Caches> {
        self.caches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route for the host of `url`; planned once, then served from cache.
    pub fn resolve_route(&self, url: &Url) -> Result<Arc<Route>, TransferError> {
        let target = HostKey::from_url(url)
            .ok_or_else(|| TransferError::FatalProtocol(format!("URL has no host: {}", url)))?;
        let mut caches = self.caches();
        if let Some(route) = caches.routes.get(&target) {
            return Ok(Arc::clone(route));
        }
        let route = Arc::new(self.planner.plan(target.clone()));
        tracing::debug!(
            target = %route.target,
            proxy = route.proxy.as_ref().map(|p| p.url.as_str()).unwrap_or("direct"),
            "resolved route"
        );
        caches.routes.insert(target, Arc::clone(&route));
        Ok(route)
    }

    fn lookup(&self, caches: &mut Caches, scope: AuthScope) -> Option<Credentials> {
        caches
            .credentials
            .entry(scope)
            .or_insert_with_key(|scope| self.provider.credentials_for(scope))
            .clone()
    }

    /// Credentials for the target and (if proxied) the proxy of `route`.
    pub fn auth_for(&self, route: &Route) -> RouteAuth {
        let mut caches = self.caches();
        let host_scope = AuthScope::Host {
            host: route.target.host.clone(),
            port: route.target.port,
        };
        let server = match self.lookup(&mut caches, host_scope) {
            Some(c) => AuthState::Provided(c),
            None if self.auth_hint || caches.challenged.contains(&route.target) => AuthState::Missing,
            None => AuthState::Anonymous,
        };
        let proxy = route.proxy.as_ref().and_then(|p| {
            self.lookup(
                &mut caches,
                AuthScope::Proxy {
                    host: p.host.clone(),
                    port: p.port,
                },
            )
        });
        RouteAuth { server, proxy }
    }

    /// Remember that `target` answered 401, so later anonymous calls short-circuit.
    pub fn record_auth_challenge(&self, target: &HostKey) {
        self.caches().challenged.insert(target.clone());
    }

    /// Forget the route and credentials for `target`; next use re-resolves.
    pub fn invalidate_route(&self, target: &HostKey) {
        let mut caches = self.caches();
        if let Some(route) = caches.routes.remove(target) {
            tracing::debug!(target = %target, "route invalidated");
            caches.credentials.remove(&AuthScope::Host {
                host: route.target.host.clone(),
                port: route.target.port,
            });
            if let Some(p) = &route.proxy {
                caches.credentials.remove(&AuthScope::Proxy {
                    host: p.host.clone(),
                    port: p.port,
                });
            }
        }
    }

    /// Drop every cached route, credential and auth observation.
    pub fn clear(&self) {
        *self.caches() = Caches::default();
    }
}
