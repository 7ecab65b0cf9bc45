//! Route resolution and credentials.
//!
//! A `Route` is the network path to a repository host: direct, or through the
//! configured proxy. Routes and credentials are resolved at most once per
//! host (and proxy) for a transporter's lifetime and cached in the
//! `RouteManager` until invalidated.

mod credentials;
mod key;
mod manager;
mod planner;

pub use credentials::{AuthScope, Credentials, CredentialsProvider, NoCredentials, StaticCredentials};
pub use key::HostKey;
pub use manager::{AuthState, RouteAuth, RouteManager};
pub use planner::{matches_host_pattern, ProxyEndpoint, RoutePlanner};

/// Resolved network path for one target host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    pub target: HostKey,
    pub proxy: Option<ProxyEndpoint>,
    /// Target spoken over TLS (`https`).
    pub tls: bool,
}

impl Route {
    pub fn direct(target: HostKey) -> Self {
        let tls = target.scheme == "https";
        Self {
            target,
            proxy: None,
            tls,
        }
    }

    pub fn is_direct(&self) -> bool {
        self.proxy.is_none()
    }
}
