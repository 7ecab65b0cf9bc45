//! Proxy selection.

use url::Url;

use super::{HostKey, Route};
use crate::classify::TransferError;
use crate::config::ProxyConfig;

/// Proxy a route goes through.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyEndpoint {
    /// Full proxy URL handed to libcurl, e.g. `http://proxy:3128`.
    pub url: String,
    pub host: String,
    pub port: u16,
}

/// Decides per target host whether the configured proxy applies.
#[derive(Debug, Clone, Default)]
pub struct RoutePlanner {
    proxy: Option<(ProxyEndpoint, Vec<String>)>,
}

impl RoutePlanner {
    pub fn direct() -> Self {
        Self::default()
    }

    pub fn from_config(proxy: Option<&ProxyConfig>) -> Result<Self, TransferError> {
        let Some(cfg) = proxy else {
            return Ok(Self::direct());
        };
        let parsed = Url::parse(&cfg.url).map_err(|e| {
            TransferError::FatalProtocol(format!("invalid proxy URL {}: {}", cfg.url, e))
        })?;
        let host = parsed
            .host_str()
            .ok_or_else(|| TransferError::FatalProtocol(format!("proxy URL without host: {}", cfg.url)))?
            .to_ascii_lowercase();
        let port = parsed.port_or_known_default().unwrap_or(8080);
        // Entries may themselves be `|`-separated lists.
        let patterns = cfg
            .non_proxy_hosts
            .iter()
            .flat_map(|p| p.split('|'))
            .map(|p| p.trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Ok(Self {
            proxy: Some((
                ProxyEndpoint {
                    url: cfg.url.clone(),
                    host,
                    port,
                },
                patterns,
            )),
        })
    }

    pub fn plan(&self, target: HostKey) -> Route {
        let mut route = Route::direct(target);
        if let Some((endpoint, patterns)) = &self.proxy {
            let bypass = patterns
                .iter()
                .any(|p| matches_host_pattern(p, &route.target.host));
            if !bypass {
                route.proxy = Some(endpoint.clone());
            }
        }
        route
    }
}

/// Case-insensitive match where `*` stands for any run of characters.
pub fn matches_host_pattern(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == host;
    }
    let mut rest = host.as_str();
    let first = parts[0];
    if !rest.starts_with(first) {
        return false;
    }
    rest = &rest[first.len()..];
    let last = parts[parts.len() - 1];
    for mid in &parts[1..parts.len() - 1] {
        match rest.find(mid) {
            Some(i) => rest = &rest[i + mid.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}
