use std::fmt;

use url::Url;

/// `(scheme, host, port)` of a URL. Different paths on the same origin share
/// routes, pooled connections and credentials.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostKey {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl HostKey {
    /// Returns None for URLs without a host or a known default port.
    pub fn from_url(url: &Url) -> Option<Self> {
        Some(Self {
            scheme: url.scheme().to_string(),
            host: url.host_str()?.to_ascii_lowercase(),
            port: url.port_or_known_default()?,
        })
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}
