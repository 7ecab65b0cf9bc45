//! Credentials supplied by the embedding application.

use std::collections::HashMap;
use std::fmt;

use crate::config::TransportConfig;

/// Principal and secret for one host or proxy. Never persisted by the transporter.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What a set of credentials is for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuthScope {
    Host { host: String, port: u16 },
    Proxy { host: String, port: u16 },
}

impl fmt::Display for AuthScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthScope::Host { host, port } => write!(f, "{}:{}", host, port),
            AuthScope::Proxy { host, port } => write!(f, "proxy {}:{}", host, port),
        }
    }
}

/// Source of credentials (credential store, settings file, ...).
pub trait CredentialsProvider: Send + Sync {
    fn credentials_for(&self, scope: &AuthScope) -> Option<Credentials>;
}

/// Provider that never has credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialsProvider for NoCredentials {
    fn credentials_for(&self, _scope: &AuthScope) -> Option<Credentials> {
        None
    }
}

/// Fixed credentials keyed by host name (any port), plus optional proxy credentials.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    hosts: HashMap<String, Credentials>,
    proxy: Option<Credentials>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: &str, credentials: Credentials) -> Self {
        self.hosts.insert(host.to_ascii_lowercase(), credentials);
        self
    }

    pub fn with_proxy(mut self, credentials: Credentials) -> Self {
        self.proxy = Some(credentials);
        self
    }

    /// `[[servers]]` entries and `[proxy]` username/password from config.
    pub fn from_config(cfg: &TransportConfig) -> Self {
        let mut creds = cfg.servers.iter().fold(Self::new(), |acc, s| {
            acc.with_host(&s.host, Credentials::new(&s.username, &s.password))
        });
        if let Some(proxy) = &cfg.proxy {
            if let Some(user) = &proxy.username {
                creds = creds.with_proxy(Credentials::new(
                    user,
                    proxy.password.clone().unwrap_or_default(),
                ));
            }
        }
        creds
    }
}

impl CredentialsProvider for StaticCredentials {
    fn credentials_for(&self, scope: &AuthScope) -> Option<Credentials> {
        match scope {
            AuthScope::Host { host, .. } => self.hosts.get(&host.to_ascii_lowercase()).cloned(),
            AuthScope::Proxy { .. } => self.proxy.clone(),
        }
    }
}
