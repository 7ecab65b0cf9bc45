use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Retry policy parameters for callers (optional section in config.toml).
/// The transporter itself never retries; the CLI feeds this into `RetryPolicy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per transfer (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

/// What to do when a downloaded body does not match the expected checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumPolicy {
    #[default]
    Fail,
    Warn,
    Ignore,
}

/// Whether uploads may create missing parent collections with MKCOL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebDavPolicy {
    /// Ask the server once with OPTIONS and look for a `DAV` header.
    #[default]
    Auto,
    Always,
    Never,
}

/// Proxy used for every host not matched by `non_proxy_hosts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// e.g. `http://proxy.internal:3128`
    pub url: String,
    /// Host patterns that bypass the proxy; `*` matches any run of characters.
    #[serde(default)]
    pub non_proxy_hosts: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Static credentials for one repository host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCredentials {
    pub host: String,
    pub username: String,
    pub password: String,
}

/// Transport configuration loaded from `~/.config/artport/config.toml`.
///
/// Built once and shared (`Arc`) by every transporter created from it; there is
/// no mutation after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    pub connect_timeout_secs: u64,
    /// Abort when no bytes move for this long (low-speed limit of 1 byte/s).
    pub read_timeout_secs: u64,
    /// Hard cap on a single request, including body transfer.
    pub request_timeout_secs: u64,
    /// Redirects followed for GET/HEAD. PUT never follows redirects.
    pub max_redirects: u32,
    /// Idle connections kept per route.
    pub max_idle_per_route: usize,
    pub user_agent: String,
    #[serde(default)]
    pub checksum_policy: ChecksumPolicy,
    #[serde(default)]
    pub webdav: WebDavPolicy,
    /// Status codes that mean "parent collection missing" on PUT.
    #[serde(default = "default_parent_missing_statuses")]
    pub parent_missing_statuses: Vec<u32>,
    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub servers: Vec<ServerCredentials>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

fn default_parent_missing_statuses() -> Vec<u32> {
    vec![409]
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            read_timeout_secs: 60,
            request_timeout_secs: 3600,
            max_redirects: 3,
            max_idle_per_route: 4,
            user_agent: format!("artport/{}", env!("CARGO_PKG_VERSION")),
            checksum_policy: ChecksumPolicy::Fail,
            webdav: WebDavPolicy::Auto,
            parent_missing_statuses: default_parent_missing_statuses(),
            headers: BTreeMap::new(),
            proxy: None,
            servers: Vec::new(),
            retry: None,
        }
    }
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("artport")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TransportConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = TransportConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml).with_context(|| format!("write {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data =
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let cfg: TransportConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}
