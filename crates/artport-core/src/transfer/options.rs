//! Easy handle setup for one request.
//!
//! Every request starts from `reset()`, so nothing leaks from the previous
//! call on a reused connection except libcurl's live connections.

use std::time::Duration;

use curl::easy::{Auth, Easy2, List};
use url::Url;

use crate::classify::TransferError;
use crate::config::TransportConfig;
use crate::route::{AuthState, Route, RouteAuth};

use super::handler::TransferHandler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Method {
    Head,
    Get,
    Put { length: u64 },
    Mkcol,
    Options,
}

impl Method {
    fn follows_redirects(self) -> bool {
        matches!(self, Method::Head | Method::Get)
    }
}

pub(crate) struct RequestOptions<'a> {
    pub(crate) method: Method,
    pub(crate) url: &'a Url,
    pub(crate) route: &'a Route,
    pub(crate) auth: &'a RouteAuth,
    pub(crate) config: &'a TransportConfig,
    /// Request-specific header lines (`Range`, `If-Match`, ...).
    pub(crate) headers: Vec<String>,
}

pub(crate) fn configure(
    easy: &mut Easy2<TransferHandler>,
    opts: &RequestOptions<'_>,
) -> Result<(), TransferError> {
    apply(easy, opts)
        .map_err(|e| TransferError::FatalProtocol(format!("cannot configure request: {}", e)))
}

fn negotiate() -> Auth {
    let mut auth = Auth::new();
    auth.basic(true).digest(true);
    auth
}

fn apply(easy: &mut Easy2<TransferHandler>, opts: &RequestOptions<'_>) -> Result<(), curl::Error> {
    easy.reset();
    #[cfg(unix)]
    {
        let raw = easy.raw();
        crate::socket::install_close_hook(raw, easy.get_ref().sockets())?;
    }
    easy.url(opts.url.as_str())?;

    match opts.method {
        Method::Head => easy.nobody(true)?,
        Method::Get => easy.get(true)?,
        Method::Put { length } => {
            easy.upload(true)?;
            easy.in_filesize(length)?;
        }
        Method::Mkcol => easy.custom_request("MKCOL")?,
        Method::Options => easy.custom_request("OPTIONS")?,
    }
    if opts.method.follows_redirects() {
        easy.follow_location(true)?;
        easy.max_redirections(opts.config.max_redirects)?;
    } else {
        easy.follow_location(false)?;
    }

    let cfg = opts.config;
    easy.connect_timeout(cfg.connect_timeout())?;
    easy.low_speed_limit(1)?;
    easy.low_speed_time(cfg.read_timeout().max(Duration::from_secs(1)))?;
    easy.timeout(cfg.request_timeout())?;
    easy.useragent(&cfg.user_agent)?;
    easy.progress(true)?;

    match &opts.route.proxy {
        Some(proxy) => {
            easy.proxy(&proxy.url)?;
            if let Some(c) = &opts.auth.proxy {
                easy.proxy_auth(&negotiate())?;
                easy.proxy_username(&c.username)?;
                easy.proxy_password(c.password())?;
            }
        }
        // Keep libcurl from picking up *_proxy environment variables.
        None => easy.proxy("")?,
    }
    if let AuthState::Provided(c) = &opts.auth.server {
        easy.http_auth(&negotiate())?;
        easy.username(&c.username)?;
        easy.password(c.password())?;
    }

    let mut list = List::new();
    for (name, value) in &cfg.headers {
        list.append(&format!("{}: {}", name.trim(), value.trim()))?;
    }
    for line in &opts.headers {
        list.append(line)?;
    }
    if matches!(opts.method, Method::Put { .. }) {
        list.append("Expect:")?;
    }
    easy.http_headers(list)?;

    tracing::debug!(method = ?opts.method, url = %opts.url, "request");
    Ok(())
}
