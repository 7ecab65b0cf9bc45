//! Repository descriptors and logical resource paths.
//!
//! A `RemoteResource` is always relative to a `Repository` base URL. Paths are
//! validated once, at construction, so the transfer engine never has to deal
//! with a path that would escape the repository.

use std::fmt;
use thiserror::Error;
use url::Url;

/// Rejected resource path. Programmer error: surfaces before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidResource {
    #[error("resource path is empty")]
    Empty,
    #[error("resource path must be relative: {0}")]
    Absolute(String),
    #[error("resource path contains a parent segment: {0}")]
    ParentSegment(String),
    #[error("resource path contains an illegal character: {0:?}")]
    IllegalCharacter(String),
}

/// Logical path of an artifact relative to the repository base URL,
/// e.g. `org/example/lib/1.0/lib-1.0.jar`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteResource {
    path: String,
}

impl RemoteResource {
    pub fn new(path: impl Into<String>) -> Result<Self, InvalidResource> {
        let path = path.into();
        if path.is_empty() {
            return Err(InvalidResource::Empty);
        }
        if path.starts_with('/') || path.contains("://") {
            return Err(InvalidResource::Absolute(path));
        }
        if path
            .chars()
            .any(|c| matches!(c, '\\' | '?' | '#') || c.is_control())
        {
            return Err(InvalidResource::IllegalCharacter(path));
        }
        if path.split('/').any(is_dot_segment) {
            return Err(InvalidResource::ParentSegment(path));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Parent collections from the top down, each with a trailing slash:
    /// `a/b/c.jar` yields `["a/", "a/b/"]`.
    pub fn parent_collections(&self) -> Vec<String> {
        let trimmed = self.path.trim_end_matches('/');
        let mut out = Vec::new();
        let mut acc = String::new();
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
        for seg in segments.iter().take(segments.len().saturating_sub(1)) {
            acc.push_str(seg);
            acc.push('/');
            out.push(acc.clone());
        }
        out
    }
}

/// `.` or `..`, also in the percent-encoded spellings URL joining resolves.
fn is_dot_segment(seg: &str) -> bool {
    let decoded = seg.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}

impl fmt::Display for RemoteResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Remote repository a transporter is bound to.
#[derive(Debug, Clone)]
pub struct Repository {
    pub id: String,
    base_url: Url,
    /// Hint that the server rejects anonymous requests. Lets the engine report
    /// `AuthRequired` without a round trip when no credentials are configured.
    pub auth_required: bool,
}

impl Repository {
    /// Base URLs are normalised to end with `/` so resource paths join below them.
    pub fn new(id: impl Into<String>, base_url: &str) -> Result<Self, url::ParseError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let p = format!("{}/", base_url.path());
            base_url.set_path(&p);
        }
        Ok(Self {
            id: id.into(),
            base_url,
            auth_required: false,
        })
    }

    pub fn with_auth_required(mut self, required: bool) -> Self {
        self.auth_required = required;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL of a resource (or collection path) under this repository.
    pub fn url_for(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }
}
