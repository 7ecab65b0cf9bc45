//! Server validators and response header parsing.
//!
//! A `Validators` snapshot (ETag, Last-Modified, entity length) identifies one
//! revision of a remote resource. Snapshots are taken from HEAD and GET
//! responses and compared before trusting a resumed byte range.

mod parse;

use serde::{Deserialize, Serialize};

pub use parse::{parse_content_range, parse_response_head, ContentRange, ResponseHead};

/// Identity markers the server reported for a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validators {
    /// Raw `ETag` value including quotes and any `W/` prefix.
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// Full entity length (not the length of a partial response).
    pub length: Option<u64>,
}

impl Validators {
    /// True for `W/"..."` tags, which only support weak comparison.
    pub fn has_weak_etag(&self) -> bool {
        self.etag
            .as_deref()
            .map(|e| e.starts_with("W/"))
            .unwrap_or(false)
    }

    /// True if any field could tell two revisions apart.
    pub fn has_identity(&self) -> bool {
        self.etag.is_some() || self.last_modified.is_some()
    }
}
