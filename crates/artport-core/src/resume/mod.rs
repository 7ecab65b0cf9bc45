//! Safe resume: a partial download continues only against the same revision.
//!
//! A `ResumeToken` records how many bytes are on disk and the validators the
//! server reported while they were written. Before a ranged GET is trusted,
//! the token is compared with the validators of the current response; any
//! doubt means a full restart.

mod error;

use serde::{Deserialize, Serialize};

use crate::validators::Validators;

pub use error::{ResumeMismatch, ResumeMismatchKind};

/// Captured after a partial transfer; consumed by the next `get`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeToken {
    /// Bytes already written to the local sink, `[0, offset)`.
    pub offset: u64,
    pub validators: Validators,
}

impl ResumeToken {
    pub fn new(offset: u64, validators: Validators) -> Self {
        Self { offset, validators }
    }
}

/// Pure check of `token` against the snapshot the server reports now.
///
/// Fails closed: a field present on one side only, a weak ETag, or a snapshot
/// without any identity validator (ETag or Last-Modified) all reject resume.
/// Fields missing on both sides are skipped.
pub fn check_resume(token: &ResumeToken, server: &Validators) -> Result<(), ResumeMismatch> {
    let ours = &token.validators;

    if ours.has_weak_etag() || server.has_weak_etag() {
        return Err(ResumeMismatchKind::Unconfirmable("weak ETag").into());
    }

    let mut one_sided = false;
    let mut compare = |a: Option<&str>, b: Option<&str>| match (a, b) {
        (None, None) => false,
        (Some(a), Some(b)) => a != b,
        _ => {
            one_sided = true;
            false
        }
    };
    let etag_changed = compare(ours.etag.as_deref(), server.etag.as_deref());
    let last_modified_changed = compare(
        ours.last_modified.as_deref(),
        server.last_modified.as_deref(),
    );
    let length_changed = match (ours.length, server.length) {
        (None, None) => false,
        (Some(a), Some(b)) => a != b,
        _ => {
            one_sided = true;
            false
        }
    };

    if etag_changed || last_modified_changed || length_changed {
        return Err(ResumeMismatchKind::Changed {
            etag_changed,
            last_modified_changed,
            length_changed,
        }
        .into());
    }
    if one_sided {
        return Err(ResumeMismatchKind::Unconfirmable("validator missing on one side").into());
    }
    let identity_matched = (ours.etag.is_some() && server.etag.is_some())
        || (ours.last_modified.is_some() && server.last_modified.is_some());
    if !identity_matched {
        return Err(ResumeMismatchKind::Unconfirmable("no ETag or Last-Modified").into());
    }
    if let Some(length) = server.length {
        if token.offset > length {
            return Err(ResumeMismatchKind::OffsetBeyondEnd {
                offset: token.offset,
                length,
            }
            .into());
        }
    }
    Ok(())
}

/// True if `token` may be resumed against `server`.
pub fn can_resume(token: &ResumeToken, server: &Validators) -> bool {
    check_resume(token, server).is_ok()
}
