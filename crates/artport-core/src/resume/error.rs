//! Why a resume token was rejected. Recovered locally by restarting; only logged.

use std::fmt;

#[derive(Debug)]
pub struct ResumeMismatch {
    pub kind: ResumeMismatchKind,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ResumeMismatchKind {
    /// Remote ETag, Last-Modified, or length differs from the token.
    Changed {
        etag_changed: bool,
        last_modified_changed: bool,
        length_changed: bool,
    },
    /// Identity of the remote revision cannot be established.
    Unconfirmable(&'static str),
    /// Token claims more bytes than the resource has.
    OffsetBeyondEnd { offset: u64, length: u64 },
}

impl From<ResumeMismatchKind> for ResumeMismatch {
    fn from(kind: ResumeMismatchKind) -> Self {
        Self { kind }
    }
}

impl fmt::Display for ResumeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ResumeMismatchKind::Changed {
                etag_changed,
                last_modified_changed,
                length_changed,
            } => {
                let fields: Vec<&str> = [
                    (*etag_changed, "ETag"),
                    (*last_modified_changed, "Last-Modified"),
                    (*length_changed, "length"),
                ]
                .iter()
                .filter(|(changed, _)| *changed)
                .map(|(_, name)| *name)
                .collect();
                write!(f, "remote resource changed ({})", fields.join(", "))
            }
            ResumeMismatchKind::Unconfirmable(why) => {
                write!(f, "cannot confirm remote revision: {}", why)
            }
            ResumeMismatchKind::OffsetBeyondEnd { offset, length } => {
                write!(f, "resume offset {} beyond resource length {}", offset, length)
            }
        }
    }
}

impl std::error::Error for ResumeMismatch {}
