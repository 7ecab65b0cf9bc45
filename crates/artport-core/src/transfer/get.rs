//! Download into a local file, resuming from a token when the server still
//! serves the same revision.

use std::path::Path;

use url::Url;

use crate::checksum::{ExpectedChecksum, StreamingDigest};
use crate::classify::{TransferError, TransferOutcome, Transferred};
use crate::config::ChecksumPolicy;
use crate::resume::ResumeToken;
use crate::retry::ErrorKind;
use crate::sink::LocalSink;

use super::handler::{Accepted, Download};
use super::options::{configure, Method};
use super::{unexpected_abort, Abort, BodyTarget, Completion, HttpTransporter, TransferRequest};

/// Body fully received for an accepted response.
struct Completed {
    sink: LocalSink,
    digest: Option<StreamingDigest>,
    accepted: Accepted,
    written: u64,
}

enum Fetch {
    Complete(Completed),
    /// Resume refused; the sink comes back for a restart from 0.
    Rejected {
        sink: LocalSink,
        digest: Option<StreamingDigest>,
        reason: String,
    },
}

impl HttpTransporter {
    /// Download the resource into `sink`.
    ///
    /// With a `resume` token the request asks only for bytes after the token's
    /// offset and is honored only if the server still reports the token's
    /// validators; otherwise the file is truncated and fetched whole. On
    /// `Cancelled` and `TransientIo` the error may carry a fresh token for the
    /// bytes kept on disk. On `ChecksumMismatch` the file content is not usable.
    pub fn get(
        &self,
        request: &TransferRequest,
        sink: &Path,
        resume: Option<&ResumeToken>,
    ) -> TransferOutcome {
        self.ensure_open(request.cancel_token())?;
        let url = self.resource_url(request.resource())?;
        let expected = match self.config.checksum_policy {
            ChecksumPolicy::Ignore => None,
            ChecksumPolicy::Fail | ChecksumPolicy::Warn => request.checksum(),
        };

        let (local, token) = open_sink(sink, resume)?;
        let mut digest = expected.map(|e| StreamingDigest::new(e.algorithm));
        if let (Some(d), Some(t)) = (digest.as_mut(), token.as_ref()) {
            local.hash_prefix(d, t.offset)?;
        }

        let completed = match self.fetch(request, &url, local, token, digest)? {
            Fetch::Complete(c) => c,
            Fetch::Rejected {
                sink,
                digest,
                reason,
            } => {
                tracing::debug!(url = %url, reason = %reason, "resume rejected; restarting from 0");
                sink.discard()?;
                let digest = digest.map(|d| StreamingDigest::new(d.algorithm()));
                match self.fetch(request, &url, sink, None, digest)? {
                    Fetch::Complete(c) => c,
                    Fetch::Rejected { reason, .. } => return Err(TransferError::FatalProtocol(reason)),
                }
            }
        };
        self.finish_download(completed, expected, &url)
    }

    fn fetch(
        &self,
        request: &TransferRequest,
        url: &Url,
        sink: LocalSink,
        token: Option<ResumeToken>,
        digest: Option<StreamingDigest>,
    ) -> Result<Fetch, TransferError> {
        let (route, auth) = self.prepare(url)?;
        let mut headers = Vec::new();
        if let Some(t) = &token {
            headers.push(format!("Range: bytes={}-", t.offset));
            if let Some(etag) = &t.validators.etag {
                headers.push(format!("If-Match: {}", etag));
            }
            if let Some(lm) = &t.validators.last_modified {
                headers.push(format!("If-Unmodified-Since: {}", lm));
            }
        }
        let resuming = token.is_some();

        let mut conn = self.pool.acquire(&route)?;
        configure(conn.easy(), &self.options(Method::Get, url, &route, &auth, headers))?;
        conn.easy().get_mut().begin(
            request.cancel_token(),
            request.listener(),
            BodyTarget::Download(Download::new(sink, token, digest)),
            None,
        );
        let completion = self.perform(&mut conn, request.cancel_token());
        let mut download = conn
            .easy()
            .get_mut()
            .take_download()
            .ok_or_else(|| TransferError::FatalProtocol("download state lost".into()))?;
        drop(conn);

        let head = match completion {
            Err(e) => return Err(e.with_partial(download.retained_token())),
            Ok(Completion::Stopped(Abort::ResumeRejected(reason), _)) => {
                return Ok(Fetch::Rejected {
                    sink: download.sink,
                    digest: download.digest,
                    reason,
                })
            }
            Ok(Completion::Stopped(abort, _)) => return Err(unexpected_abort(abort)),
            Ok(Completion::Finished(head)) => head,
        };

        if resuming {
            if let Some(status @ (412 | 416)) = head.status {
                return Ok(Fetch::Rejected {
                    sink: download.sink,
                    digest: download.digest,
                    reason: format!("HTTP {} to conditional range request", status),
                });
            }
        }
        if let Err(e) = self.check_status(&head, url, &route) {
            return Err(e.with_partial(download.retained_token()));
        }
        download.apply_restart()?;

        let partial = download.partial_token();
        let Download {
            sink,
            digest,
            accepted,
            written,
            ..
        } = download;
        let accepted = accepted.ok_or_else(|| {
            TransferError::FatalProtocol(format!("no response body accepted from {}", url))
        })?;
        if let Some(expected) = accepted.expected {
            if written != expected {
                return Err(TransferError::transient(
                    ErrorKind::Connection,
                    format!("short body from {}: {} of {} bytes", url, written, expected),
                )
                .with_partial(partial));
            }
        }
        Ok(Fetch::Complete(Completed {
            sink,
            digest,
            accepted,
            written,
        }))
    }

    fn finish_download(
        &self,
        completed: Completed,
        expected: Option<&ExpectedChecksum>,
        url: &Url,
    ) -> TransferOutcome {
        let Completed {
            sink,
            digest,
            accepted,
            written,
        } = completed;
        sink.sync()?;
        let digest = digest.map(StreamingDigest::finalize_hex);
        if let (Some(exp), Some(actual)) = (expected, digest.as_deref()) {
            if !exp.matches(actual) {
                if self.config.checksum_policy == ChecksumPolicy::Fail {
                    return Err(TransferError::ChecksumMismatch {
                        algorithm: exp.algorithm,
                        expected: exp.hex.clone(),
                        actual: actual.to_string(),
                    });
                }
                tracing::warn!(
                    url = %url,
                    algorithm = %exp.algorithm,
                    expected = %exp.hex,
                    actual,
                    "checksum mismatch ignored by policy"
                );
            }
        }
        tracing::debug!(
            url = %url,
            bytes = written,
            resumed_from = accepted.base,
            "download complete"
        );
        Ok(Transferred {
            bytes: written,
            validators: accepted.validators,
            resumed_from: accepted.base,
            digest,
        })
    }
}

/// Reopen the partial file for `resume`, or start a fresh file when the token
/// is absent, empty, or the file no longer holds the token's bytes.
fn open_sink(
    path: &Path,
    resume: Option<&ResumeToken>,
) -> Result<(LocalSink, Option<ResumeToken>), TransferError> {
    if let Some(token) = resume.filter(|t| t.offset > 0) {
        if let Some(sink) = LocalSink::open_for_resume(path, token.offset)? {
            return Ok((sink, Some(token.clone())));
        }
        tracing::debug!(
            path = %path.display(),
            offset = token.offset,
            "partial file missing or short; downloading from 0"
        );
    }
    Ok((LocalSink::create(path)?, None))
}
