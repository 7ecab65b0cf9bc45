//! Upload, creating missing WebDAV parent collections once.

use url::Url;

use crate::classify::{TransferError, TransferOutcome, Transferred};
use crate::config::WebDavPolicy;
use crate::validators::ResponseHead;

use super::options::{configure, Method};
use super::{unexpected_abort, BodySource, BodyTarget, Completion, HttpTransporter, TransferRequest};

/// MKCOL answer while walking up the resource path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collection {
    Created,
    Exists,
    ParentMissing,
}

impl HttpTransporter {
    /// Upload `body` to the request's resource. Redirects are not followed.
    ///
    /// When the server reports a missing parent collection and WebDAV is in
    /// use, the parents are created with MKCOL and the upload is retried
    /// exactly once. No other retry happens here.
    pub fn put(&self, request: &TransferRequest, body: &BodySource) -> TransferOutcome {
        self.ensure_open(request.cancel_token())?;
        let url = self.resource_url(request.resource())?;
        let length = body.len()?;

        let mut head = self.upload(request, &url, body, length)?;
        if self.parent_missing(&head) && self.supports_webdav(request) {
            tracing::debug!(url = %url, status = ?head.status, "parent collection missing");
            self.create_parents(request)?;
            head = self.upload(request, &url, body, length)?;
        }
        let route = self.routes.resolve_route(&url)?;
        self.check_status(&head, &url, &route)?;
        tracing::debug!(url = %url, bytes = length, "upload complete");
        Ok(Transferred {
            bytes: length,
            validators: head.validators(),
            resumed_from: 0,
            digest: None,
        })
    }

    fn upload(
        &self,
        request: &TransferRequest,
        url: &Url,
        body: &BodySource,
        length: u64,
    ) -> Result<ResponseHead, TransferError> {
        let (route, auth) = self.prepare(url)?;
        let reader = body.open()?;
        let mut conn = self.pool.acquire(&route)?;
        configure(
            conn.easy(),
            &self.options(Method::Put { length }, url, &route, &auth, Vec::new()),
        )?;
        request.listener().transfer_started(0, Some(length));
        conn.easy().get_mut().begin(
            request.cancel_token(),
            request.listener(),
            BodyTarget::Discard,
            Some(reader),
        );
        match self.perform(&mut conn, request.cancel_token())? {
            Completion::Finished(head) => Ok(head),
            Completion::Stopped(abort, _) => Err(unexpected_abort(abort)),
        }
    }

    fn parent_missing(&self, head: &ResponseHead) -> bool {
        head.status
            .map(|s| self.config.parent_missing_statuses.contains(&s))
            .unwrap_or(false)
    }

    /// Whether MKCOL may be used. `auto` asks the server with OPTIONS until it
    /// gets a conclusive answer.
    fn supports_webdav(&self, request: &TransferRequest) -> bool {
        match self.config.webdav {
            WebDavPolicy::Always => true,
            WebDavPolicy::Never => false,
            WebDavPolicy::Auto => {
                let mut cached = self
                    .dav_support
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                if let Some(known) = *cached {
                    return known;
                }
                let base = self.repository.base_url().clone();
                let detected = match self.simple_request(Method::Options, &base, request) {
                    Ok(head) => match head.status {
                        Some(200..=299) => Some(head.dav),
                        Some(405 | 501) => Some(false),
                        status => {
                            tracing::debug!(url = %base, ?status, "OPTIONS inconclusive");
                            None
                        }
                    },
                    Err(e) => {
                        tracing::debug!(url = %base, "OPTIONS request failed: {}", e);
                        None
                    }
                };
                // Only a conclusive answer is cached; the next upload asks again otherwise.
                tracing::debug!(url = %base, dav = ?detected, "WebDAV detection");
                *cached = detected;
                detected.unwrap_or(false)
            }
        }
    }

    fn mkcol(&self, request: &TransferRequest, collection: &str) -> Result<Collection, TransferError> {
        let url = self.url_for(collection)?;
        let head = self.simple_request(Method::Mkcol, &url, request)?;
        let status = head
            .status
            .ok_or_else(|| TransferError::FatalProtocol(format!("no status line from {}", url)))?;
        match status {
            405 => Ok(Collection::Exists),
            s if self.config.parent_missing_statuses.contains(&s) => Ok(Collection::ParentMissing),
            200..=299 => Ok(Collection::Created),
            _ => {
                let route = self.routes.resolve_route(&url)?;
                self.check_status(&head, &url, &route)?;
                Err(TransferError::FatalProtocol(format!(
                    "MKCOL {} returned HTTP {}",
                    url, status
                )))
            }
        }
    }

    /// Walk up from the deepest parent until one is created or exists, then
    /// walk back down creating the rest.
    fn create_parents(&self, request: &TransferRequest) -> Result<(), TransferError> {
        let collections = request.resource().parent_collections();
        let mut first_missing = None;
        for (idx, collection) in collections.iter().enumerate().rev() {
            match self.mkcol(request, collection)? {
                Collection::Created | Collection::Exists => {
                    first_missing = Some(idx + 1);
                    break;
                }
                Collection::ParentMissing => continue,
            }
        }
        let start = first_missing.ok_or_else(|| {
            TransferError::FatalProtocol(format!(
                "cannot create any parent collection of {}",
                request.resource()
            ))
        })?;
        for collection in &collections[start..] {
            if self.mkcol(request, collection)? == Collection::ParentMissing {
                return Err(TransferError::FatalProtocol(format!(
                    "parent of {} vanished while creating collections",
                    collection
                )));
            }
        }
        Ok(())
    }
}
