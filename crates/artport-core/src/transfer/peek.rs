//! Metadata lookup: HEAD, or a one-byte range GET for servers that refuse HEAD.

use crate::classify::{TransferError, TransferOutcome, Transferred};
use crate::validators::ResponseHead;

use super::options::{configure, Method};
use super::{unexpected_abort, Abort, BodyTarget, Completion, HttpTransporter, TransferRequest};

impl HttpTransporter {
    /// Check existence and read validators without transferring the body.
    pub fn peek(&self, request: &TransferRequest) -> TransferOutcome {
        self.ensure_open(request.cancel_token())?;
        let url = self.resource_url(request.resource())?;
        let head = self.simple_request(Method::Head, &url, request)?;
        let head = match head.status {
            Some(405) | Some(501) => {
                tracing::debug!(url = %url, status = ?head.status, "HEAD refused; probing with a range request");
                self.range_peek(&url, request)?
            }
            _ => head,
        };
        let route = self.routes.resolve_route(&url)?;
        self.check_status(&head, &url, &route)?;
        Ok(Transferred {
            bytes: 0,
            validators: head.validators(),
            resumed_from: 0,
            digest: None,
        })
    }

    /// `GET` with `Range: bytes=0-0`; the body is dropped.
    fn range_peek(
        &self,
        url: &url::Url,
        request: &TransferRequest,
    ) -> Result<ResponseHead, TransferError> {
        let (route, auth) = self.prepare(url)?;
        let mut conn = self.pool.acquire(&route)?;
        let headers = vec!["Range: bytes=0-0".to_string()];
        configure(conn.easy(), &self.options(Method::Get, url, &route, &auth, headers))?;
        conn.easy()
            .get_mut()
            .begin(request.cancel_token(), request.listener(), BodyTarget::HeadOnly, None);
        match self.perform(&mut conn, request.cancel_token())? {
            Completion::Finished(head) | Completion::Stopped(Abort::HeadersComplete, head) => {
                Ok(head)
            }
            Completion::Stopped(abort, _) => Err(unexpected_abort(abort)),
        }
    }
}
