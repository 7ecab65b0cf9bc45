//! `artport peek` – existence check without downloading the body.

use anyhow::Result;
use artport_core::retry::run_with_retry;
use artport_core::{RemoteResource, TransferRequest};

use super::{print_summary, run_cancellable, Session};

pub async fn run_peek(session: &Session, repo_url: &str, path: &str, json: bool) -> Result<()> {
    let transporter = session.transporter(repo_url)?;
    let request = TransferRequest::new(RemoteResource::new(path)?);
    let cancel = request.cancel_token().clone();
    let policy = session.policy();

    let done = run_cancellable(cancel, move || {
        run_with_retry(&policy, |_| transporter.peek(&request), std::thread::sleep)
    })
    .await??;
    print_summary("peek", path, &done, json)
}
