//! `artport put` – upload a local file.

use anyhow::{bail, Result};
use artport_core::retry::run_with_retry;
use artport_core::{BodySource, RemoteResource, TransferRequest};
use std::path::Path;

use super::{print_summary, run_cancellable, Session};

pub async fn run_put(
    session: &Session,
    repo_url: &str,
    path: &str,
    file: &Path,
    json: bool,
) -> Result<()> {
    if !file.is_file() {
        bail!("{} is not a readable file", file.display());
    }
    let transporter = session.transporter(repo_url)?;
    let request = TransferRequest::new(RemoteResource::new(path)?);
    let body = BodySource::file(file);
    let cancel = request.cancel_token().clone();
    let policy = session.policy();

    let done = run_cancellable(cancel, move || {
        run_with_retry(&policy, |_| transporter.put(&request, &body), std::thread::sleep)
    })
    .await??;
    print_summary("put", path, &done, json)
}
