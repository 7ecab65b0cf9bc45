//! `artport get` – download an artifact, optionally resuming a partial file.
//!
//! With `--resume` the resume token lives next to the destination as
//! `<dest>.resume` (JSON). It is written when a download stops with bytes
//! kept and removed once the download completes.

use anyhow::{Context, Result};
use artport_core::retry::run_with_retry;
use artport_core::{
    ExpectedChecksum, RemoteResource, ResumeToken, TransferError, TransferRequest,
};
use std::fs;
use std::path::{Path, PathBuf};

use super::{print_summary, run_cancellable, Session};

pub async fn run_get(
    session: &Session,
    repo_url: &str,
    path: &str,
    dest: &Path,
    resume: bool,
    sha256: Option<String>,
    json: bool,
) -> Result<()> {
    let transporter = session.transporter(repo_url)?;
    let mut request = TransferRequest::new(RemoteResource::new(path)?);
    if let Some(hex) = sha256 {
        request = request.with_checksum(ExpectedChecksum::sha256(hex));
    }
    let cancel = request.cancel_token().clone();
    let policy = session.policy();

    let sidecar = sidecar_path(dest);
    let initial = if resume { load_token(&sidecar)? } else { None };
    if let Some(t) = &initial {
        tracing::info!(offset = t.offset, "resuming from {}", sidecar.display());
    }

    let target = dest.to_path_buf();
    let outcome = run_cancellable(cancel, move || {
        let mut known = initial;
        run_with_retry(
            &policy,
            |prev| {
                carry_token(&mut known, prev);
                transporter.get(&request, &target, known.as_ref())
            },
            std::thread::sleep,
        )
    })
    .await?;

    match outcome {
        Ok(done) => {
            remove_token(&sidecar)?;
            print_summary("get", path, &done, json)
        }
        Err(e) => {
            // Without a fresh token the sidecar stays as it was; a stale one is
            // caught by the length and validator checks on the next run.
            if let (true, Some(token)) = (resume, e.resume_token()) {
                save_token(&sidecar, token)?;
                eprintln!(
                    "kept {} bytes; rerun with --resume to continue",
                    token.offset
                );
            }
            Err(e.into())
        }
    }
}

/// Adopt the token a failed attempt reported. A failure that reports none
/// left the previous prefix alone, so the last known token still applies.
fn carry_token(known: &mut Option<ResumeToken>, prev: Option<&TransferError>) {
    if let Some(t) = prev.and_then(TransferError::resume_token) {
        *known = Some(t.clone());
    }
}

pub(super) fn sidecar_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".resume");
    PathBuf::from(name)
}

/// A missing or unreadable sidecar means a fresh download.
pub(super) fn load_token(sidecar: &Path) -> Result<Option<ResumeToken>> {
    if !sidecar.exists() {
        return Ok(None);
    }
    let data =
        fs::read_to_string(sidecar).with_context(|| format!("read {}", sidecar.display()))?;
    match serde_json::from_str(&data) {
        Ok(token) => Ok(Some(token)),
        Err(e) => {
            tracing::warn!("ignoring corrupt resume file {}: {}", sidecar.display(), e);
            Ok(None)
        }
    }
}

pub(super) fn save_token(sidecar: &Path, token: &ResumeToken) -> Result<()> {
    let json = serde_json::to_string_pretty(token)?;
    fs::write(sidecar, json).with_context(|| format!("write {}", sidecar.display()))
}

fn remove_token(sidecar: &Path) -> Result<()> {
    match fs::remove_file(sidecar) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("remove {}", sidecar.display())),
    }
}
