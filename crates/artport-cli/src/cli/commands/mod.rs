//! CLI command handlers. Each command is in its own file.

mod checksum;
mod get;
mod peek;
mod put;

use anyhow::{Context, Result};
use artport_core::config::TransportConfig;
use artport_core::retry::RetryPolicy;
use artport_core::{CancelToken, HttpTransporter, Repository, Transferred, TransporterFactory};

pub use checksum::run_checksum;
pub use get::run_get;
pub use peek::run_peek;
pub use put::run_put;

/// What every transfer command needs: a factory and the retry policy.
pub struct Session {
    factory: TransporterFactory,
    policy: RetryPolicy,
}

impl Session {
    pub fn new(cfg: TransportConfig) -> Self {
        let policy = cfg
            .retry
            .as_ref()
            .map(RetryPolicy::from)
            .unwrap_or_default();
        Self {
            factory: TransporterFactory::new(cfg),
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn transporter(&self, repo_url: &str) -> Result<HttpTransporter> {
        let repo = Repository::new("cli", repo_url)
            .with_context(|| format!("invalid repository URL {}", repo_url))?;
        Ok(self.factory.new_transporter(repo)?)
    }
}

/// Run a blocking transfer off the async runtime. Ctrl-C cancels it through
/// `cancel` and the command still waits for the transfer to wind down.
async fn run_cancellable<T, F>(cancel: CancelToken, f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let mut task = tokio::task::spawn_blocking(f);
    tokio::select! {
        res = &mut task => Ok(res?),
        _ = tokio::signal::ctrl_c() => {
            eprintln!("interrupted, cancelling transfer");
            cancel.cancel();
            Ok(task.await?)
        }
    }
}

fn print_summary(op: &str, target: &str, done: &Transferred, json: bool) -> Result<()> {
    if json {
        let value = serde_json::json!({
            "operation": op,
            "target": target,
            "bytes": done.bytes,
            "resumed_from": done.resumed_from,
            "digest": done.digest,
            "validators": done.validators,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    println!("{} {}: {} bytes", op, target, done.bytes);
    if done.resumed_from > 0 {
        println!("  resumed from byte {}", done.resumed_from);
    }
    if let Some(etag) = &done.validators.etag {
        println!("  etag: {}", etag);
    }
    if let Some(lm) = &done.validators.last_modified {
        println!("  last-modified: {}", lm);
    }
    if let Some(len) = done.validators.length {
        println!("  length: {}", len);
    }
    if let Some(digest) = &done.digest {
        println!("  sha256: {}", digest);
    }
    Ok(())
}
