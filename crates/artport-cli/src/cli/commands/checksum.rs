//! Checksum command: compute SHA-256 of a local file.

use anyhow::Result;
use artport_core::checksum;
use std::path::Path;

/// Print the SHA-256 of `path` in `sha256sum` format.
pub async fn run_checksum(path: &Path) -> Result<()> {
    let digest = checksum::sha256_path(path)?;
    println!("{}  {}", digest, path.display());
    Ok(())
}
