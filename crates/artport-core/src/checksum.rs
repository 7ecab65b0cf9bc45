//! Checksums: streaming digests during GET and whole-file hashing.
//!
//! The engine feeds every received chunk into a `StreamingDigest`; on resume
//! the bytes already on disk are fed first so the final digest covers the
//! whole artifact.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Sha256,
    Sha512,
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecksumAlgorithm::Sha256 => f.write_str("SHA-256"),
            ChecksumAlgorithm::Sha512 => f.write_str("SHA-512"),
        }
    }
}

/// Digest the caller expects for a downloaded body (lowercase hex).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedChecksum {
    pub algorithm: ChecksumAlgorithm,
    pub hex: String,
}

impl ExpectedChecksum {
    pub fn sha256(hex: impl Into<String>) -> Self {
        Self {
            algorithm: ChecksumAlgorithm::Sha256,
            hex: hex.into().to_ascii_lowercase(),
        }
    }

    pub fn sha512(hex: impl Into<String>) -> Self {
        Self {
            algorithm: ChecksumAlgorithm::Sha512,
            hex: hex.into().to_ascii_lowercase(),
        }
    }

    pub fn matches(&self, actual_hex: &str) -> bool {
        self.hex.eq_ignore_ascii_case(actual_hex)
    }
}

/// Incremental hasher for one of the supported algorithms.
#[derive(Clone)]
pub enum StreamingDigest {
    Sha256(Sha256),
    Sha512(Sha512),
}

impl StreamingDigest {
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Sha256 => StreamingDigest::Sha256(Sha256::new()),
            ChecksumAlgorithm::Sha512 => StreamingDigest::Sha512(Sha512::new()),
        }
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        match self {
            StreamingDigest::Sha256(_) => ChecksumAlgorithm::Sha256,
            StreamingDigest::Sha512(_) => ChecksumAlgorithm::Sha512,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            StreamingDigest::Sha256(h) => h.update(data),
            StreamingDigest::Sha512(h) => h.update(data),
        }
    }

    /// Discard everything hashed so far (restart from offset 0).
    pub fn reset(&mut self) {
        *self = StreamingDigest::new(self.algorithm());
    }

    pub fn finalize_hex(self) -> String {
        match self {
            StreamingDigest::Sha256(h) => hex::encode(h.finalize()),
            StreamingDigest::Sha512(h) => hex::encode(h.finalize()),
        }
    }

    /// Feed the first `len` bytes of `reader` into the digest.
    pub fn update_from_reader<R: Read>(&mut self, reader: R, len: u64) -> std::io::Result<()> {
        let mut limited = reader.take(len);
        let mut buf = vec![0u8; BUF_SIZE];
        let mut seen = 0u64;
        loop {
            let n = limited.read(&mut buf)?;
            if n == 0 {
                break;
            }
            self.update(&buf[..n]);
            seen += n as u64;
        }
        if seen != len {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes to hash, found {}", len, seen),
            ));
        }
        Ok(())
    }
}

/// Compute SHA-256 of a file and return the digest as lowercase hex.
/// Reads in chunks to keep memory use bounded; suitable for large files.
pub fn sha256_path(path: &Path) -> Result<String> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let len = f
        .metadata()
        .with_context(|| format!("stat {}", path.display()))?
        .len();
    let mut digest = StreamingDigest::new(ChecksumAlgorithm::Sha256);
    digest
        .update_from_reader(f, len)
        .with_context(|| format!("read {}", path.display()))?;
    Ok(digest.finalize_hex())
}
