//! Positional writer over the caller's destination file.

use std::fs::File;
use std::io;

use crate::checksum::StreamingDigest;
use std::path::{Path, PathBuf};
#[cfg(unix)]
use std::os::unix::fs::FileExt;

/// Destination file of a GET. Not shared between calls.
#[derive(Debug)]
pub struct LocalSink {
    file: File,
    path: PathBuf,
}

impl LocalSink {
    /// Create or truncate `path` for a download from offset 0.
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Reopen a partial file, keeping exactly `[0, offset)`.
    /// Returns `Ok(None)` when the file is missing or shorter than `offset`,
    /// in which case the caller restarts from 0.
    pub fn open_for_resume(path: &Path, offset: u64) -> io::Result<Option<Self>> {
        let file = match File::options().read(true).write(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        if file.metadata()?.len() < offset {
            return Ok(None);
        }
        file.set_len(offset)?;
        Ok(Some(Self {
            file,
            path: path.to_path_buf(),
        }))
    }

    /// Write `data` at `offset` without moving a shared cursor.
    #[cfg(unix)]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.file.write_all_at(data, offset)
    }

    #[cfg(not(unix))]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = &self.file;
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(data)
    }

    /// Drop everything written so far (restart from offset 0).
    pub fn discard(&self) -> io::Result<()> {
        self.file.set_len(0)
    }

    pub fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Independent reader over the file from the start; used to seed a digest.
    pub fn prefix_reader(&self) -> io::Result<File> {
        File::open(&self.path)
    }

    /// Feed the first `len` bytes already on disk into `digest`.
    pub fn hash_prefix(&self, digest: &mut StreamingDigest, len: u64) -> io::Result<()> {
        digest.update_from_reader(self.prefix_reader()?, len)
    }

    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
