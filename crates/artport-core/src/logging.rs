//! Logging init for binaries embedding the transporter.
//!
//! The library only emits `tracing` events; this installs the subscriber.
//! Logs go to `~/.local/state/artport/artport.log`, or to stderr when that
//! file cannot be opened.

use anyhow::Result;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,artport=debug,artport_core=debug";

/// Where log output ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    File(PathBuf),
    Stderr,
}

/// Log file handle that degrades to stderr if a per-event clone fails.
enum FileOrStderr {
    File(fs::File),
    Stderr,
}

impl io::Write for FileOrStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileOrStderr::File(f) => f.write(buf),
            FileOrStderr::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileOrStderr::File(f) => f.flush(),
            FileOrStderr::Stderr => io::stderr().lock().flush(),
        }
    }
}

struct LogFile(fs::File);

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = FileOrStderr;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(FileOrStderr::File)
            .unwrap_or(FileOrStderr::Stderr)
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn open_log_file() -> Result<(fs::File, PathBuf)> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("artport")?;
    let log_dir = xdg_dirs.get_state_home().join("artport");
    fs::create_dir_all(&log_dir)?;
    let path = log_dir.join("artport.log");
    let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((file, path))
}

/// Install the global subscriber. Call once, as early as possible.
///
/// Never fails: if the state directory is unwritable, events go to stderr and
/// the returned target says so.
pub fn init_logging() -> LogTarget {
    match open_log_file() {
        Ok((file, path)) => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(BoxMakeWriter::new(LogFile(file)))
                .with_ansi(false)
                .init();
            tracing::info!("artport logging initialized at {}", path.display());
            LogTarget::File(path)
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(io::stderr)
                .with_ansi(false)
                .init();
            tracing::warn!("log file unavailable ({:#}), logging to stderr", e);
            LogTarget::Stderr
        }
    }
}
