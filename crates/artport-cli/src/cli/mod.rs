//! CLI for the artport artifact transporter.

mod commands;

use anyhow::Result;
use artport_core::config;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use commands::{run_checksum, run_get, run_peek, run_put, Session};

/// Top-level CLI for artport.
#[derive(Debug, Parser)]
#[command(name = "artport")]
#[command(about = "artport: move artifacts to and from HTTP repositories", long_about = None)]
pub struct Cli {
    /// Print results as JSON instead of plain text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Check that an artifact exists and show its validators.
    Peek {
        /// Repository base URL (http or https).
        repo_url: String,
        /// Artifact path relative to the repository.
        path: String,
    },

    /// Download an artifact to a local file.
    Get {
        /// Repository base URL (http or https).
        repo_url: String,
        /// Artifact path relative to the repository.
        path: String,
        /// Local destination file.
        dest: PathBuf,
        /// Continue a previous partial download recorded next to DEST.
        #[arg(long)]
        resume: bool,
        /// Expected SHA-256 of the artifact (hex).
        #[arg(long, value_name = "HEX")]
        sha256: Option<String>,
    },

    /// Upload a local file as an artifact.
    Put {
        /// Repository base URL (http or https).
        repo_url: String,
        /// Artifact path relative to the repository.
        path: String,
        /// Local file to upload.
        file: PathBuf,
    },

    /// Compute SHA-256 of a file (e.g. after download).
    Checksum {
        /// Path to the file.
        path: String,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        if let CliCommand::Checksum { path } = &cli.command {
            return run_checksum(Path::new(path)).await;
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let session = Session::new(cfg);

        match cli.command {
            CliCommand::Peek { repo_url, path } => {
                run_peek(&session, &repo_url, &path, cli.json).await?
            }
            CliCommand::Get {
                repo_url,
                path,
                dest,
                resume,
                sha256,
            } => run_get(&session, &repo_url, &path, &dest, resume, sha256, cli.json).await?,
            CliCommand::Put {
                repo_url,
                path,
                file,
            } => run_put(&session, &repo_url, &path, &file, cli.json).await?,
            CliCommand::Checksum { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
