//! CLI for the PDL downloader.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use pdl_core::config;
use std::path::PathBuf;

use commands::{run_checksum, run_get};

/// Top-level CLI for the PDL downloader.
#[derive(Debug, Parser)]
#[command(name = "pdl")]
#[command(about = "PDL: resumable, chunked, concurrent HTTP downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a URL. Re-running the same command resumes an interrupted job.
    Get(GetArgs),

    /// Compute SHA-256 of a file (e.g. after download).
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },
}

/// Options for `pdl get`. Unset values come from the config file.
#[derive(Debug, Args)]
pub struct GetArgs {
    /// Direct HTTP/HTTPS URL to download.
    pub url: String,

    /// Directory to save into (default: current directory).
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// File name to save as (default: derived from the response).
    #[arg(short, long, value_name = "NAME")]
    pub output: Option<String>,

    /// Maximum concurrent chunk workers.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Largest byte range per chunk request.
    #[arg(long, value_name = "BYTES")]
    pub chunk_size: Option<u64>,

    /// Attempts per chunk, including the first.
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Seconds to wait between attempts.
    #[arg(long, value_name = "SECS")]
    pub retry_interval: Option<f64>,

    /// Publish the file even if some chunks failed (their ranges are zero-filled).
    #[arg(long)]
    pub continue_on_error: bool,

    /// Expected SHA-256 (hex); the file is not published on mismatch.
    #[arg(long, value_name = "HEX")]
    pub sha256: Option<String>,

    /// Replace an existing file at the target path.
    #[arg(long)]
    pub overwrite: bool,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Get(args) => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_get(args, &cfg).await?
            }
            CliCommand::Checksum { path } => run_checksum(&path).await?,
        }

        Ok(())
    }
}
