//! Job-level errors returned by [`Downloader::run`](crate::downloader::Downloader::run).

use std::path::PathBuf;

use crate::http::{TransportError, MAX_REDIRECTS};
use crate::retry::FetchError;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("invalid job: {0}")]
    InvalidJob(String),

    /// The probe request failed before any status arrived.
    #[error("probe failed")]
    Probe(#[source] TransportError),

    #[error("probe of {url} returned HTTP {status}")]
    ProbeStatus { url: String, status: u32 },

    #[error("more than {} redirects for {url}", MAX_REDIRECTS)]
    TooManyRedirects { url: String },

    #[error(
        "{total_size} bytes in {chunk_size}-byte chunks needs more than {} ranges",
        crate::planner::MAX_CHUNKS
    )]
    TooManyChunks { total_size: u64, chunk_size: u64 },

    #[error("{} is a directory", path.display())]
    TargetIsDirectory { path: PathBuf },

    /// The final path already exists and the job does not overwrite.
    #[error("{} already exists", path.display())]
    TargetExists { path: PathBuf },

    /// First chunk to run out of attempts; `failed_chunks` lists every chunk
    /// that did (ascending).
    #[error(
        "chunk {index} failed after {attempts} attempt(s); {} chunk(s) incomplete",
        failed_chunks.len()
    )]
    ChunkExhausted {
        index: usize,
        attempts: u32,
        failed_chunks: Vec<usize>,
        #[source]
        source: FetchError,
    },

    #[error("single-stream download failed")]
    Stream(#[source] FetchError),

    #[error("download cancelled")]
    Cancelled,

    #[error("sha256 mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Renaming the temp file onto the final path failed.
    #[error("could not publish {}", path.display())]
    Finalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0:#}")]
    Storage(anyhow::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DownloadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DownloadError::Cancelled)
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        DownloadError::Io {
            context: context.into(),
            source,
        }
    }
}
