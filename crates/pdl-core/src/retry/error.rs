//! Error for one attempt at one unit of work (a chunk or the single stream).

use std::fmt;

use crate::http::TransportError;

#[derive(Debug)]
pub enum FetchError {
    /// The HTTP client failed below the status level.
    Transport(TransportError),
    /// Unexpected status (non-206 for a chunk, non-2xx for the stream).
    Http(u32),
    /// 206 for a different range than the one requested.
    RangeMismatch {
        expected: (u64, u64),
        got: Option<(u64, u64)>,
    },
    /// Server sent more bytes than the requested range holds.
    Overflow { limit: u64 },
    /// Transfer ended before the expected byte count arrived.
    PartialTransfer { expected: u64, received: u64 },
    /// Flushing the temp file failed.
    Storage(anyhow::Error),
    /// Appending to the manifest failed.
    Manifest(std::io::Error),
    /// Cancelled by the caller.
    Aborted,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transport(e) => write!(f, "{}", e),
            FetchError::Http(code) => write!(f, "HTTP {}", code),
            FetchError::RangeMismatch { expected, got } => match got {
                Some((s, e)) => write!(
                    f,
                    "range mismatch: asked for {}-{}, got {}-{}",
                    expected.0, expected.1, s, e
                ),
                None => write!(
                    f,
                    "range mismatch: asked for {}-{}, response had no Content-Range",
                    expected.0, expected.1
                ),
            },
            FetchError::Overflow { limit } => {
                write!(f, "server sent more than the {} requested bytes", limit)
            }
            FetchError::PartialTransfer { expected, received } => {
                write!(f, "partial transfer: expected {} bytes, got {}", expected, received)
            }
            FetchError::Storage(e) => write!(f, "storage: {:#}", e),
            FetchError::Manifest(e) => write!(f, "manifest: {}", e),
            FetchError::Aborted => write!(f, "aborted"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Transport(e) => Some(e),
            FetchError::Storage(e) => Some(e.as_ref()),
            FetchError::Manifest(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for FetchError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Aborted => FetchError::Aborted,
            other => FetchError::Transport(other),
        }
    }
}
