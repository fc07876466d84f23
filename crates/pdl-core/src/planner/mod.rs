//! Range math and transfer planning.
//!
//! Splits a resource into fixed-size chunks with inclusive byte ranges and
//! chooses between the chunked path, the single-stream fallback, and the
//! empty-file shortcut based on what the probe found.

mod range;

pub use range::{chunk_count, plan_chunks, Chunk};

use crate::error::DownloadError;
use crate::probe::RemoteInfo;

/// Most chunks one job may be split into. The size comes from the server, so
/// a plan past this is refused before anything is allocated.
pub const MAX_CHUNKS: u64 = 1 << 20;

/// How a job will transfer its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferPlan {
    /// `Content-Length: 0`: create an empty file, no network chunk work.
    Empty,
    /// Size known and ranges advertised.
    Chunked(Vec<Chunk>),
    /// Size unknown or ranges unsupported: one sequential GET.
    SingleStream,
}

impl TransferPlan {
    /// `max_chunk_size` must be non-zero (checked by job validation).
    ///
    /// Fails with [`DownloadError::TooManyChunks`] when the advertised size
    /// would need more than [`MAX_CHUNKS`] ranges.
    pub fn choose(info: &RemoteInfo, max_chunk_size: u64) -> Result<Self, DownloadError> {
        let plan = match info.content_length {
            Some(0) => TransferPlan::Empty,
            Some(total) if info.accept_ranges => {
                if chunk_count(total, max_chunk_size) > MAX_CHUNKS {
                    return Err(DownloadError::TooManyChunks {
                        total_size: total,
                        chunk_size: max_chunk_size,
                    });
                }
                TransferPlan::Chunked(plan_chunks(total, max_chunk_size))
            }
            _ => TransferPlan::SingleStream,
        };
        Ok(plan)
    }
}
