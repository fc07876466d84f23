//! Finalizer: apply the error policy, verify, and publish with one rename.

use std::path::Path;

use super::state::JobReport;
use crate::checksum::{verify_sha256, Verification};
use crate::error::DownloadError;
use crate::manifest::{remove_if_exists, Manifest};
use crate::planner::Chunk;
use crate::storage::StorageWriter;

/// Decide whether a chunked job may be published. Returns the chunks that
/// failed (to be zero-filled) when it may.
pub(super) fn check_chunked(
    report: &mut JobReport,
    chunks: &[Chunk],
    continue_on_error: bool,
) -> Result<Vec<Chunk>, DownloadError> {
    if !continue_on_error {
        if let Some(first) = report.first_error.take() {
            return Err(DownloadError::ChunkExhausted {
                index: first.index,
                attempts: first.attempts,
                failed_chunks: report.failed.iter().copied().collect(),
                source: first.error,
            });
        }
    }
    let unaccounted: Vec<usize> = chunks
        .iter()
        .map(|c| c.index)
        .filter(|i| !report.manifest.is_complete(*i) && !report.failed.contains(i))
        .collect();
    if !unaccounted.is_empty() {
        return Err(DownloadError::Internal(format!(
            "{} chunk(s) neither completed nor failed (first: {})",
            unaccounted.len(),
            unaccounted[0]
        )));
    }
    Ok(chunks
        .iter()
        .filter(|c| report.failed.contains(&c.index))
        .copied()
        .collect())
}

/// Zero every failed chunk's range so the published gaps are well defined.
pub(super) fn zero_fill_gaps(storage: &StorageWriter, gaps: &[Chunk]) -> Result<(), DownloadError> {
    for gap in gaps {
        tracing::warn!(
            index = gap.index,
            start = gap.start,
            end = gap.end,
            "publishing with a zero-filled gap"
        );
        storage
            .zero_fill(gap.start, gap.len())
            .map_err(DownloadError::Storage)?;
    }
    Ok(())
}

/// Flush, verify the optional checksum, rename onto `final_path`, then drop
/// the manifest. A checksum mismatch deletes the temp file and manifest;
/// a failed rename leaves both in place.
pub(super) fn publish(
    storage: StorageWriter,
    final_path: &Path,
    expected_sha256: Option<&str>,
    manifest: Option<&mut Manifest>,
) -> Result<(), DownloadError> {
    storage.sync().map_err(DownloadError::Storage)?;
    let temp_path = storage.temp_path().to_path_buf();

    if let Some(expected) = expected_sha256 {
        match verify_sha256(&temp_path, expected).map_err(DownloadError::Storage)? {
            Verification::Match => tracing::debug!("sha256 verified"),
            Verification::Mismatch { actual } => {
                drop(storage);
                if let Err(e) = remove_if_exists(&temp_path) {
                    tracing::warn!(path = %temp_path.display(), "could not remove corrupt file: {}", e);
                }
                if let Some(m) = manifest {
                    m.discard();
                }
                return Err(DownloadError::ChecksumMismatch {
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
    }

    storage
        .finalize(final_path)
        .map_err(|source| DownloadError::Finalize {
            path: final_path.to_path_buf(),
            source,
        })?;
    if let Some(m) = manifest {
        m.discard();
    }
    tracing::info!(path = %final_path.display(), "download committed");
    Ok(())
}
