//! Temp file store.
//!
//! One `<final>.downloading` file per job, pre-sized for the chunked path so
//! workers can write their disjoint ranges with positioned writes and no
//! locking. Publication is a single rename onto the final path.

mod builder;
mod writer;

pub use builder::StorageWriterBuilder;
pub use writer::StorageWriter;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const TEMP_SUFFIX: &str = ".downloading";

/// `file.iso` -> `file.iso.downloading`.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Open the temp file for a chunked job of `total_size` bytes.
///
/// An existing file of exactly that length is reused (`true` in the result)
/// so a resumed job keeps its bytes; anything else is recreated and
/// preallocated, and the caller must treat the manifest as empty.
pub fn open_for_chunks(temp_path: &Path, total_size: u64) -> Result<(StorageWriter, bool)> {
    if let Ok(meta) = std::fs::metadata(temp_path) {
        if meta.is_file() && meta.len() == total_size {
            let writer = StorageWriter::open_existing(temp_path)?;
            return Ok((writer, true));
        }
        tracing::debug!(
            path = %temp_path.display(),
            found = meta.len(),
            expected = total_size,
            "temp file size mismatch, recreating"
        );
    }
    let mut builder = StorageWriterBuilder::create(temp_path)
        .with_context(|| format!("create temp file: {}", temp_path.display()))?;
    builder.preallocate(total_size)?;
    Ok((builder.build(), false))
}
