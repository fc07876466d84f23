//! Positioned writer shared by all chunk workers of one job.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const ZERO_BLOCK: usize = 64 * 1024;

/// Cheap to clone; every `write_at` is an independent positioned write.
#[derive(Debug, Clone)]
pub struct StorageWriter {
    file: Arc<File>,
    temp_path: PathBuf,
}

impl StorageWriter {
    pub(super) fn from_parts(file: File, temp_path: PathBuf) -> Self {
        Self {
            file: Arc::new(file),
            temp_path,
        }
    }

    /// Open an existing temp file for resume (no truncation).
    pub fn open_existing(temp_path: &Path) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .open(temp_path)
            .with_context(|| format!("failed to open existing temp file: {}", temp_path.display()))?;
        Ok(Self::from_parts(file, temp_path.to_path_buf()))
    }

    /// Write all of `data` at `offset` without touching a shared cursor.
    pub fn write_at(&self, offset: u64, data: &[u8]) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.write_all_at(data, offset)
        }
        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            let mut written = 0usize;
            while written < data.len() {
                let n = self.file.seek_write(&data[written..], offset + written as u64)?;
                if n == 0 {
                    return Err(std::io::ErrorKind::WriteZero.into());
                }
                written += n;
            }
            Ok(())
        }
    }

    /// Overwrite `[start, start + len)` with zeros.
    pub fn zero_fill(&self, start: u64, len: u64) -> Result<()> {
        let block = vec![0u8; ZERO_BLOCK];
        let mut done = 0u64;
        while done < len {
            let n = (len - done).min(ZERO_BLOCK as u64) as usize;
            self.write_at(start + done, &block[..n])
                .with_context(|| format!("zero-fill at offset {}", start + done))?;
            done += n as u64;
        }
        Ok(())
    }

    /// Flush file data to disk.
    pub fn sync(&self) -> Result<()> {
        self.file.sync_data().context("storage sync failed")
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Rename the temp file onto `final_path`. Consumes this handle; other
    /// clones must already be dropped on platforms that refuse to rename open
    /// files.
    pub fn finalize(self, final_path: &Path) -> std::io::Result<()> {
        let temp_path = self.temp_path.clone();
        drop(self.file);
        std::fs::rename(&temp_path, final_path)
    }
}
