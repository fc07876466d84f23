//! `DownloadJob`: the inputs of one transfer plus what the probe discovered.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::PdlConfig;
use crate::error::DownloadError;
use crate::probe::RemoteInfo;
use crate::retry::RetryPolicy;

/// Lifecycle of a job. No phase is re-entered within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Planned,
    Probing,
    MultiChunk,
    SingleStream,
    Finalizing,
    Committed,
    Failed,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobPhase::Planned => "planned",
            JobPhase::Probing => "probing",
            JobPhase::MultiChunk => "multi-chunk",
            JobPhase::SingleStream => "single-stream",
            JobPhase::Finalizing => "finalizing",
            JobPhase::Committed => "committed",
            JobPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub url: String,
    pub save_dir: PathBuf,
    /// Target name; derived from the response when `None`.
    pub file_name: Option<String>,
    pub max_workers: usize,
    pub max_chunk_size: u64,
    /// Attempts per chunk, including the first.
    pub max_retries: u32,
    pub retry_interval: Duration,
    pub continue_on_error: bool,
    /// Lowercase hex SHA-256 checked before publishing.
    pub expected_sha256: Option<String>,
    /// Replace a file already at the final path instead of failing.
    pub overwrite: bool,
    remote: Option<RemoteInfo>,
    phase: JobPhase,
}

impl DownloadJob {
    /// Job with built-in defaults (see [`PdlConfig::default`]).
    pub fn new(url: impl Into<String>, save_dir: impl Into<PathBuf>) -> Self {
        Self::from_config(url, save_dir, &PdlConfig::default())
    }

    pub fn from_config(
        url: impl Into<String>,
        save_dir: impl Into<PathBuf>,
        cfg: &PdlConfig,
    ) -> Self {
        Self {
            url: url.into(),
            save_dir: save_dir.into(),
            file_name: None,
            max_workers: cfg.max_workers,
            max_chunk_size: cfg.max_chunk_size,
            max_retries: cfg.max_retries,
            retry_interval: cfg.retry_interval(),
            continue_on_error: cfg.continue_on_error,
            expected_sha256: None,
            overwrite: false,
            remote: None,
            phase: JobPhase::Planned,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_max_workers(mut self, n: usize) -> Self {
        self.max_workers = n;
        self
    }

    pub fn with_max_chunk_size(mut self, bytes: u64) -> Self {
        self.max_chunk_size = bytes;
        self
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_retry_interval(mut self, d: Duration) -> Self {
        self.retry_interval = d;
        self
    }

    pub fn with_continue_on_error(mut self, yes: bool) -> Self {
        self.continue_on_error = yes;
        self
    }

    pub fn with_expected_sha256(mut self, hex: impl Into<String>) -> Self {
        self.expected_sha256 = Some(hex.into().trim().to_ascii_lowercase());
        self
    }

    pub fn with_overwrite(mut self, yes: bool) -> Self {
        self.overwrite = yes;
        self
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    /// Probe result; `None` until the probe ran.
    pub fn remote(&self) -> Option<&RemoteInfo> {
        self.remote.as_ref()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_interval)
    }

    pub fn validate(&self) -> Result<(), DownloadError> {
        if let Err(e) = url::Url::parse(&self.url) {
            return Err(DownloadError::InvalidJob(format!("bad url {:?}: {}", self.url, e)));
        }
        if self.max_chunk_size == 0 {
            return Err(DownloadError::InvalidJob("max chunk size must be > 0".into()));
        }
        if self.max_workers == 0 {
            return Err(DownloadError::InvalidJob("max workers must be > 0".into()));
        }
        if let Some(name) = &self.file_name {
            if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
                return Err(DownloadError::InvalidJob(format!("bad file name {:?}", name)));
            }
        }
        if let Some(hex) = &self.expected_sha256 {
            if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(DownloadError::InvalidJob(format!("bad sha256 {:?}", hex)));
            }
        }
        Ok(())
    }

    pub(crate) fn set_phase(&mut self, phase: JobPhase) {
        if self.phase != phase {
            tracing::info!(url = %self.url, from = %self.phase, to = %phase, "job phase");
            self.phase = phase;
        }
    }

    pub(crate) fn set_remote(&mut self, info: RemoteInfo) {
        self.remote = Some(info);
    }
}
