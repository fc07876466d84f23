//! Shared job state: the one lock every chunk worker goes through.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use super::DownloadSummary;
use crate::manifest::Manifest;
use crate::retry::{ErrorKind, Exhausted, FetchError};

/// First chunk that ran out of attempts.
#[derive(Debug)]
pub(crate) struct ChunkFailure {
    pub index: usize,
    pub attempts: u32,
    pub error: FetchError,
}

#[derive(Debug)]
struct Inner {
    manifest: Manifest,
    first_error: Option<ChunkFailure>,
    failed: BTreeSet<usize>,
    completed_this_run: Vec<usize>,
    halted: bool,
    summary: DownloadSummary,
}

/// Everything the finalizer needs once the pool is done.
#[derive(Debug)]
pub(crate) struct JobReport {
    pub manifest: Manifest,
    pub first_error: Option<ChunkFailure>,
    pub failed: BTreeSet<usize>,
    pub completed_this_run: Vec<usize>,
    pub summary: DownloadSummary,
}

#[derive(Debug)]
pub(crate) struct JobState {
    inner: Mutex<Inner>,
    continue_on_error: bool,
}

impl JobState {
    pub(crate) fn new(manifest: Manifest, continue_on_error: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                manifest,
                first_error: None,
                failed: BTreeSet::new(),
                completed_this_run: Vec::new(),
                halted: false,
                summary: DownloadSummary::default(),
            }),
            continue_on_error,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// False once a chunk failed for good and the job does not continue on error.
    pub(crate) fn should_dispatch(&self) -> bool {
        !self.lock().halted
    }

    /// Record a chunk whose bytes are already flushed.
    pub(crate) fn mark_complete(&self, index: usize) -> Result<(), FetchError> {
        let mut inner = self.lock();
        if inner.manifest.mark_complete(index).map_err(FetchError::Manifest)? {
            inner.completed_this_run.push(index);
        }
        Ok(())
    }

    pub(crate) fn record_attempt_failure(&self, kind: ErrorKind, will_retry: bool) {
        let mut inner = self.lock();
        let s = &mut inner.summary;
        match kind {
            ErrorKind::Aborted => return,
            ErrorKind::Throttled => s.throttle_events += 1,
            _ => s.error_events += 1,
        }
        if will_retry {
            s.retries += 1;
        }
    }

    /// A chunk ran out of attempts. The first one becomes the job's error;
    /// every one is remembered as failed.
    pub(crate) fn record_exhausted(&self, index: usize, exhausted: Exhausted) {
        let mut inner = self.lock();
        inner.failed.insert(index);
        if !self.continue_on_error {
            inner.halted = true;
        }
        if inner.first_error.is_none() {
            inner.first_error = Some(ChunkFailure {
                index,
                attempts: exhausted.attempts,
                error: exhausted.error,
            });
        }
    }

    pub(crate) fn into_report(self) -> JobReport {
        let inner = self.inner.into_inner().unwrap_or_else(|e| e.into_inner());
        JobReport {
            manifest: inner.manifest,
            first_error: inner.first_error,
            failed: inner.failed,
            completed_this_run: inner.completed_this_run,
            summary: inner.summary,
        }
    }
}
