//! Job orchestration.
//!
//! [`Downloader::run`] drives one [`DownloadJob`] through probe, plan,
//! transfer and publish. Network and disk work is blocking (curl, positioned
//! writes) and runs on `spawn_blocking`; the chunked path fans out to a
//! bounded pool of worker threads. Progress is aggregated on the runtime.

mod chunk;
mod finish;
mod pool;
mod single;
mod state;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::control::AbortToken;
use crate::error::DownloadError;
use crate::http::HttpClient;
use crate::job::{DownloadJob, JobPhase};
use crate::manifest::{remove_if_exists, Manifest, ManifestLayout};
use crate::planner::{Chunk, TransferPlan};
use crate::probe::probe;
use crate::progress::{spawn_aggregator, AggregatorHandle, ProgressReporter, ProgressSink};
use crate::retry::FetchError;
use crate::storage::{self, StorageWriterBuilder};
use crate::url_model::derive_filename;

use self::pool::{run_pool, PoolInput};
use self::state::{JobReport, JobState};

/// Retry and throttle counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub retries: u32,
    pub throttle_events: u32,
    pub error_events: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Chunked,
    SingleStream,
    Empty,
}

/// What a committed job produced.
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub final_path: PathBuf,
    pub mode: TransferMode,
    pub total_bytes: u64,
    /// Chunks fetched by this run.
    pub fetched_chunks: usize,
    /// Chunks already recorded by an earlier run.
    pub resumed_chunks: usize,
    /// Failed chunks published as zeros (`continue_on_error` only).
    pub gaps: Vec<Chunk>,
    pub summary: DownloadSummary,
}

pub struct Downloader {
    client: Arc<dyn HttpClient>,
    progress: Option<ProgressSink>,
    progress_interval: Duration,
    abort: AbortToken,
}

impl Downloader {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self {
            client,
            progress: None,
            progress_interval: Duration::from_millis(1000),
            abort: AbortToken::new(),
        }
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Share an externally owned token (e.g. one wired to Ctrl-C).
    pub fn with_abort(mut self, abort: AbortToken) -> Self {
        self.abort = abort;
        self
    }

    pub fn abort_token(&self) -> AbortToken {
        self.abort.clone()
    }

    /// Run `job` to completion. On success the file is at
    /// `DownloadOutcome::final_path` and no temp file or manifest remains.
    pub async fn run(&self, job: &mut DownloadJob) -> Result<DownloadOutcome, DownloadError> {
        let result = self.drive(job).await;
        match &result {
            Ok(outcome) => {
                job.set_phase(JobPhase::Committed);
                tracing::info!(
                    path = %outcome.final_path.display(),
                    bytes = outcome.total_bytes,
                    fetched = outcome.fetched_chunks,
                    resumed = outcome.resumed_chunks,
                    retries = outcome.summary.retries,
                    "job finished"
                );
            }
            Err(e) => {
                job.set_phase(JobPhase::Failed);
                if e.is_cancelled() {
                    tracing::info!(url = %job.url, "job cancelled");
                } else {
                    tracing::error!(
                        url = %job.url,
                        cause = ?std::error::Error::source(e),
                        "job failed: {}",
                        e
                    );
                }
            }
        }
        result
    }

    async fn drive(&self, job: &mut DownloadJob) -> Result<DownloadOutcome, DownloadError> {
        job.validate()?;
        self.check_abort()?;

        job.set_phase(JobPhase::Probing);
        let info = {
            let client = Arc::clone(&self.client);
            let url = job.url.clone();
            let abort = self.abort.clone();
            blocking(move || probe(client.as_ref(), &url, &abort)).await?
        };
        self.check_abort()?;

        let name = match &job.file_name {
            Some(n) => n.clone(),
            None => derive_filename(&info.resolved_url, info.content_disposition.as_deref()),
        };
        tokio::fs::create_dir_all(&job.save_dir)
            .await
            .map_err(|e| DownloadError::io(format!("create {}", job.save_dir.display()), e))?;
        let final_path = job.save_dir.join(&name);
        check_target(&final_path, job.overwrite).await?;
        let temp_path = storage::temp_path(&final_path);

        let plan = TransferPlan::choose(&info, job.max_chunk_size)?;
        let url = info.resolved_url.clone();
        let total = info.content_length;
        let validators = (info.etag.clone(), info.last_modified.clone());
        job.set_remote(info);

        match plan {
            TransferPlan::Empty => self.run_empty(job, final_path, temp_path).await,
            TransferPlan::Chunked(chunks) => {
                job.set_phase(JobPhase::MultiChunk);
                let (etag, last_modified) = validators;
                let size = chunks.last().map_or(0, |c| c.end + 1);
                let layout = ManifestLayout::new(size, job.max_chunk_size)
                    .with_validators(etag, last_modified);
                self.run_chunked(job, url, chunks, layout, final_path, temp_path)
                    .await
            }
            TransferPlan::SingleStream => {
                job.set_phase(JobPhase::SingleStream);
                self.run_stream(job, url, total, final_path, temp_path)
                    .await
            }
        }
    }

    async fn run_empty(
        &self,
        job: &mut DownloadJob,
        final_path: PathBuf,
        temp_path: PathBuf,
    ) -> Result<DownloadOutcome, DownloadError> {
        job.set_phase(JobPhase::Finalizing);
        let (reporter, aggregator) = self.start_progress(Some(0), 0);
        let expected = job.expected_sha256.clone();
        let target = final_path.clone();
        let result = blocking(move || {
            drop(reporter);
            discard_stale_manifest(&temp_path);
            let storage = StorageWriterBuilder::create(&temp_path)
                .map_err(DownloadError::Storage)?
                .build();
            finish::publish(storage, &target, expected.as_deref(), None)
        })
        .await;
        finish_progress(aggregator).await;
        result?;
        Ok(DownloadOutcome {
            final_path,
            mode: TransferMode::Empty,
            total_bytes: 0,
            fetched_chunks: 0,
            resumed_chunks: 0,
            gaps: Vec::new(),
            summary: DownloadSummary::default(),
        })
    }

    async fn run_chunked(
        &self,
        job: &mut DownloadJob,
        url: String,
        chunks: Vec<Chunk>,
        layout: ManifestLayout,
        final_path: PathBuf,
        temp_path: PathBuf,
    ) -> Result<DownloadOutcome, DownloadError> {
        let total = layout.total_size;
        let chunk_count = chunks.len();
        let (storage, manifest) = {
            let temp_path = temp_path.clone();
            blocking(move || {
                let (storage, reused) =
                    storage::open_for_chunks(&temp_path, total).map_err(DownloadError::Storage)?;
                let path = Manifest::path_for(&temp_path);
                let mut manifest = Manifest::load(&path, layout, chunk_count)
                    .map_err(|e| DownloadError::io(format!("read manifest {}", path.display()), e))?;
                if !reused {
                    manifest
                        .reset()
                        .map_err(|e| DownloadError::io(format!("reset manifest {}", path.display()), e))?;
                }
                Ok((storage, manifest))
            })
            .await?
        };

        let pending: Vec<Chunk> = chunks
            .iter()
            .filter(|c| !manifest.is_complete(c.index))
            .copied()
            .collect();
        let resumed_chunks = chunk_count - pending.len();
        let already_done: u64 = chunks
            .iter()
            .filter(|c| manifest.is_complete(c.index))
            .map(Chunk::len)
            .sum();
        tracing::info!(
            total,
            chunks = chunk_count,
            resumed = resumed_chunks,
            pending = pending.len(),
            workers = job.max_workers,
            "starting chunked transfer"
        );

        let state = Arc::new(JobState::new(manifest, job.continue_on_error));
        let (reporter, aggregator) = self.start_progress(Some(total), already_done);
        let input = PoolInput {
            client: Arc::clone(&self.client),
            url,
            storage: storage.clone(),
            pending,
            max_workers: job.max_workers,
            policy: job.retry_policy(),
            state: Arc::clone(&state),
            progress: reporter,
            abort: self.abort.clone(),
        };
        let pool_result = blocking(move || run_pool(input)).await;
        finish_progress(aggregator).await;
        pool_result?;
        // Bytes and manifest stay on disk for the next run.
        self.check_abort()?;

        let state = Arc::try_unwrap(state)
            .map_err(|_| DownloadError::Internal("job state still shared after pool exit".into()))?;
        let mut report = state.into_report();
        job.set_phase(JobPhase::Finalizing);
        let gaps = finish::check_chunked(&mut report, &chunks, job.continue_on_error)?;

        let JobReport {
            mut manifest,
            completed_this_run,
            summary,
            ..
        } = report;
        let expected = job.expected_sha256.clone();
        let target = final_path.clone();
        let to_fill = gaps.clone();
        blocking(move || {
            finish::zero_fill_gaps(&storage, &to_fill)?;
            finish::publish(storage, &target, expected.as_deref(), Some(&mut manifest))
        })
        .await?;

        Ok(DownloadOutcome {
            final_path,
            mode: TransferMode::Chunked,
            total_bytes: total,
            fetched_chunks: completed_this_run.len(),
            resumed_chunks,
            gaps,
            summary,
        })
    }

    async fn run_stream(
        &self,
        job: &mut DownloadJob,
        url: String,
        total: Option<u64>,
        final_path: PathBuf,
        temp_path: PathBuf,
    ) -> Result<DownloadOutcome, DownloadError> {
        tracing::info!(size = ?total, "server does not support ranges, streaming");
        let (reporter, aggregator) = self.start_progress(total, 0);
        let streamed = {
            let client = Arc::clone(&self.client);
            let abort = self.abort.clone();
            blocking(move || {
                Ok(single::run_single_stream(
                    client.as_ref(),
                    &url,
                    &temp_path,
                    total,
                    &reporter,
                    &abort,
                ))
            })
            .await
        };
        finish_progress(aggregator).await;

        let (storage, bytes) = match streamed? {
            Ok(done) => done,
            Err(_) if self.abort.is_aborted() => return Err(DownloadError::Cancelled),
            Err(FetchError::Aborted) => return Err(DownloadError::Cancelled),
            Err(e) => return Err(DownloadError::Stream(e)),
        };

        job.set_phase(JobPhase::Finalizing);
        let expected = job.expected_sha256.clone();
        let target = final_path.clone();
        blocking(move || finish::publish(storage, &target, expected.as_deref(), None)).await?;

        Ok(DownloadOutcome {
            final_path,
            mode: TransferMode::SingleStream,
            total_bytes: bytes,
            fetched_chunks: 0,
            resumed_chunks: 0,
            gaps: Vec::new(),
            summary: DownloadSummary::default(),
        })
    }

    fn check_abort(&self) -> Result<(), DownloadError> {
        if self.abort.is_aborted() {
            return Err(DownloadError::Cancelled);
        }
        Ok(())
    }

    fn start_progress(
        &self,
        total: Option<u64>,
        already_done: u64,
    ) -> (ProgressReporter, Option<AggregatorHandle>) {
        match &self.progress {
            Some(sink) => {
                let (reporter, handle) = spawn_aggregator(
                    Arc::clone(sink),
                    total,
                    already_done,
                    self.progress_interval,
                    self.abort.clone(),
                );
                (reporter, Some(handle))
            }
            None => (ProgressReporter::disabled(), None),
        }
    }
}

async fn finish_progress(aggregator: Option<AggregatorHandle>) {
    if let Some(handle) = aggregator {
        handle.finish().await;
    }
}

async fn blocking<T, F>(f: F) -> Result<T, DownloadError>
where
    F: FnOnce() -> Result<T, DownloadError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DownloadError::Internal(format!("blocking task failed: {}", e)))?
}

/// Refuse a final path that is a directory, or an existing file unless
/// `overwrite` is set. Runs before any temp or manifest work.
async fn check_target(final_path: &Path, overwrite: bool) -> Result<(), DownloadError> {
    let meta = match tokio::fs::metadata(final_path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(DownloadError::io(format!("stat {}", final_path.display()), e)),
    };
    if meta.is_dir() {
        return Err(DownloadError::TargetIsDirectory {
            path: final_path.to_path_buf(),
        });
    }
    if !overwrite {
        return Err(DownloadError::TargetExists {
            path: final_path.to_path_buf(),
        });
    }
    tracing::info!(path = %final_path.display(), "existing file will be replaced");
    Ok(())
}

fn discard_stale_manifest(temp_path: &Path) {
    if let Err(e) = remove_if_exists(&Manifest::path_for(temp_path)) {
        tracing::warn!("could not remove stale manifest: {}", e);
    }
}
