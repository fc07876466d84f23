//! Bounded pool of OS threads pulling chunks from a shared queue.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::chunk::{fetch_chunk, ChunkContext};
use super::state::JobState;
use crate::control::AbortToken;
use crate::error::DownloadError;
use crate::http::HttpClient;
use crate::planner::Chunk;
use crate::progress::ProgressReporter;
use crate::retry::{run_with_retry, FetchError, RetryDecision, RetryPolicy};
use crate::storage::StorageWriter;

pub(super) struct PoolInput {
    pub client: Arc<dyn HttpClient>,
    pub url: String,
    pub storage: StorageWriter,
    pub pending: Vec<Chunk>,
    pub max_workers: usize,
    pub policy: RetryPolicy,
    pub state: Arc<JobState>,
    pub progress: ProgressReporter,
    pub abort: AbortToken,
}

/// Run every pending chunk to a terminal state. Blocking: call from
/// `spawn_blocking`. Returns once all workers have exited; chunk failures are
/// left in the [`JobState`], only pool-level problems are returned here.
pub(super) fn run_pool(input: PoolInput) -> Result<(), DownloadError> {
    let count = input.pending.len();
    if count == 0 {
        return Ok(());
    }
    let num_workers = input.max_workers.max(1).min(count);
    let work: Arc<Mutex<VecDeque<Chunk>>> = Arc::new(Mutex::new(input.pending.into_iter().collect()));
    tracing::debug!(chunks = count, workers = num_workers, "starting chunk pool");

    let mut handles = Vec::with_capacity(num_workers);
    let mut spawn_error = None;
    for n in 0..num_workers {
        let work = Arc::clone(&work);
        let client = Arc::clone(&input.client);
        let url = input.url.clone();
        let storage = input.storage.clone();
        let state = Arc::clone(&input.state);
        let progress = input.progress.clone();
        let abort = input.abort.clone();
        let policy = input.policy;
        let spawned = std::thread::Builder::new()
            .name(format!("pdl-chunk-{}", n))
            .spawn(move || {
                let ctx = ChunkContext {
                    client: client.as_ref(),
                    url: &url,
                    storage: &storage,
                    state: &state,
                    progress: &progress,
                    abort: &abort,
                };
                worker_loop(&ctx, &work, &policy);
            });
        match spawned {
            Ok(h) => handles.push(h),
            Err(e) => {
                spawn_error = Some(DownloadError::io("spawn chunk worker", e));
                break;
            }
        }
    }

    let mut panicked = false;
    for h in handles {
        panicked |= h.join().is_err();
    }
    if let Some(e) = spawn_error {
        return Err(e);
    }
    if panicked {
        return Err(DownloadError::Internal("chunk worker panicked".into()));
    }
    Ok(())
}

fn worker_loop(ctx: &ChunkContext<'_>, work: &Mutex<VecDeque<Chunk>>, policy: &RetryPolicy) {
    loop {
        if ctx.abort.is_aborted() || !ctx.state.should_dispatch() {
            break;
        }
        let chunk = match work.lock().unwrap_or_else(|e| e.into_inner()).pop_front() {
            Some(c) => c,
            None => break,
        };
        let result = run_with_retry(
            policy,
            ctx.abort,
            |attempt| {
                tracing::debug!(index = chunk.index, range = %chunk.range_header(), attempt, "fetch chunk");
                fetch_chunk(ctx, &chunk)
            },
            |attempt, err, kind, decision| {
                let retrying = matches!(decision, RetryDecision::RetryAfter(_));
                ctx.state.record_attempt_failure(kind, retrying);
                if retrying {
                    tracing::warn!(index = chunk.index, attempt, ?kind, "chunk attempt failed, retrying: {}", err);
                }
            },
        );
        match result {
            Ok(()) => tracing::debug!(index = chunk.index, "chunk complete"),
            Err(ex) if matches!(ex.error, FetchError::Aborted) => break,
            Err(ex) => {
                tracing::warn!(
                    index = chunk.index,
                    attempts = ex.attempts,
                    "chunk failed for good: {}",
                    ex.error
                );
                ctx.state.record_exhausted(chunk.index, ex);
            }
        }
    }
}
