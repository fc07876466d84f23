//! Aggregator task: sums worker deltas and emits samples on a fixed tick.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::{ProgressReporter, ProgressSample, ProgressSink, CHANNEL_CAPACITY};
use crate::control::AbortToken;

/// Owner side of a running aggregator.
pub(crate) struct AggregatorHandle {
    done: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl AggregatorHandle {
    /// Ask for the final sample (skipped if the job was cancelled) and wait
    /// for the task to exit.
    pub(crate) async fn finish(self) {
        let _ = self.done.send(());
        if let Err(e) = self.join.await {
            tracing::warn!("progress aggregator ended abnormally: {}", e);
        }
    }
}

struct Counter {
    total_size: Option<u64>,
    transferred: i64,
    last_transferred: i64,
    last_at: Instant,
}

impl Counter {
    fn sample(&mut self) -> ProgressSample {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_at).as_secs_f64();
        let delta = (self.transferred - self.last_transferred) as f64;
        let speed = if elapsed > 0.0 { (delta / elapsed).max(0.0) } else { 0.0 };
        self.last_transferred = self.transferred;
        self.last_at = now;
        ProgressSample {
            total_size: self.total_size,
            transferred: self.transferred.max(0) as u64,
            speed,
        }
    }
}

/// Start the aggregator on the current runtime. `already_done` is the byte
/// count recorded by earlier runs (resumed chunks).
pub(crate) fn spawn_aggregator(
    sink: ProgressSink,
    total_size: Option<u64>,
    already_done: u64,
    interval: Duration,
    abort: AbortToken,
) -> (ProgressReporter, AggregatorHandle) {
    let (reporter, rx, overflow) = ProgressReporter::channel(CHANNEL_CAPACITY);
    let (done_tx, done_rx) = oneshot::channel();
    let counter = Counter {
        total_size,
        transferred: already_done.min(i64::MAX as u64) as i64,
        last_transferred: already_done.min(i64::MAX as u64) as i64,
        last_at: Instant::now(),
    };
    let join = tokio::spawn(run(sink, counter, rx, overflow, interval, abort, done_rx));
    (
        reporter,
        AggregatorHandle {
            done: done_tx,
            join,
        },
    )
}

async fn run(
    sink: ProgressSink,
    mut counter: Counter,
    mut rx: mpsc::Receiver<i64>,
    overflow: Arc<AtomicI64>,
    interval: Duration,
    abort: AbortToken,
    mut done: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = &mut done => {
                while let Ok(d) = rx.try_recv() {
                    counter.transferred += d;
                }
                counter.transferred += overflow.swap(0, Ordering::Relaxed);
                if !abort.is_aborted() {
                    sink(counter.sample());
                }
                return;
            }
            Some(d) = rx.recv() => counter.transferred += d,
            _ = ticker.tick() => {
                if abort.is_aborted() {
                    return;
                }
                counter.transferred += overflow.swap(0, Ordering::Relaxed);
                sink(counter.sample());
            }
        }
    }
}
