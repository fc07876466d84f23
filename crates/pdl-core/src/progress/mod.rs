//! Progress reporting.
//!
//! Workers push signed byte deltas through a cloneable [`ProgressReporter`];
//! a separate aggregator task sums them and hands periodic
//! [`ProgressSample`]s to the caller's sink. Reporting never blocks a worker:
//! when the channel is full the delta is parked in an atomic overflow counter
//! that the aggregator drains on its next tick.

mod aggregator;

pub(crate) use aggregator::{spawn_aggregator, AggregatorHandle};

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Buffered deltas before spilling into the overflow counter.
pub(crate) const CHANNEL_CAPACITY: usize = 1024;

/// One aggregate observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    /// `None` when the server did not report a size.
    pub total_size: Option<u64>,
    /// Bytes on disk for this job, including chunks from earlier runs.
    pub transferred: u64,
    /// Bytes per second since the previous sample.
    pub speed: f64,
}

impl ProgressSample {
    /// Completion in `[0, 100]`, or `None` when the size is unknown.
    pub fn percent(&self) -> Option<f64> {
        let total = self.total_size?;
        if total == 0 {
            return Some(100.0);
        }
        Some((self.transferred as f64 * 100.0 / total as f64).min(100.0))
    }
}

/// Caller-supplied callback; invoked from the aggregator task only.
pub type ProgressSink = Arc<dyn Fn(ProgressSample) + Send + Sync>;

/// Worker-side handle. Clone one per worker.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: Option<mpsc::Sender<i64>>,
    overflow: Arc<AtomicI64>,
}

impl ProgressReporter {
    /// Reporter that drops every delta (no sink configured).
    pub fn disabled() -> Self {
        Self {
            tx: None,
            overflow: Arc::new(AtomicI64::new(0)),
        }
    }

    pub(crate) fn channel(capacity: usize) -> (Self, mpsc::Receiver<i64>, Arc<AtomicI64>) {
        let (tx, rx) = mpsc::channel(capacity);
        let overflow = Arc::new(AtomicI64::new(0));
        (
            Self {
                tx: Some(tx),
                overflow: Arc::clone(&overflow),
            },
            rx,
            overflow,
        )
    }

    /// Record `delta` bytes (negative to take back bytes of a failed attempt).
    pub fn report(&self, delta: i64) {
        if delta == 0 {
            return;
        }
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(delta) {
            Ok(()) => {}
            Err(TrySendError::Full(d)) => {
                self.overflow.fetch_add(d, Ordering::Relaxed);
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
