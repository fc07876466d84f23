//! One attempt at one chunk: ranged GET, positioned writes, verify, record.

use std::io;

use super::state::JobState;
use crate::control::AbortToken;
use crate::http::{BodySink, HttpClient, HttpRequest, ResponseHead, TransportError};
use crate::planner::Chunk;
use crate::progress::ProgressReporter;
use crate::retry::FetchError;
use crate::storage::StorageWriter;

/// What every attempt of every chunk in a job shares.
pub(super) struct ChunkContext<'a> {
    pub client: &'a dyn HttpClient,
    pub url: &'a str,
    pub storage: &'a StorageWriter,
    pub state: &'a JobState,
    pub progress: &'a ProgressReporter,
    pub abort: &'a AbortToken,
}

/// Streams one range into the temp file. Only a 206 for exactly the
/// requested range is accepted; writes never leave the chunk's range.
struct ChunkSink<'a> {
    chunk: &'a Chunk,
    storage: &'a StorageWriter,
    progress: &'a ProgressReporter,
    written: u64,
    rejection: Option<FetchError>,
    overflowed: bool,
}

impl BodySink for ChunkSink<'_> {
    fn accept(&mut self, head: &ResponseHead) -> bool {
        if head.status != 206 {
            self.rejection = Some(FetchError::Http(head.status));
            return false;
        }
        let expected = (self.chunk.start, self.chunk.end);
        let got = head.content_range();
        if got != Some(expected) {
            self.rejection = Some(FetchError::RangeMismatch { expected, got });
            return false;
        }
        true
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let n = data.len() as u64;
        if self.written + n > self.chunk.len() {
            self.overflowed = true;
            return Err(io::Error::other("response longer than requested range"));
        }
        self.storage.write_at(self.chunk.start + self.written, data)?;
        self.written += n;
        self.progress.report(n as i64);
        Ok(())
    }
}

/// One attempt. On failure, bytes reported during the attempt are taken back
/// from the progress counter.
pub(super) fn fetch_chunk(ctx: &ChunkContext<'_>, chunk: &Chunk) -> Result<(), FetchError> {
    let mut sink = ChunkSink {
        chunk,
        storage: ctx.storage,
        progress: ctx.progress,
        written: 0,
        rejection: None,
        overflowed: false,
    };
    let request = HttpRequest::get(ctx.url).header("Range", chunk.range_header());
    let result = ctx.client.execute(&request, &mut sink, ctx.abort);

    let outcome = match result {
        Err(TransportError::Rejected) => Err(sink
            .rejection
            .take()
            .unwrap_or(FetchError::Transport(TransportError::Rejected))),
        Err(TransportError::Sink(_)) if sink.overflowed => Err(FetchError::Overflow {
            limit: chunk.len(),
        }),
        Err(e) => Err(FetchError::from(e)),
        Ok(_) if sink.written != chunk.len() => Err(FetchError::PartialTransfer {
            expected: chunk.len(),
            received: sink.written,
        }),
        Ok(_) => ctx
            .storage
            .sync()
            .map_err(FetchError::Storage)
            .and_then(|()| ctx.state.mark_complete(chunk.index)),
    };

    if outcome.is_err() {
        ctx.progress.report(-(sink.written as i64));
    }
    outcome
}
