//! Single-stream fallback: one GET, body written sequentially from offset 0.
//!
//! No manifest and no resume. Any failure removes the partial temp file, so
//! the next run starts over.

use std::io;
use std::path::Path;

use crate::control::AbortToken;
use crate::http::{BodySink, HttpClient, HttpRequest, ResponseHead, TransportError};
use crate::manifest::{remove_if_exists, Manifest};
use crate::progress::ProgressReporter;
use crate::retry::FetchError;
use crate::storage::{StorageWriter, StorageWriterBuilder};

struct StreamSink<'a> {
    storage: &'a StorageWriter,
    progress: &'a ProgressReporter,
    written: u64,
    rejection: Option<FetchError>,
}

impl BodySink for StreamSink<'_> {
    fn accept(&mut self, head: &ResponseHead) -> bool {
        if !head.is_success() {
            self.rejection = Some(FetchError::Http(head.status));
            return false;
        }
        true
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.storage.write_at(self.written, data)?;
        self.written += data.len() as u64;
        self.progress.report(data.len() as i64);
        Ok(())
    }
}

/// Download the whole body into a fresh `temp_path`. On success returns the
/// flushed writer and the byte count; on failure the temp file is gone.
pub(super) fn run_single_stream(
    client: &dyn HttpClient,
    url: &str,
    temp_path: &Path,
    expected_len: Option<u64>,
    progress: &ProgressReporter,
    abort: &AbortToken,
) -> Result<(StorageWriter, u64), FetchError> {
    // A leftover sidecar from an earlier chunked attempt means nothing here.
    if let Err(e) = remove_if_exists(&Manifest::path_for(temp_path)) {
        tracing::warn!("could not remove stale manifest: {}", e);
    }
    let storage = StorageWriterBuilder::create(temp_path)
        .map_err(FetchError::Storage)?
        .build();

    let result = stream_into(client, url, &storage, expected_len, progress, abort);
    match result {
        Ok(n) => Ok((storage, n)),
        Err(e) => {
            drop(storage);
            if let Err(rm) = remove_if_exists(temp_path) {
                tracing::warn!(path = %temp_path.display(), "could not remove partial file: {}", rm);
            }
            Err(e)
        }
    }
}

fn stream_into(
    client: &dyn HttpClient,
    url: &str,
    storage: &StorageWriter,
    expected_len: Option<u64>,
    progress: &ProgressReporter,
    abort: &AbortToken,
) -> Result<u64, FetchError> {
    let mut sink = StreamSink {
        storage,
        progress,
        written: 0,
        rejection: None,
    };
    let result = client.execute(&HttpRequest::get(url), &mut sink, abort);
    let written = sink.written;
    let outcome = match result {
        Err(TransportError::Rejected) => Err(sink
            .rejection
            .take()
            .unwrap_or(FetchError::Transport(TransportError::Rejected))),
        Err(e) => Err(FetchError::from(e)),
        Ok(_) => match expected_len {
            Some(expected) if expected != written => Err(FetchError::PartialTransfer {
                expected,
                received: written,
            }),
            _ => storage.sync().map(|()| written).map_err(FetchError::Storage),
        },
    };
    if outcome.is_err() {
        progress.report(-(written as i64));
    }
    outcome
}
