pub mod config;
pub mod logging;

pub mod checksum;
pub mod control;
pub mod downloader;
pub mod error;
pub mod http;
pub mod job;
pub mod manifest;
pub mod planner;
pub mod probe;
pub mod progress;
pub mod retry;
pub mod storage;
pub mod url_model;

#[cfg(test)]
mod testing;

pub use control::AbortToken;
pub use downloader::{DownloadOutcome, DownloadSummary, Downloader, TransferMode};
pub use error::DownloadError;
pub use http::{CurlClient, HttpClient};
pub use job::{DownloadJob, JobPhase};
pub use progress::{ProgressSample, ProgressSink};
