//! Integration test: local HTTP server with Range support, chunked download,
//! fallback and resume through the curl client.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::range_server::{self, RangeServerOptions};
use pdl_core::manifest::Manifest;
use pdl_core::storage::temp_path;
use pdl_core::{CurlClient, DownloadError, DownloadJob, Downloader, HttpClient, TransferMode};
use tempfile::tempdir;

fn downloader() -> Downloader {
    let client: Arc<dyn HttpClient> = Arc::new(CurlClient::new());
    Downloader::new(client)
}

fn body(len: usize) -> Vec<u8> {
    (0u8..100).cycle().take(len).collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn chunked_download_completes_and_file_matches() {
    let data = body(64 * 1024);
    let server = range_server::start(data.clone());
    let dir = tempdir().unwrap();
    let mut job = DownloadJob::new(server.url("blob.bin"), dir.path())
        .with_max_chunk_size(16 * 1024)
        .with_max_workers(3);

    let outcome = downloader().run(&mut job).await.expect("download");

    assert_eq!(outcome.mode, TransferMode::Chunked);
    assert_eq!(outcome.fetched_chunks, 4);
    let final_path = dir.path().join("blob.bin");
    assert_eq!(outcome.final_path, final_path);
    assert_eq!(std::fs::read(&final_path).unwrap(), data, "file content must match");
    assert!(!temp_path(&final_path).exists());
    assert_eq!(server.gets().len(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn redirect_is_followed_and_names_the_file() {
    let data = body(10_000);
    let server = range_server::start(data.clone());
    let dir = tempdir().unwrap();
    let mut job = DownloadJob::new(server.url("moved"), dir.path()).with_max_chunk_size(4_096);

    let outcome = downloader().run(&mut job).await.expect("download");

    assert_eq!(outcome.final_path, dir.path().join("blob.bin"));
    assert!(job.remote().unwrap().resolved_url.ends_with("/blob.bin"));
    assert_eq!(std::fs::read(&outcome.final_path).unwrap(), data);
}

#[tokio::test(flavor = "multi_thread")]
async fn server_without_ranges_uses_single_stream() {
    let data = body(20_000);
    let server = range_server::start_with_options(
        data.clone(),
        RangeServerOptions {
            support_ranges: false,
            advertise_ranges: false,
            ..Default::default()
        },
    );
    let dir = tempdir().unwrap();
    let mut job = DownloadJob::new(server.url("blob.bin"), dir.path()).with_max_chunk_size(4_096);

    let outcome = downloader().run(&mut job).await.expect("download");

    assert_eq!(outcome.mode, TransferMode::SingleStream);
    assert_eq!(server.gets(), vec![None]);
    assert_eq!(std::fs::read(&outcome.final_path).unwrap(), data);
    assert!(!Manifest::path_for(&temp_path(&outcome.final_path)).exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_chunk_is_resumed_by_next_run() {
    let data = body(40_000);
    let chunk = 10_000u64;
    let server = range_server::start_with_options(
        data.clone(),
        RangeServerOptions {
            fail_range: Some((2 * chunk, 2)),
            ..Default::default()
        },
    );
    let dir = tempdir().unwrap();
    let final_path = dir.path().join("blob.bin");
    let job = DownloadJob::new(server.url("blob.bin"), dir.path())
        .with_max_chunk_size(chunk)
        .with_max_workers(1)
        .with_max_retries(2)
        .with_retry_interval(Duration::ZERO);

    let err = downloader().run(&mut job.clone()).await.unwrap_err();
    assert!(
        matches!(err, DownloadError::ChunkExhausted { index: 2, attempts: 2, .. }),
        "{:?}",
        err
    );
    assert!(!final_path.exists());
    assert!(Manifest::path_for(&temp_path(&final_path)).exists());
    let before = server.gets().len();

    let outcome = downloader().run(&mut job.clone()).await.expect("resume");

    assert_eq!(outcome.resumed_chunks, 2);
    assert_eq!(outcome.fetched_chunks, 2);
    let resumed: Vec<_> = server.gets()[before..].to_vec();
    assert_eq!(
        resumed,
        vec![Some((2 * chunk, 3 * chunk - 1)), Some((3 * chunk, 4 * chunk - 1))]
    );
    assert_eq!(std::fs::read(&final_path).unwrap(), data);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_resource_fails_the_probe() {
    let server = range_server::start(body(100));
    let dir = tempdir().unwrap();
    let mut job = DownloadJob::new(server.url("nope"), dir.path());

    let err = downloader().run(&mut job).await.unwrap_err();

    assert!(matches!(err, DownloadError::ProbeStatus { status: 404, .. }), "{:?}", err);
}
