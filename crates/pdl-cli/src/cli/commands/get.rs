//! `pdl get` – download one URL with a live progress line.

use anyhow::{Context, Result};
use pdl_core::config::PdlConfig;
use pdl_core::{CurlClient, DownloadJob, Downloader, HttpClient, ProgressSample, ProgressSink};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::GetArgs;

const MIB: f64 = 1_048_576.0;

pub async fn run_get(args: GetArgs, cfg: &PdlConfig) -> Result<()> {
    let dir = match args.dir {
        Some(d) => d,
        None => std::env::current_dir().context("current directory")?,
    };
    let mut job = DownloadJob::from_config(&args.url, dir, cfg);
    if let Some(name) = args.output {
        job = job.with_file_name(name);
    }
    if let Some(n) = args.workers {
        job = job.with_max_workers(n);
    }
    if let Some(bytes) = args.chunk_size {
        job = job.with_max_chunk_size(bytes);
    }
    if let Some(n) = args.retries {
        job = job.with_max_retries(n);
    }
    if let Some(secs) = args.retry_interval {
        let d = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("bad --retry-interval {}", secs))?;
        job = job.with_retry_interval(d);
    }
    if args.continue_on_error {
        job = job.with_continue_on_error(true);
    }
    if let Some(hex) = args.sha256 {
        job = job.with_expected_sha256(hex);
    }
    if args.overwrite {
        job = job.with_overwrite(true);
    }

    let client: Arc<dyn HttpClient> = Arc::new(CurlClient::new());
    let downloader = Downloader::new(client)
        .with_progress(progress_line())
        .with_progress_interval(cfg.progress_interval());

    let abort = downloader.abort_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping");
            abort.abort();
        }
    });

    let result = downloader.run(&mut job).await;
    println!();
    let outcome = match result {
        Ok(o) => o,
        Err(e) if e.is_cancelled() => {
            println!("Interrupted. Run the same command again to resume.");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    for gap in &outcome.gaps {
        println!(
            "warning: bytes {}-{} could not be fetched and were zero-filled",
            gap.start, gap.end
        );
    }
    let resumed = if outcome.resumed_chunks > 0 {
        format!(" ({} chunk(s) resumed)", outcome.resumed_chunks)
    } else {
        String::new()
    };
    println!(
        "Saved {} ({:.1} MiB){}",
        outcome.final_path.display(),
        outcome.total_bytes as f64 / MIB,
        resumed
    );
    Ok(())
}

fn progress_line() -> ProgressSink {
    Arc::new(|sample: ProgressSample| {
        let done = sample.transferred as f64 / MIB;
        let rate = sample.speed / MIB;
        let line = match (sample.total_size, sample.percent()) {
            (Some(total), Some(pct)) => format!(
                "\r  {:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  ",
                done,
                total as f64 / MIB,
                pct,
                rate
            ),
            _ => format!("\r  {:.1} MiB  {:.2} MiB/s  ", done, rate),
        };
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(line.as_bytes());
        let _ = out.flush();
    })
}
