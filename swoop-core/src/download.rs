use std::path::PathBuf;

use reqwest::header::HeaderMap;
use reqwest::Client;
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::DownloadError;
use crate::fetch::fetch_chunk;
use crate::merge::merge_chunks;
use crate::plan::{plan, DEFAULT_CHUNK_SIZE};
use crate::pool::WorkerPool;
use crate::probe::probe;
use crate::progress::{spawn_reporter, ProgressCounters, ProgressMode};

pub const DEFAULT_MAX_WORKERS: usize = 8;

/// Everything one transfer needs to know up front. Immutable once
/// [`download`] takes it.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Url of the resource to fetch.
    pub url: String,
    /// Directory receiving the final artifact. Created if missing.
    pub dest_dir: PathBuf,
    /// Overrides the file name the probe would otherwise resolve.
    pub file_name: Option<String>,
    /// When false, forces a single whole-resource chunk even if the server
    /// supports ranges.
    pub parallel: bool,
    /// Chunk size in bytes. `None` derives one from the resource size and
    /// worker cap, with a [`DEFAULT_CHUNK_SIZE`] floor.
    pub chunk_size: Option<u64>,
    /// Upper bound on concurrently fetching chunks.
    pub max_workers: usize,
    /// How the reporter renders progress.
    pub progress: ProgressMode,
    /// Extra headers sent with the probe and every chunk request.
    pub headers: HeaderMap,
    /// Additional fetch attempts per chunk before it counts as failed.
    pub retry_limit: u32,
}

impl TransferRequest {
    pub fn new(url: impl Into<String>, dest_dir: impl Into<PathBuf>) -> Self {
        TransferRequest {
            url: url.into(),
            dest_dir: dest_dir.into(),
            file_name: None,
            parallel: true,
            chunk_size: None,
            max_workers: DEFAULT_MAX_WORKERS,
            progress: ProgressMode::None,
            headers: HeaderMap::new(),
            retry_limit: 0,
        }
    }
}

/// Outcome of one transfer. `success` holds exactly when the artifact's
/// on-disk size matches the size the probe reported.
#[derive(Debug, Clone)]
pub struct TransferResult {
    pub path: PathBuf,
    pub success: bool,
}

/// Runs the whole pipeline: probe the resource, plan its chunks, fetch them
/// concurrently (resuming whatever earlier runs left in the partial
/// directory), then merge into `<dest_dir>/<file_name>`.
///
/// A failed chunk does not abort the others; it surfaces as
/// `success == false` with every partial file kept on disk, so calling
/// [`download`] again picks up where this run stopped. Only filesystem and
/// probe failures are fatal. There is no cancellation or per-request
/// deadline: a stalled read stalls the transfer until the connection drops.
pub async fn download(request: TransferRequest) -> Result<TransferResult, DownloadError> {
    let client = Client::new();

    let descriptor = probe(
        &client,
        &request.url,
        &request.headers,
        request.file_name.as_deref(),
    )
    .await?;

    fs::create_dir_all(&request.dest_dir).await?;
    let dest = request.dest_dir.join(&descriptor.file_name);

    // A finished artifact from an earlier run needs no network at all.
    if descriptor.total_size > 0 {
        if let Ok(meta) = fs::metadata(&dest).await {
            if meta.is_file() && meta.len() == descriptor.total_size {
                debug!(path = %dest.display(), "destination already complete");
                return Ok(TransferResult {
                    path: dest,
                    success: true,
                });
            }
        }
    }

    let ranged = descriptor.accepts_ranges && request.parallel;
    let chunk_size = request.chunk_size.unwrap_or_else(|| {
        (descriptor.total_size / request.max_workers.max(1) as u64).max(DEFAULT_CHUNK_SIZE)
    });
    let partial_dir = request
        .dest_dir
        .join(format!("{}_partial", descriptor.file_name));

    let chunks = plan(&partial_dir, descriptor.total_size, chunk_size, ranged);
    fs::create_dir_all(&partial_dir).await?;

    info!(
        url = %request.url,
        total_size = descriptor.total_size,
        chunks = chunks.len(),
        ranged,
        "starting transfer"
    );

    let progress = ProgressCounters::new(descriptor.total_size);
    let reporter = spawn_reporter(progress.clone(), request.progress);

    let url = request.url.clone();
    let headers = request.headers.clone();
    let retry_limit = request.retry_limit;
    let worker_client = client.clone();
    let worker_progress = progress.clone();

    let barrier = WorkerPool::new(request.max_workers)
        .run(chunks.clone(), move |chunk| {
            let client = worker_client.clone();
            let url = url.clone();
            let headers = headers.clone();
            let progress = worker_progress.clone();
            async move {
                fetch_chunk(
                    &client,
                    &url,
                    &headers,
                    ranged,
                    &chunk,
                    &progress,
                    retry_limit,
                )
                .await
            }
        })
        .await;

    let outcomes = match barrier {
        Ok(outcomes) => outcomes,
        Err(e) => {
            stop_reporter(reporter);
            return Err(DownloadError::Worker(e.to_string()));
        }
    };

    let failed = outcomes.iter().filter(|outcome| outcome.is_err()).count();

    let result = if failed == 0 {
        let size = match merge_chunks(&chunks, &dest, &partial_dir).await {
            Ok(size) => size,
            Err(e) => {
                stop_reporter(reporter);
                return Err(e);
            }
        };
        TransferResult {
            success: size == descriptor.total_size,
            path: dest,
        }
    } else {
        for outcome in &outcomes {
            if let Err(e) = outcome {
                warn!("{e}");
            }
        }
        // Partial files stay put; the next invocation resumes behind them.
        warn!(failed, total = outcomes.len(), "transfer incomplete");
        TransferResult {
            success: false,
            path: dest,
        }
    };

    if let Some(handle) = reporter {
        if result.success {
            // Every expected byte is accounted for, so the reporter's loop
            // has already seen completion or will on its next tick.
            let _ = handle.await;
        } else {
            handle.abort();
        }
    }

    Ok(result)
}

/// Tears the reporter down on paths where `downloaded` will never reach
/// `expected` and its loop would poll forever.
fn stop_reporter(reporter: Option<JoinHandle<()>>) {
    if let Some(handle) = reporter {
        handle.abort();
    }
}
