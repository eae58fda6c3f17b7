use futures_util::StreamExt;
use reqwest::{header, Client, StatusCode};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::DownloadError;
use crate::plan::ChunkSpec;
use crate::progress::ProgressCounters;

/// Fetches the bytes still missing from one chunk's window.
///
/// Bytes already on disk are detected up front, credited to the counters,
/// and never re-fetched; only the missing suffix goes over the wire. Each
/// failed attempt leaves its partial bytes in place, so the next attempt
/// (or the next invocation of the whole transfer) resumes behind them.
/// Returns the number of bytes written by the successful attempt.
pub async fn fetch_chunk(
    client: &Client,
    url: &str,
    extra_headers: &header::HeaderMap,
    ranged: bool,
    chunk: &ChunkSpec,
    progress: &ProgressCounters,
    retry_limit: u32,
) -> Result<u64, DownloadError> {
    let mut credited = 0;
    let mut attempt = 0;
    loop {
        match fetch_once(client, url, extra_headers, ranged, chunk, progress, &mut credited).await {
            Ok(written) => return Ok(written),
            Err(e) => {
                if attempt >= retry_limit {
                    return Err(e);
                }
                attempt += 1;
                warn!(
                    chunk = %chunk.path.display(),
                    attempt,
                    retry_limit,
                    "chunk transfer failed, retrying: {e}"
                );
            }
        }
    }
}

async fn fetch_once(
    client: &Client,
    url: &str,
    extra_headers: &header::HeaderMap,
    ranged: bool,
    chunk: &ChunkSpec,
    progress: &ProgressCounters,
    credited: &mut u64,
) -> Result<u64, DownloadError> {
    let existing = match fs::metadata(&chunk.path).await {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => 0,
    };

    if existing > chunk.len {
        return Err(DownloadError::ChunkState {
            path: chunk.path.clone(),
            expected: chunk.len,
            actual: existing,
        });
    }

    if chunk.len == 0 {
        // An empty window needs no request, only its (empty) file so that
        // merge finds every planned chunk on disk.
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .open(&chunk.path)
            .await?;
        return Ok(0);
    }

    // Without range support a shorter partial cannot be continued; it gets
    // rewritten from byte zero, and its bytes only count once written again.
    let resume = ranged && existing > 0;
    if resume || existing == chunk.len {
        credit(progress, credited, existing);
    }

    if existing == chunk.len {
        debug!(chunk = %chunk.path.display(), "chunk already complete on disk");
        return Ok(0);
    }

    let mut request = client.get(url).headers(extra_headers.clone());
    if ranged {
        let effective_start = chunk.start + existing;
        request = request.header(
            header::RANGE,
            format!("bytes={}-{}", effective_start, chunk.end()),
        );
    }

    let response = request
        .send()
        .await
        .map_err(|e| transfer_error(chunk, e.to_string()))?;

    if ![StatusCode::OK, StatusCode::PARTIAL_CONTENT].contains(&response.status()) {
        return Err(transfer_error(
            chunk,
            format!("unexpected status {}", response.status()),
        ));
    }

    let mut file = fs::OpenOptions::new()
        .write(!resume)
        .append(resume)
        .truncate(!resume)
        .create(true)
        .open(&chunk.path)
        .await?;

    let mut cumulative = if resume { existing } else { 0 };
    let mut written = 0;
    let mut stream = response.bytes_stream();

    while let Some(block) = stream.next().await {
        let block = block.map_err(|e| transfer_error(chunk, e.to_string()))?;
        file.write_all(&block).await?;
        written += block.len() as u64;
        cumulative += block.len() as u64;
        credit(progress, credited, cumulative);
    }
    file.flush().await?;

    Ok(written)
}

/// Adds only the not-yet-counted part of `cumulative` to the counters, so
/// that retries and resumed bytes never double-count.
fn credit(progress: &ProgressCounters, credited: &mut u64, cumulative: u64) {
    if cumulative > *credited {
        progress.add(cumulative - *credited);
        *credited = cumulative;
    }
}

fn transfer_error(chunk: &ChunkSpec, reason: String) -> DownloadError {
    DownloadError::ChunkTransfer {
        start: chunk.start,
        end: chunk.end(),
        reason,
    }
}
