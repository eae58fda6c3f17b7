use std::path::Path;

use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::error::DownloadError;
use crate::plan::ChunkSpec;

const COPY_BUF_SIZE: usize = 64 * 1024;

/// Assembles the chunk files into `dest` and tears down the partial
/// directory. Chunks are consumed in ascending window order and each source
/// file is deleted right after it has been fully copied, so peak disk usage
/// stays around one chunk above the final size. A single planned chunk is
/// renamed into place instead of copied. The partial directory goes away
/// wholesale, stale chunks from older plans included.
///
/// Every chunk file must hold exactly its window; a short one means its
/// transfer never finished, and padding or skipping it would assemble a
/// silently corrupt artifact. Returns the assembled size.
pub async fn merge_chunks(
    chunks: &[ChunkSpec],
    dest: &Path,
    partial_dir: &Path,
) -> Result<u64, DownloadError> {
    let mut ordered: Vec<&ChunkSpec> = chunks.iter().collect();
    ordered.sort_by_key(|chunk| chunk.start);

    for chunk in &ordered {
        let actual = match fs::metadata(&chunk.path).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };
        if actual != chunk.len {
            return Err(DownloadError::ChunkState {
                path: chunk.path.clone(),
                expected: chunk.len,
                actual,
            });
        }
    }

    if let [chunk] = ordered.as_slice() {
        fs::rename(&chunk.path, dest).await?;
    } else {
        let mut out = fs::File::create(dest).await?;
        let mut buf = vec![0u8; COPY_BUF_SIZE];
        for chunk in &ordered {
            let mut src = fs::File::open(&chunk.path).await?;
            loop {
                let read = src.read(&mut buf).await?;
                if read == 0 {
                    break;
                }
                out.write_all(&buf[..read]).await?;
            }
            drop(src);
            fs::remove_file(&chunk.path).await?;
        }
        out.flush().await?;
    }

    // Recursive removal: chunks planned by an earlier run with a different
    // chunk size may still be lying around, and the artifact is already
    // assembled at this point.
    fs::remove_dir_all(partial_dir).await?;

    let size = fs::metadata(dest).await?.len();
    debug!(dest = %dest.display(), size, "merged chunks");
    Ok(size)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::plan::plan;

    async fn write_chunks(chunks: &[ChunkSpec], payload: &[u8]) {
        fs::create_dir_all(chunks[0].path.parent().unwrap())
            .await
            .unwrap();
        for chunk in chunks {
            let start = chunk.start as usize;
            let end = start + chunk.len as usize;
            fs::write(&chunk.path, &payload[start..end]).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_merge_concatenates_in_window_order() {
        let dir = tempdir().unwrap();
        let partial_dir = dir.path().join("file.bin_partial");
        let dest = dir.path().join("file.bin");

        let payload: Vec<u8> = (0..1000u32).map(|n| (n % 251) as u8).collect();
        let chunks = plan(&partial_dir, 1000, 400, true);
        write_chunks(&chunks, &payload).await;

        let size = merge_chunks(&chunks, &dest, &partial_dir).await.unwrap();

        assert_eq!(size, 1000);
        assert_eq!(fs::read(&dest).await.unwrap(), payload);
        assert!(!partial_dir.exists());
    }

    #[tokio::test]
    async fn test_merge_single_chunk_moves_file() {
        let dir = tempdir().unwrap();
        let partial_dir = dir.path().join("file.bin_partial");
        let dest = dir.path().join("file.bin");

        let payload = b"whole resource in one window".to_vec();
        let chunks = plan(&partial_dir, payload.len() as u64, 1 << 20, false);
        write_chunks(&chunks, &payload).await;

        let size = merge_chunks(&chunks, &dest, &partial_dir).await.unwrap();

        assert_eq!(size, payload.len() as u64);
        assert_eq!(fs::read(&dest).await.unwrap(), payload);
        assert!(!partial_dir.exists());
    }

    #[tokio::test]
    async fn test_merge_empty_resource() {
        let dir = tempdir().unwrap();
        let partial_dir = dir.path().join("empty.bin_partial");
        let dest = dir.path().join("empty.bin");

        let chunks = plan(&partial_dir, 0, 400, true);
        fs::create_dir_all(&partial_dir).await.unwrap();
        fs::write(&chunks[0].path, b"").await.unwrap();

        let size = merge_chunks(&chunks, &dest, &partial_dir).await.unwrap();

        assert_eq!(size, 0);
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn test_merge_tolerates_stale_chunks_from_older_plan() {
        let dir = tempdir().unwrap();
        let partial_dir = dir.path().join("file.bin_partial");
        let dest = dir.path().join("file.bin");

        let payload: Vec<u8> = (0..1000u32).map(|n| (n % 251) as u8).collect();
        let chunks = plan(&partial_dir, 1000, 400, true);
        write_chunks(&chunks, &payload).await;
        // Leftover from a previous run planned with a different chunk size.
        fs::write(partial_dir.join("chunk_0_499"), vec![1u8; 77])
            .await
            .unwrap();

        let size = merge_chunks(&chunks, &dest, &partial_dir).await.unwrap();

        assert_eq!(size, 1000);
        assert_eq!(fs::read(&dest).await.unwrap(), payload);
        assert!(!partial_dir.exists());
    }

    #[tokio::test]
    async fn test_merge_refuses_short_chunk() {
        let dir = tempdir().unwrap();
        let partial_dir = dir.path().join("file.bin_partial");
        let dest = dir.path().join("file.bin");

        let payload: Vec<u8> = vec![9u8; 1000];
        let chunks = plan(&partial_dir, 1000, 400, true);
        write_chunks(&chunks, &payload).await;
        // Truncate the middle chunk as an interrupted transfer would leave it.
        fs::write(&chunks[1].path, vec![9u8; 123]).await.unwrap();

        let result = merge_chunks(&chunks, &dest, &partial_dir).await;

        assert!(matches!(
            result,
            Err(DownloadError::ChunkState {
                expected: 400,
                actual: 123,
                ..
            })
        ));
        // Nothing was consumed; every partial file is still there for resume.
        for chunk in &chunks {
            assert!(chunk.path.exists());
        }
        assert!(!dest.exists());
    }
}
