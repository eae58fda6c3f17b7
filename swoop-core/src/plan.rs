use std::path::{Path, PathBuf};

/// Floor for derived chunk sizes, matching the 10 MiB minimum a request
/// falls back to when it does not pin one explicitly.
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// One contiguous byte window of the resource, fetched and stored
/// independently of its siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpec {
    /// Absolute offset of the window's first byte.
    pub start: u64,
    /// Window length in bytes. Zero for an empty resource.
    pub len: u64,
    /// On-disk location of the chunk's partial file.
    pub path: PathBuf,
}

impl ChunkSpec {
    /// Inclusive last byte of the window. Equals `start` when `len == 0`,
    /// in which case no byte exists and callers must check `len` first.
    pub fn end(&self) -> u64 {
        self.start + self.len.saturating_sub(1)
    }
}

/// Splits `total_size` bytes into ascending, contiguous, non-overlapping
/// windows of at most `chunk_size` bytes, one `ChunkSpec` per window.
///
/// Without range support the whole resource is a single window. The output
/// is a pure function of the inputs: re-planning after a crash reproduces
/// the same windows and the same file names, which is what lets partial
/// files on disk be matched back to their windows on resume.
pub fn plan(partial_dir: &Path, total_size: u64, chunk_size: u64, ranged: bool) -> Vec<ChunkSpec> {
    let chunk_size = chunk_size.max(1);

    if !ranged || total_size == 0 {
        return vec![ChunkSpec {
            start: 0,
            len: total_size,
            path: chunk_path(partial_dir, 0, total_size.saturating_sub(1)),
        }];
    }

    let mut chunks = Vec::with_capacity((total_size / chunk_size + 1) as usize);
    let mut start = 0;
    while start < total_size {
        let len = chunk_size.min(total_size - start);
        chunks.push(ChunkSpec {
            start,
            len,
            path: chunk_path(partial_dir, start, start + len - 1),
        });
        start += len;
    }
    chunks
}

fn chunk_path(partial_dir: &Path, start: u64, end: u64) -> PathBuf {
    partial_dir.join(format!("chunk_{start}_{end}"))
}
