use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// The probe could not establish enough about the resource to start a
    /// transfer. No bytes were fetched.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// A chunk's network transfer ended before its window was filled.
    /// Partial data stays on disk for the next invocation to resume.
    #[error("chunk {start}-{end} transfer failed: {reason}")]
    ChunkTransfer { start: u64, end: u64, reason: String },

    /// A chunk file's observed size does not fit its byte window.
    #[error("chunk file {} holds {actual} bytes, expected {expected}", path.display())]
    ChunkState {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("filesystem failure: {0}")]
    Filesystem(#[from] std::io::Error),

    /// A pool task panicked or was torn down before completing.
    #[error("worker task failed: {0}")]
    Worker(String),
}
