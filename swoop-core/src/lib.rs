//! Parallel chunked HTTP downloader.
//!
//! Splits a remote resource into byte-range chunks, fetches them
//! concurrently through a bounded worker pool, and merges the chunk files
//! into the final artifact. Partial chunk files survive interrupted runs
//! and are resumed byte-exactly on the next invocation.

pub mod download;
pub mod error;
pub mod fetch;
pub mod merge;
pub mod plan;
pub mod pool;
pub mod probe;
pub mod progress;

pub use download::{download, TransferRequest, TransferResult, DEFAULT_MAX_WORKERS};
pub use error::DownloadError;
pub use plan::{ChunkSpec, DEFAULT_CHUNK_SIZE};
pub use pool::WorkerPool;
pub use probe::ResourceDescriptor;
pub use progress::{ProgressCounters, ProgressMode};
