use std::path::PathBuf;
use std::process;

use clap::Parser;
use swoop_core::{download, ProgressMode, TransferRequest, DEFAULT_MAX_WORKERS};

#[derive(Parser)]
#[clap(version, about = "Parallel chunked file downloader")]
struct Swoop {
    /// Url of the file to download
    #[clap(value_parser)]
    url: String,
    /// Directory to store the downloaded file
    #[clap(value_parser, default_value = ".")]
    output_dir: PathBuf,
    /// File name to use instead of the one the server reports
    #[clap(long, short)]
    filename: Option<String>,
    /// Maximum number of chunks downloading at the same time
    #[clap(long, default_value_t = DEFAULT_MAX_WORKERS)]
    max_workers: usize,
    /// Chunk size in bytes (derived from the file size when omitted)
    #[clap(long)]
    chunk_size: Option<u64>,
    /// Download over a single connection even if the server supports ranges
    #[clap(long)]
    single: bool,
    /// Fetch attempts per chunk after the first one fails
    #[clap(long, default_value_t = 0)]
    retries: u32,
    /// Print periodic byte counts instead of drawing a progress bar
    #[clap(long)]
    plain: bool,
    /// No progress output at all
    #[clap(long, short)]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = Swoop::parse();

    let mut request = TransferRequest::new(args.url, args.output_dir);
    request.file_name = args.filename;
    request.parallel = !args.single;
    request.chunk_size = args.chunk_size;
    request.max_workers = args.max_workers;
    request.retry_limit = args.retries;
    request.progress = if args.quiet {
        ProgressMode::None
    } else if args.plain {
        ProgressMode::Plain
    } else {
        ProgressMode::Bar
    };

    match download(request).await {
        Ok(result) if result.success => {
            println!(
                "File downloaded successfully\nOutput : {}",
                result.path.display()
            );
        }
        Ok(result) => {
            eprintln!(
                "Transfer incomplete, partial data kept for resume : {}",
                result.path.display()
            );
            process::exit(1);
        }
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}
