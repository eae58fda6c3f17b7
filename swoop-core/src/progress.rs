use std::sync::{Arc, Mutex};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;

/// How the reporter renders the counters, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    None,
    Bar,
    Plain,
}

/// Consistent view of the counters at one point in time.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSnapshot {
    pub expected: u64,
    pub downloaded: u64,
}

#[derive(Debug)]
struct Counters {
    expected: u64,
    downloaded: u64,
}

/// Byte counters shared by every fetch worker and the reporter.
///
/// Workers add each written block's length under the lock; the total only
/// ever grows. On a fully successful transfer `downloaded` ends up equal to
/// `expected`, counting bytes found on disk at resume time as well as bytes
/// pulled over the network.
#[derive(Debug, Clone)]
pub struct ProgressCounters {
    inner: Arc<Mutex<Counters>>,
}

impl ProgressCounters {
    pub fn new(expected: u64) -> Self {
        ProgressCounters {
            inner: Arc::new(Mutex::new(Counters {
                expected,
                downloaded: 0,
            })),
        }
    }

    /// Credits `bytes` freshly accounted-for bytes.
    pub fn add(&self, bytes: u64) {
        let mut counters = self.inner.lock().unwrap();
        counters.downloaded += bytes;
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let counters = self.inner.lock().unwrap();
        ProgressSnapshot {
            expected: counters.expected,
            downloaded: counters.downloaded,
        }
    }
}

const REPORT_INTERVAL: Duration = Duration::from_millis(200);

/// Spawns the reporter task, which polls the counters on a fixed interval,
/// renders them per `mode`, and exits on its own once every expected byte
/// has been accounted for. Rendering happens outside the lock, so displayed
/// values can lag the counters but never lose an update.
pub fn spawn_reporter(counters: ProgressCounters, mode: ProgressMode) -> Option<JoinHandle<()>> {
    if mode == ProgressMode::None {
        return None;
    }

    Some(tokio::task::spawn(async move {
        let expected = counters.snapshot().expected;
        let bar = match mode {
            ProgressMode::Bar => Some(
                ProgressBar::new(expected).with_style(
                    ProgressStyle::with_template(
                        "{bar:40.cyan/blue} {bytes}/{total_bytes} ({percent}%)",
                    )
                    .unwrap(),
                ),
            ),
            _ => None,
        };

        let mut interval = tokio::time::interval(REPORT_INTERVAL);
        loop {
            interval.tick().await;
            let snapshot = counters.snapshot();
            match &bar {
                Some(bar) => bar.set_position(snapshot.downloaded.min(snapshot.expected)),
                None => println!(
                    "Downloaded {} / {} bytes",
                    snapshot.downloaded, snapshot.expected
                ),
            }
            if snapshot.downloaded >= snapshot.expected {
                if let Some(bar) = bar {
                    bar.finish();
                }
                break;
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_accumulates() {
        let counters = ProgressCounters::new(1000);
        counters.add(400);
        counters.add(250);
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.downloaded, 650);
        assert_eq!(snapshot.expected, 1000);
    }

    #[test]
    fn test_clones_share_counters() {
        let counters = ProgressCounters::new(10);
        let other = counters.clone();
        other.add(10);
        assert_eq!(counters.snapshot().downloaded, 10);
    }

    #[tokio::test]
    async fn test_reporter_exits_when_complete() {
        let counters = ProgressCounters::new(100);
        let handle = spawn_reporter(counters.clone(), ProgressMode::Plain).unwrap();
        counters.add(100);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_no_reporter_when_disabled() {
        let counters = ProgressCounters::new(100);
        assert!(spawn_reporter(counters, ProgressMode::None).is_none());
    }
}
