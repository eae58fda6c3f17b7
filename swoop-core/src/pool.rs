use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{self, JoinError};

/// Bounded-concurrency task executor with barrier semantics.
///
/// Knows nothing about downloads: it maps an async function over a batch of
/// inputs with at most `max_workers` invocations in flight and hands control
/// back only once every invocation has finished. Outputs come back in input
/// order; completion order among tasks is unspecified, and no retry is
/// performed on the callers' behalf.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    max_workers: usize,
}

impl WorkerPool {
    pub fn new(max_workers: usize) -> Self {
        WorkerPool {
            max_workers: max_workers.max(1),
        }
    }

    pub async fn run<I, T, F, Fut>(&self, inputs: Vec<I>, f: F) -> Result<Vec<T>, JoinError>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let f = Arc::new(f);

        let mut handles = Vec::with_capacity(inputs.len());
        for input in inputs {
            let semaphore = semaphore.clone();
            let f = f.clone();
            handles.push(task::spawn(async move {
                // The semaphore is never closed, so acquisition cannot fail.
                let _permit = semaphore.acquire_owned().await.ok();
                f(input).await
            }));
        }

        // The barrier only opens once every task has finished: a failed
        // join must not leave the remaining handles detached and running.
        let mut outputs = Vec::with_capacity(handles.len());
        let mut first_failure = None;
        for handle in handles {
            match handle.await {
                Ok(output) => outputs.push(output),
                Err(e) if first_failure.is_none() => first_failure = Some(e),
                Err(_) => {}
            }
        }
        match first_failure {
            Some(e) => Err(e),
            None => Ok(outputs),
        }
    }
}
