//! Bounded pool for blocking merge work.
//!
//! Jobs run on tokio's blocking thread pool, so the event loop keeps serving
//! other users while a merge is in progress. A fair semaphore caps the number
//! of jobs running at once; callers beyond the cap wait in FIFO order.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task;

use crate::error::{MergeBotError, Result};

/// Fixed-size pool executing blocking jobs.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool running at most `size` jobs at a time (minimum 1).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Maximum number of concurrent jobs.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of idle workers.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `job` on a worker and wait for its result.
    ///
    /// Once a worker has been granted the job runs to completion, even if the
    /// returned future is dropped.
    ///
    /// # Errors
    ///
    /// Returns the job's own error, or [`MergeBotError::MergeFailed`] if the
    /// job panicked.
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| MergeBotError::merge_failed("Worker pool is shut down"))?;

        task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| MergeBotError::merge_failed(format!("Merge task failed: {e}")))?
    }
}
