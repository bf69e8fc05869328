//! Command queue: ordered, blocking submission onto the device worker pool
//!
//! Submissions are synchronous from the caller's view; the pool only
//! parallelizes work *inside* one submission (batch items of a transform).
//! A worker panic is contained here and surfaced as a device execution
//! failure rather than unwinding across the binding surface.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{ForgeResult, FourierForgeError};

#[derive(Debug)]
pub struct CommandQueue {
    pool: rayon::ThreadPool,
}

impl CommandQueue {
    /// Build the queue's worker pool. `worker_threads == 0` lets the pool
    /// size itself to the device's compute units.
    pub fn new(worker_threads: usize) -> ForgeResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_threads)
            .thread_name(|index| format!("forge-worker-{index}"))
            .build()
            .map_err(|e| FourierForgeError::QueueInitFailed(e.to_string()))?;

        tracing::debug!(workers = pool.current_num_threads(), "command queue ready");
        Ok(CommandQueue { pool })
    }

    /// Run a job on the pool and block until it completes.
    pub fn submit<R, F>(&self, job: F) -> ForgeResult<R>
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        catch_unwind(AssertUnwindSafe(|| self.pool.install(job))).map_err(|payload| {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "worker panicked".to_string());
            tracing::error!(detail = %detail, "command queue worker fault");
            FourierForgeError::ExecutionFailed(detail)
        })
    }

    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }
}
