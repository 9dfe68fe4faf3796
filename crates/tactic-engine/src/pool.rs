//! Thread pool for racing proof branches.
//!
//! The interpreter itself is synchronous. Racing combinators run each branch
//! on the pool's blocking threads and wait for the first success from the
//! calling thread, so the pool must outlive every interpreter holding one of
//! its handles.
//!
//! A branch occupies a blocking thread for its whole run, including any
//! races nested inside it. Branch slots are therefore counted: a race that
//! finds no free slot runs its branches on the calling thread instead of
//! queueing behind the threads that are waiting on it.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::InterpreterConfig;

/// Owns the multi-threaded runtime that racing branches run on.
pub struct WorkerPool {
    runtime: Option<Runtime>,
    handle: PoolHandle,
    shutdown_grace: Duration,
}

/// Cloneable access to a [`WorkerPool`]: its runtime plus the count of free
/// branch slots.
#[derive(Debug, Clone)]
pub struct PoolHandle {
    runtime: Handle,
    slots: Arc<Semaphore>,
}

impl PoolHandle {
    /// The runtime racing branches are spawned on.
    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Blocking threads not currently running a racing branch.
    pub fn free_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Claim a branch slot, released when the permit drops.
    pub(crate) fn try_reserve(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.slots).try_acquire_owned().ok()
    }
}

impl WorkerPool {
    /// Build a pool from the interpreter settings.
    pub fn new(config: &InterpreterConfig) -> std::io::Result<Self> {
        let blocking = config.max_blocking_threads.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .max_blocking_threads(blocking)
            .thread_stack_size(config.thread_stack_size_mib.max(1) * 1024 * 1024)
            .thread_name("tactic-worker")
            .enable_time()
            .build()?;
        let handle = PoolHandle {
            runtime: runtime.handle().clone(),
            slots: Arc::new(Semaphore::new(blocking)),
        };
        tracing::info!(
            worker_threads = config.worker_threads,
            max_blocking_threads = blocking,
            "Started tactic worker pool"
        );
        Ok(Self {
            runtime: Some(runtime),
            handle,
            shutdown_grace: config.shutdown_grace(),
        })
    }

    /// A handle interpreters use to spawn racing branches.
    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            tracing::debug!(grace_ms = self.shutdown_grace.as_millis() as u64, "Shutting down tactic worker pool");
            runtime.shutdown_timeout(self.shutdown_grace);
        }
    }
}
