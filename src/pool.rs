//! Bounded worker pools.
//!
//! A [`WorkerPool`] is a named execution context with a fixed number of
//! slots. Every task spawned on it holds one slot from the moment it
//! starts until it finishes, so a slow downstream call occupies its
//! worker exactly like a blocking call would. Tasks beyond the limit
//! queue until a slot frees up.
//!
//! A pool either borrows the ambient tokio runtime or owns a dedicated
//! multi-thread runtime whose worker threads are named `tile-<pool>`.

use crate::error::{PipelineError, Result};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::runtime::{Handle, Runtime};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

/// A named, bounded pool of workers.
#[derive(Debug)]
pub struct WorkerPool {
    name: Arc<str>,
    limit: usize,
    permits: Arc<Semaphore>,
    running: Arc<AtomicUsize>,
    tracker: TaskTracker,
    handle: Handle,
    /// Dedicated runtime, taken on shutdown.
    runtime: Mutex<Option<Runtime>>,
}

impl WorkerPool {
    /// Create a pool on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Pool`] if called outside a tokio runtime or
    /// with a zero `concurrency`.
    pub fn new(name: &str, concurrency: usize) -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| PipelineError::Pool(format!("{name} pool needs a tokio runtime: {e}")))?;
        Self::build(name, concurrency, handle, None)
    }

    /// Create a pool backed by its own multi-thread runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Pool`] if the runtime cannot be built or a
    /// size is zero.
    pub fn dedicated(name: &str, concurrency: usize, worker_threads: usize) -> Result<Self> {
        if worker_threads == 0 {
            return Err(PipelineError::Pool(format!(
                "{name} pool needs at least one worker thread"
            )));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name(format!("tile-{name}"))
            .enable_all()
            .build()
            .map_err(|e| PipelineError::Pool(format!("failed to build {name} runtime: {e}")))?;
        let handle = runtime.handle().clone();
        Self::build(name, concurrency, handle, Some(runtime))
    }

    /// Create a pool, dedicated when `worker_threads` is set.
    ///
    /// # Errors
    ///
    /// Same as [`WorkerPool::new`] and [`WorkerPool::dedicated`].
    pub fn with_threads(
        name: &str,
        concurrency: usize,
        worker_threads: Option<usize>,
    ) -> Result<Self> {
        match worker_threads {
            Some(threads) => Self::dedicated(name, concurrency, threads),
            None => Self::new(name, concurrency),
        }
    }

    fn build(
        name: &str,
        concurrency: usize,
        handle: Handle,
        runtime: Option<Runtime>,
    ) -> Result<Self> {
        if concurrency == 0 {
            return Err(PipelineError::Pool(format!(
                "{name} pool concurrency must be greater than 0"
            )));
        }
        debug!(pool = name, concurrency, dedicated = runtime.is_some(), "worker pool created");
        Ok(Self {
            name: Arc::from(name),
            limit: concurrency,
            permits: Arc::new(Semaphore::new(concurrency)),
            running: Arc::new(AtomicUsize::new(0)),
            tracker: TaskTracker::new(),
            handle,
            runtime: Mutex::new(runtime),
        })
    }

    /// The pool's name, as used in logs and thread names.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum number of tasks running at once.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of slots currently held by running tasks.
    ///
    /// Stays accurate while [`WorkerPool::shutdown`] drains the pool.
    pub fn in_flight(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    /// Whether [`WorkerPool::shutdown`] has been called.
    pub fn is_shut_down(&self) -> bool {
        self.permits.is_closed()
    }

    /// Submit a task. Returns immediately; the task starts once a slot frees up.
    ///
    /// Awaiting the returned [`PoolTask`] yields the task's output, or
    /// [`PipelineError::Pool`] if the pool shut down before the task got a
    /// slot or the task panicked.
    pub fn spawn<F>(&self, task: F) -> PoolTask<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let running = Arc::clone(&self.running);
        let name = Arc::clone(&self.name);
        let inner = self.tracker.spawn_on(
            async move {
                let _slot = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| PipelineError::Pool(format!("{name} pool is shut down")))?;
                let _running = RunningSlot::enter(running);
                Ok(task.await)
            },
            &self.handle,
        );
        PoolTask {
            inner,
            pool: Arc::clone(&self.name),
        }
    }

    /// Stop accepting work and wait for every spawned task to finish.
    ///
    /// Tasks still queued for a slot fail with [`PipelineError::Pool`]. A
    /// dedicated runtime is released in the background.
    pub async fn shutdown(&self) {
        self.permits.close();
        self.tracker.close();
        self.tracker.wait().await;

        let runtime = match self.runtime.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }
        info!(pool = %self.name, "worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Dropping a runtime from async context panics; release it in the background.
        let runtime = match self.runtime.get_mut() {
            Ok(slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }
    }
}

/// Counts a task as running from slot acquisition until it ends or unwinds.
struct RunningSlot(Arc<AtomicUsize>);

impl RunningSlot {
    fn enter(running: Arc<AtomicUsize>) -> Self {
        running.fetch_add(1, Ordering::AcqRel);
        Self(running)
    }
}

impl Drop for RunningSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Handle to a task submitted to a [`WorkerPool`].
#[derive(Debug)]
pub struct PoolTask<T> {
    inner: JoinHandle<Result<T>>,
    pool: Arc<str>,
}

impl<T> Future for PoolTask<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.inner).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(output)) => Poll::Ready(output),
            Poll::Ready(Err(e)) if e.is_panic() => Poll::Ready(Err(PipelineError::Pool(format!(
                "task on {} pool panicked",
                self.pool
            )))),
            Poll::Ready(Err(_)) => Poll::Ready(Err(PipelineError::Pool(format!(
                "task on {} pool was cancelled",
                self.pool
            )))),
        }
    }
}

impl<T> Drop for PoolTask<T> {
    fn drop(&mut self) {
        // A dropped handle means nobody wants the result: stop the work.
        self.inner.abort();
    }
}
