//! # Async Execution Pool
//!
//! Bounded pool that runs asynchronous handler invocations on the tokio runtime.
//!
//! ```text
//! submit() → [bounded mpsc queue] → dispatch loop → [Semaphore] → tokio::spawn(task)
//! ```
//!
//! The queue bounds memory; the semaphore bounds how many tasks run at once.
//! Tasks that submit further work (a handler whose side effects dispatch new
//! events) are rejected rather than blocked when the queue is full.
//! Tasks are plain futures: the pool knows nothing about handlers.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::{AsyncPoolConfig, OverflowPolicy};
use crate::error::PoolError;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

tokio::task_local! {
    /// Set while a task spawned by a pool is running; holds that pool's id
    static WORKER_POOL_ID: String;
}

/// Id of the pool whose worker is running the current task, if any
pub fn current_worker_pool() -> Option<String> {
    WORKER_POOL_ID.try_with(Clone::clone).ok()
}

/// Completion handle for a submitted task
///
/// Dropping the handle does not cancel the task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    receiver: oneshot::Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Wait for the task's output; `None` if the task panicked or never ran
    pub async fn wait(self) -> Option<T> {
        self.receiver.await.ok()
    }
}

/// Point-in-time pool statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub pool_id: String,
    pub max_concurrency: usize,
    pub queue_capacity: usize,
    pub queue_depth: usize,
    pub active_tasks: usize,
    pub completed_tasks: u64,
    pub rejected_tasks: u64,
    pub running: bool,
}

#[derive(Debug, Default)]
struct PoolCounters {
    queued: AtomicUsize,
    active: AtomicUsize,
    completed: AtomicU64,
    rejected: AtomicU64,
}

/// Tracks one spawned task; released on completion or panic
struct ActiveTaskGuard {
    counters: Arc<PoolCounters>,
}

impl ActiveTaskGuard {
    fn new(counters: Arc<PoolCounters>) -> Self {
        counters.active.fetch_add(1, Ordering::SeqCst);
        Self { counters }
    }
}

impl Drop for ActiveTaskGuard {
    fn drop(&mut self) {
        self.counters.active.fetch_sub(1, Ordering::SeqCst);
        self.counters.completed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Shared pool of concurrently running async tasks
pub struct AsyncExecutionPool {
    config: AsyncPoolConfig,
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    receiver: Mutex<Option<mpsc::Receiver<Job>>>,
    semaphore: Arc<Semaphore>,
    counters: Arc<PoolCounters>,
    accepting: AtomicBool,
    started: AtomicBool,
    terminated: watch::Sender<bool>,
}

impl AsyncExecutionPool {
    /// Create a pool; tasks submitted before [`start`](Self::start) wait in the queue
    pub fn new(config: AsyncPoolConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (terminated, _) = watch::channel(false);

        Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            config,
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            counters: Arc::new(PoolCounters::default()),
            accepting: AtomicBool::new(true),
            started: AtomicBool::new(false),
            terminated,
        }
    }

    pub fn pool_id(&self) -> &str {
        &self.config.pool_id
    }

    /// Spawn the dispatch loop on the current tokio runtime; idempotent
    pub fn start(&self) -> Result<(), PoolError> {
        let runtime = Handle::try_current().map_err(|_| PoolError::NoRuntime {
            pool_id: self.config.pool_id.clone(),
        })?;

        let Some(receiver) = self.receiver.lock().take() else {
            debug!(pool_id = %self.config.pool_id, "Execution pool already started");
            return Ok(());
        };

        self.started.store(true, Ordering::SeqCst);
        runtime.spawn(run_dispatch_loop(
            self.config.pool_id.clone(),
            receiver,
            Arc::clone(&self.semaphore),
            Arc::clone(&self.counters),
            self.config.max_concurrency.max(1),
            self.terminated.clone(),
        ));

        info!(
            pool_id = %self.config.pool_id,
            max_concurrency = self.config.max_concurrency,
            queue_capacity = self.config.queue_capacity,
            "Async execution pool started"
        );
        Ok(())
    }

    /// Enqueue a task, applying the configured overflow policy
    ///
    /// Submissions from inside a pool task never wait for queue space: with a
    /// full queue they fail with [`PoolError::QueueFull`] under either policy.
    pub async fn submit<F>(&self, task: F) -> Result<TaskHandle<F::Output>, PoolError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let sender = match self.sender.lock().as_ref() {
            Some(sender) if self.accepting.load(Ordering::SeqCst) => sender.clone(),
            _ => return Err(self.shut_down_error()),
        };

        let (completion_tx, completion_rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let output = task.await;
            // The caller may have dropped its handle
            let _ = completion_tx.send(output);
        });

        // A worker waiting on a full queue holds a permit the dispatch loop needs
        // to drain that queue, so workers never block on submit
        let submitting_worker = current_worker_pool();
        let may_block = self.config.overflow_policy == OverflowPolicy::Block
            && submitting_worker.is_none();

        self.counters.queued.fetch_add(1, Ordering::SeqCst);
        let enqueued = if may_block {
            sender.send(job).await.map_err(|_| self.shut_down_error())
        } else {
            sender.try_send(job).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    self.counters.rejected.fetch_add(1, Ordering::SeqCst);
                    warn!(
                        pool_id = %self.config.pool_id,
                        queue_capacity = self.config.queue_capacity,
                        overflow_policy = ?self.config.overflow_policy,
                        submitting_worker = ?submitting_worker,
                        "Async execution queue full, rejecting task"
                    );
                    PoolError::QueueFull {
                        pool_id: self.config.pool_id.clone(),
                        capacity: self.config.queue_capacity,
                    }
                }
                mpsc::error::TrySendError::Closed(_) => self.shut_down_error(),
            })
        };

        if let Err(e) = enqueued {
            self.counters.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(e);
        }

        Ok(TaskHandle {
            receiver: completion_rx,
        })
    }

    /// Stop accepting work; queued and in-flight tasks still run
    pub fn shutdown(&self) {
        if !self.accepting.swap(false, Ordering::SeqCst) {
            return;
        }

        self.sender.lock().take();

        // Never started: nothing will drain the queue
        if self.receiver.lock().take().is_some() {
            self.terminated.send_replace(true);
        }

        info!(
            pool_id = %self.config.pool_id,
            queue_depth = self.counters.queued.load(Ordering::SeqCst),
            active_tasks = self.counters.active.load(Ordering::SeqCst),
            "Async execution pool shutting down"
        );
    }

    /// Wait up to `timeout` for all queued and in-flight tasks after [`shutdown`](Self::shutdown)
    ///
    /// Returns `true` if the pool terminated within the timeout.
    #[allow(clippy::let_and_return)]
    pub async fn await_termination(&self, timeout: Duration) -> bool {
        let mut terminated = self.terminated.subscribe();
        // Bound to a local so the borrowed watch::Ref drops before `terminated`
        let finished = tokio::time::timeout(timeout, terminated.wait_for(|done| *done))
            .await
            .is_ok_and(|waited| waited.is_ok());
        finished
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && self.accepting.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            pool_id: self.config.pool_id.clone(),
            max_concurrency: self.config.max_concurrency,
            queue_capacity: self.config.queue_capacity,
            queue_depth: self.counters.queued.load(Ordering::SeqCst),
            active_tasks: self.counters.active.load(Ordering::SeqCst),
            completed_tasks: self.counters.completed.load(Ordering::SeqCst),
            rejected_tasks: self.counters.rejected.load(Ordering::SeqCst),
            running: self.is_running(),
        }
    }

    fn shut_down_error(&self) -> PoolError {
        PoolError::ShutDown {
            pool_id: self.config.pool_id.clone(),
        }
    }
}

impl std::fmt::Debug for AsyncExecutionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncExecutionPool")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Pull jobs off the queue in FIFO order, spawning each once a permit is free
async fn run_dispatch_loop(
    pool_id: String,
    mut receiver: mpsc::Receiver<Job>,
    semaphore: Arc<Semaphore>,
    counters: Arc<PoolCounters>,
    max_concurrency: usize,
    terminated: watch::Sender<bool>,
) {
    debug!(pool_id = %pool_id, "Async execution dispatch loop starting");

    while let Some(job) = receiver.recv().await {
        counters.queued.fetch_sub(1, Ordering::SeqCst);

        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                error!(pool_id = %pool_id, "Semaphore closed - stopping dispatch loop");
                break;
            }
        };

        let guard = ActiveTaskGuard::new(Arc::clone(&counters));
        tokio::spawn(WORKER_POOL_ID.scope(pool_id.clone(), async move {
            job.await;
            drop(guard);
            drop(permit);
        }));
    }

    // Sender side is gone; wait for every in-flight task to hand back its permit
    let all_permits = u32::try_from(max_concurrency).unwrap_or(u32::MAX);
    if semaphore.acquire_many(all_permits).await.is_err() {
        warn!(pool_id = %pool_id, "Semaphore closed while draining in-flight tasks");
    }

    terminated.send_replace(true);
    info!(
        pool_id = %pool_id,
        completed_tasks = counters.completed.load(Ordering::SeqCst),
        "Async execution pool terminated"
    );
}
