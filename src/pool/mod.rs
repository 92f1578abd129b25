//! Fixed-size worker pool instrumented with queuing-delay and run-duration
//! measurement.
//!
//! Every task is timestamped at submission, at execution start, and at
//! completion. Wait and run costs are compared against runtime-mutable
//! thresholds (post-hoc detection only; a slow task is flagged, not
//! interrupted), aggregate counters are bumped atomically, and a pluggable
//! [`Reporter`] receives an [`ExecutionSnapshot`] per completed task.

pub mod snapshot;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, error, warn};
use metrics::{counter, histogram};
use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{ConfigError, PoolConfig};
use self::snapshot::{ExecutionSnapshot, PoolCounters, Reporter, StdoutReporter};

/// A unit of work. A returned `Err` becomes the task's terminal error; panics
/// are caught and recorded the same way.
pub type TaskBody = Box<dyn FnOnce() -> Result<(), String> + Send>;

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("work queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },
    #[error("pool is shut down")]
    Shutdown,
}

/// Wraps a submitted task with its measurement timestamps. `submit_time` is
/// stamped at enqueue; `start_time` and `thread_name` are stamped once by the
/// worker that picks the task up.
struct TaskEnvelope {
    id: Uuid,
    body: TaskBody,
    submit_time: Instant,
    start_time: Option<Instant>,
    thread_name: Option<String>,
}

impl TaskEnvelope {
    fn new(body: TaskBody) -> Self {
        Self {
            id: Uuid::new_v4(),
            body,
            submit_time: Instant::now(),
            start_time: None,
            thread_name: None,
        }
    }
}

struct PoolShared {
    counters: PoolCounters,
    wait_timeout_ms: AtomicI64,
    run_timeout_ms: AtomicI64,
    reporter: RwLock<Arc<dyn Reporter>>,
}

/// Worker pool whose every task completion is measured and reported.
pub struct InstrumentedWorkerPool {
    shared: Arc<PoolShared>,
    sender: Option<Sender<TaskEnvelope>>,
    queue_capacity: usize,
    workers: Vec<JoinHandle<()>>,
}

impl InstrumentedWorkerPool {
    /// Validates `config`, spawns the worker threads, and installs
    /// [`StdoutReporter`] as the default reporting hook.
    pub fn new(config: PoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let (sender, receiver) = bounded::<TaskEnvelope>(config.queue_capacity);
        let shared = Arc::new(PoolShared {
            counters: PoolCounters::default(),
            wait_timeout_ms: AtomicI64::new(config.wait_timeout_ms),
            run_timeout_ms: AtomicI64::new(config.run_timeout_ms),
            reporter: RwLock::new(Arc::new(StdoutReporter)),
        });

        let mut workers = Vec::with_capacity(config.workers);
        for idx in 0..config.workers {
            let receiver = receiver.clone();
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("windrow-worker-{idx}"))
                .spawn(move || worker_loop(receiver, shared))
                .map_err(ConfigError::IoError)?;
            workers.push(handle);
        }

        debug!("worker pool started with {} workers", config.workers);

        Ok(Self {
            shared,
            sender: Some(sender),
            queue_capacity: config.queue_capacity,
            workers,
        })
    }

    /// Enqueue a task, stamping its submission time. Rejected immediately
    /// (never retried internally) when the work queue is full or the pool is
    /// shut down. Returns the task id handed to the reporter later.
    pub fn execute<F>(&self, job: F) -> Result<Uuid, ExecuteError>
    where
        F: FnOnce() -> Result<(), String> + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(ExecuteError::Shutdown)?;
        let envelope = TaskEnvelope::new(Box::new(job));
        let id = envelope.id;

        match sender.try_send(envelope) {
            Ok(()) => {
                counter!("windrow.pool.tasks_submitted_total", 1);
                Ok(id)
            }
            Err(TrySendError::Full(_)) => Err(ExecuteError::QueueFull {
                capacity: self.queue_capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(ExecuteError::Shutdown),
        }
    }

    /// Wait-time alarm threshold in milliseconds; <= 0 disables the check.
    /// Takes effect for subsequently completing tasks.
    pub fn set_wait_timeout(&self, ms: i64) {
        self.shared.wait_timeout_ms.store(ms, Ordering::Relaxed);
    }

    /// Run-time alarm threshold in milliseconds; <= 0 disables the check.
    /// Takes effect for subsequently completing tasks.
    pub fn set_run_timeout(&self, ms: i64) {
        self.shared.run_timeout_ms.store(ms, Ordering::Relaxed);
    }

    /// Replace the reporting hook for subsequently completing tasks.
    pub fn set_reporter(&self, reporter: Arc<dyn Reporter>) {
        *self.shared.reporter.write() = reporter;
    }

    /// Current `(total, wait_timeouts, run_timeouts)` counter values.
    pub fn counters(&self) -> (u64, u64, u64) {
        self.shared.counters.totals()
    }

    /// Close the work queue and join the workers. Tasks already queued are
    /// still executed and reported before the workers exit.
    pub fn shutdown(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread panicked during shutdown");
            }
        }
    }
}

impl Drop for InstrumentedWorkerPool {
    fn drop(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(receiver: Receiver<TaskEnvelope>, shared: Arc<PoolShared>) {
    for mut envelope in receiver.iter() {
        envelope.start_time = Some(Instant::now());
        envelope.thread_name = thread::current().name().map(str::to_owned);

        let TaskEnvelope {
            id,
            body,
            submit_time,
            start_time,
            thread_name,
        } = envelope;
        let start = start_time.unwrap_or_else(Instant::now);

        let outcome = panic::catch_unwind(AssertUnwindSafe(body));
        let run_cost = start.elapsed();
        let wait_cost = start.saturating_duration_since(submit_time);

        let error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(message)) => Some(message),
            Err(payload) => Some(panic_message(payload)),
        };

        report_completion(&shared, id, thread_name, wait_cost, run_cost, error);
    }
    // Channel disconnected: the pool is shutting down.
}

fn report_completion(
    shared: &PoolShared,
    id: Uuid,
    thread_name: Option<String>,
    wait_cost: Duration,
    run_cost: Duration,
    error: Option<String>,
) {
    let wait_timeout_ms = shared.wait_timeout_ms.load(Ordering::Relaxed);
    let run_timeout_ms = shared.run_timeout_ms.load(Ordering::Relaxed);
    let wait_cost_ms = wait_cost.as_millis() as u64;
    let run_cost_ms = run_cost.as_millis() as u64;

    let is_wait_timeout = wait_timeout_ms > 0 && wait_cost_ms as i64 > wait_timeout_ms;
    let is_run_timeout = run_timeout_ms > 0 && run_cost_ms as i64 > run_timeout_ms;

    let (total_qty, wait_timeout_qty, run_timeout_qty) = shared
        .counters
        .record_completion(is_wait_timeout, is_run_timeout);

    counter!("windrow.pool.tasks_completed_total", 1);
    if is_wait_timeout {
        counter!("windrow.pool.wait_timeouts_total", 1);
    }
    if is_run_timeout {
        counter!("windrow.pool.run_timeouts_total", 1);
    }
    histogram!("windrow.pool.run_cost_ms", run_cost_ms as f64);

    let snapshot = ExecutionSnapshot {
        task_id: id,
        thread_name: thread_name.unwrap_or_else(|| "unnamed".to_string()),
        wait_cost_ms,
        is_wait_timeout,
        wait_timeout_qty,
        run_cost_ms,
        is_run_timeout,
        run_timeout_qty,
        total_qty,
        wait_timeout_ms,
        run_timeout_ms,
        error,
    };

    let reporter = Arc::clone(&shared.reporter.read());
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| reporter.report(&snapshot)));
    if outcome.is_err() {
        error!("reporter panicked for task {id}; pool keeps running");
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}
