//! Per-task measurement results and the pluggable reporting contract.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Local;
use serde::Serialize;
use uuid::Uuid;

use crate::format::interpolate;

/// Monotonic completion counters owned by one pool instance. Incremented only
/// on the completion path, never decremented, read through snapshots.
#[derive(Debug, Default)]
pub struct PoolCounters {
    total: AtomicU64,
    wait_timeouts: AtomicU64,
    run_timeouts: AtomicU64,
}

impl PoolCounters {
    /// Record one completion and return the counter values as of this task:
    /// post-increment for `total` and for whichever timeout counters fired.
    pub(crate) fn record_completion(&self, wait_exceeded: bool, run_exceeded: bool) -> (u64, u64, u64) {
        let total = self.total.fetch_add(1, Ordering::Relaxed) + 1;
        let waits = if wait_exceeded {
            self.wait_timeouts.fetch_add(1, Ordering::Relaxed) + 1
        } else {
            self.wait_timeouts.load(Ordering::Relaxed)
        };
        let runs = if run_exceeded {
            self.run_timeouts.fetch_add(1, Ordering::Relaxed) + 1
        } else {
            self.run_timeouts.load(Ordering::Relaxed)
        };
        (total, waits, runs)
    }

    /// Current `(total, wait_timeouts, run_timeouts)` values.
    pub fn totals(&self) -> (u64, u64, u64) {
        (
            self.total.load(Ordering::Relaxed),
            self.wait_timeouts.load(Ordering::Relaxed),
            self.run_timeouts.load(Ordering::Relaxed),
        )
    }
}

/// Immutable summary of one completed task, built on the worker thread right
/// after completion and handed to the [`Reporter`] synchronously.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSnapshot {
    pub task_id: Uuid,
    /// Name of the worker thread that executed the task.
    pub thread_name: String,
    /// Elapsed time between submission and execution start.
    pub wait_cost_ms: u64,
    pub is_wait_timeout: bool,
    /// Wait-timeout counter as of this task's completion.
    pub wait_timeout_qty: u64,
    /// Elapsed time between execution start and completion.
    pub run_cost_ms: u64,
    pub is_run_timeout: bool,
    /// Run-timeout counter as of this task's completion.
    pub run_timeout_qty: u64,
    /// Total completion counter as of this task's completion.
    pub total_qty: u64,
    /// Configured thresholds at completion time; <= 0 means disabled.
    pub wait_timeout_ms: i64,
    pub run_timeout_ms: i64,
    /// Terminal error of the task body, if any (returned error or panic).
    pub error: Option<String>,
}

/// Reporting hook invoked once per completed task, on the worker thread.
/// Implementations must not block for long; panics are caught and logged by
/// the pool, never propagated.
pub trait Reporter: Send + Sync {
    fn report(&self, snapshot: &ExecutionSnapshot);
}

/// Default reporter: one summary line per task on standard output.
#[derive(Debug, Default)]
pub struct StdoutReporter;

impl Reporter for StdoutReporter {
    fn report(&self, s: &ExecutionSnapshot) {
        let error = s.error.as_deref().unwrap_or("");
        let line = interpolate(
            "{} task {} finished. waitCost/waitTimeout: [{}/{}={}], runCost/runTimeout: [{}/{}={}], ex: {}, total/waitTimeouts/runTimeouts: [{}/{}/{}]",
            &[
                &s.thread_name,
                &s.task_id,
                &s.wait_cost_ms,
                &s.wait_timeout_ms,
                &s.is_wait_timeout,
                &s.run_cost_ms,
                &s.run_timeout_ms,
                &s.is_run_timeout,
                &error,
                &s.total_qty,
                &s.wait_timeout_qty,
                &s.run_timeout_qty,
            ],
        );
        println!("{} {}", Local::now().format("%H:%M:%S%.3f"), line);
    }
}
