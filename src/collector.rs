//! Time/size-windowed batch collection.
//!
//! Producer threads submit items into a bounded FIFO queue. A dedicated
//! scheduler thread drains up to `max_qty` items every `period_ms` and hands
//! them to a consumer callback together with a snapshot of what is still
//! queued. When the queue reaches `max_qty` before the timer expires, the
//! drain happens early; [`DrainPolicy`] decides which thread pays for it.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, warn};
use metrics::{counter, gauge};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{CollectorConfig, ConfigError};

/// Receives each drained batch plus a snapshot of the items still queued.
pub type BatchConsumer<T> = dyn Fn(Vec<T>, Vec<T>) + Send + Sync;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },
    #[error("collector is shut down")]
    Shutdown,
}

/// Which thread performs the early drain once the queue reaches `max_qty`.
///
/// `CallerRuns` charges the drain to the producer whose `submit` crossed the
/// threshold; use it when producers wait for confirmation anyway.
/// `SchedulerRuns` keeps producers fire-and-forget and lets the woken
/// scheduler thread drain instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DrainPolicy {
    #[default]
    CallerRuns,
    SchedulerRuns,
}

struct SleepState {
    signals: u64,
    shutdown: bool,
}

struct Shared<T> {
    queue: Mutex<VecDeque<T>>,
    sleep: Mutex<SleepState>,
    wake: Condvar,
    /// Serializes drains: the scheduler-tick path and the submit path must
    /// never hand overlapping batches to the consumer.
    drain_lock: Mutex<()>,
    stopping: AtomicBool,
    consumer: Box<BatchConsumer<T>>,
    max_qty: usize,
    capacity: usize,
    policy: DrainPolicy,
}

impl<T: Clone + Send + 'static> Shared<T> {
    /// Remove up to `max_qty` items FIFO and invoke the consumer. Returns the
    /// number of items drained; an empty queue is a no-op with no callback.
    fn drain(&self) -> usize {
        let _serialized = self.drain_lock.lock();

        let (batch, remaining) = {
            let mut queue = self.queue.lock();
            if queue.is_empty() {
                return 0;
            }
            let take = self.max_qty.min(queue.len());
            let batch: Vec<T> = queue.drain(..take).collect();
            let remaining: Vec<T> = queue.iter().cloned().collect();
            (batch, remaining)
        };

        let drained = batch.len();
        counter!("windrow.collector.batches_drained_total", 1);
        counter!("windrow.collector.items_drained_total", drained as u64);
        gauge!("windrow.collector.queue_depth", remaining.len() as f64);

        // Queue lock is released here so producers keep making progress while
        // the consumer runs; the drain lock stays held.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            (self.consumer)(batch, remaining);
        }));
        if outcome.is_err() {
            error!("batch consumer panicked; scheduler keeps running");
        }

        drained
    }

    /// Wake the scheduler out of its timed sleep.
    fn signal(&self) {
        let mut sleep = self.sleep.lock();
        sleep.signals = sleep.signals.wrapping_add(1);
        drop(sleep);
        self.wake.notify_one();
    }
}

/// Collects submitted items and flushes them in bounded batches, either on a
/// fixed schedule or early when `max_qty` items are queued.
pub struct WindowedBatchCollector<T> {
    shared: Arc<Shared<T>>,
    scheduler: Option<JoinHandle<()>>,
}

impl<T: Clone + Send + 'static> WindowedBatchCollector<T> {
    /// Validates `config` and immediately starts the background scheduler.
    pub fn new<F>(config: CollectorConfig, consumer: F) -> Result<Self, ConfigError>
    where
        F: Fn(Vec<T>, Vec<T>) + Send + Sync + 'static,
    {
        config.validate()?;

        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::with_capacity(config.queue_capacity)),
            sleep: Mutex::new(SleepState {
                signals: 0,
                shutdown: false,
            }),
            wake: Condvar::new(),
            drain_lock: Mutex::new(()),
            stopping: AtomicBool::new(false),
            consumer: Box::new(consumer),
            max_qty: config.max_qty,
            capacity: config.queue_capacity,
            policy: config.drain_policy,
        });

        let period = config.period();
        let scheduler_shared = Arc::clone(&shared);
        let scheduler = thread::Builder::new()
            .name("windrow-collector".into())
            .spawn(move || scheduler_loop(scheduler_shared, period))
            .map_err(ConfigError::IoError)?;

        Ok(Self {
            shared,
            scheduler: Some(scheduler),
        })
    }

    /// Enqueue `item` from the calling thread. Fails fast with
    /// [`SubmitError::QueueFull`] instead of blocking when the queue is at
    /// capacity. Reaching `max_qty` triggers an early drain; under
    /// [`DrainPolicy::CallerRuns`] the drain runs on this thread before the
    /// call returns.
    pub fn submit(&self, item: T) -> Result<(), SubmitError> {
        if self.shared.stopping.load(Ordering::Acquire) {
            return Err(SubmitError::Shutdown);
        }

        let hit_threshold = {
            let mut queue = self.shared.queue.lock();
            if queue.len() >= self.shared.capacity {
                return Err(SubmitError::QueueFull {
                    capacity: self.shared.capacity,
                });
            }
            queue.push_back(item);
            queue.len() >= self.shared.max_qty
        };

        counter!("windrow.collector.items_submitted_total", 1);

        if hit_threshold {
            // Restart the scheduler's sleep either way; under CallerRuns the
            // woken scheduler finds the drain already done and just re-sleeps.
            self.shared.signal();
            if self.shared.policy == DrainPolicy::CallerRuns {
                self.shared.drain();
            }
        }

        Ok(())
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop the scheduler cooperatively and return every item that was still
    /// queued. In-flight drains complete first; undrained items are handed
    /// back to the caller rather than delivered to the consumer or discarded.
    pub fn shutdown(&mut self) -> Vec<T> {
        self.stop_scheduler();

        // Once the drain lock is free, no drain is in flight any more.
        let _serialized = self.shared.drain_lock.lock();
        let mut queue = self.shared.queue.lock();
        gauge!("windrow.collector.queue_depth", 0.0);
        queue.drain(..).collect()
    }

    fn stop_scheduler(&mut self) {
        let Some(handle) = self.scheduler.take() else {
            return;
        };
        self.shared.stopping.store(true, Ordering::Release);
        {
            let mut sleep = self.shared.sleep.lock();
            sleep.shutdown = true;
        }
        self.shared.wake.notify_one();
        if handle.join().is_err() {
            warn!("collector scheduler thread panicked during shutdown");
        }
    }
}

impl<T> Drop for WindowedBatchCollector<T> {
    fn drop(&mut self) {
        let Some(handle) = self.scheduler.take() else {
            return;
        };
        self.shared.stopping.store(true, Ordering::Release);
        {
            let mut sleep = self.shared.sleep.lock();
            sleep.shutdown = true;
        }
        self.shared.wake.notify_one();
        let _ = handle.join();
    }
}

fn scheduler_loop<T: Clone + Send + 'static>(shared: Arc<Shared<T>>, period: Duration) {
    debug!("collector scheduler started (period {:?})", period);

    // Signals counted past this point have been acted on. Comparing against
    // the live counter instead of a flag means a signal raised while a drain
    // is in progress still wakes the very next sleep.
    let mut handled = 0u64;

    loop {
        let woken_early = {
            let mut sleep = shared.sleep.lock();
            if sleep.shutdown {
                break;
            }
            let timed_out = shared
                .wake
                .wait_while_for(&mut sleep, |s| !s.shutdown && s.signals == handled, period)
                .timed_out();
            if sleep.shutdown {
                break;
            }
            handled = sleep.signals;
            !timed_out
        };

        if woken_early {
            match shared.policy {
                // The producer that crossed the threshold already drained;
                // just restart the sleep.
                DrainPolicy::CallerRuns => continue,
                DrainPolicy::SchedulerRuns => {
                    shared.drain();
                }
            }
        } else {
            shared.drain();
        }
    }

    debug!("collector scheduler exiting");
}
