// tests/collector_tests.rs
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use windrow::{CollectorConfig, ConfigError, DrainPolicy, SubmitError, WindowedBatchCollector};

type Batches = Arc<Mutex<Vec<(Vec<u32>, Vec<u32>)>>>;

fn recording_collector(
    config: CollectorConfig,
) -> (WindowedBatchCollector<u32>, Batches) {
    let batches: Batches = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&batches);
    let collector = WindowedBatchCollector::new(config, move |batch, remaining| {
        sink.lock().unwrap().push((batch, remaining));
    })
    .unwrap();
    (collector, batches)
}

#[test]
fn early_drain_fires_on_third_submit() {
    let config = CollectorConfig {
        period_ms: 1000,
        max_qty: 3,
        queue_capacity: 10,
        drain_policy: DrainPolicy::CallerRuns,
    };
    let (mut collector, batches) = recording_collector(config);

    for i in 1..=5u32 {
        collector.submit(i).unwrap();
    }

    // The third submit drained synchronously; items 4 and 5 are still queued.
    {
        let recorded = batches.lock().unwrap();
        assert_eq!(recorded.len(), 1, "exactly one early drain expected");
        assert_eq!(recorded[0].0, vec![1, 2, 3]);
    }
    assert_eq!(collector.len(), 2);

    // The next scheduled tick flushes the rest.
    thread::sleep(Duration::from_millis(1500));
    {
        let recorded = batches.lock().unwrap();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[1].0, vec![4, 5]);
        assert!(recorded[1].1.is_empty());
    }

    assert!(collector.shutdown().is_empty());
}

#[test]
fn timer_drains_below_threshold() {
    let config = CollectorConfig {
        period_ms: 300,
        max_qty: 10,
        queue_capacity: 100,
        drain_policy: DrainPolicy::CallerRuns,
    };
    let (mut collector, batches) = recording_collector(config);

    collector.submit(1).unwrap();
    collector.submit(2).unwrap();
    assert!(batches.lock().unwrap().is_empty(), "no drain before the tick");

    thread::sleep(Duration::from_millis(900));

    // One batch from the tick that found items; empty ticks invoke nothing.
    let recorded = batches.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].0, vec![1, 2]);
    assert!(recorded[0].1.is_empty());
    drop(recorded);

    assert!(collector.shutdown().is_empty());
}

#[test]
fn full_queue_rejects_without_enqueueing() {
    // SchedulerRuns with the consumer gated lets the queue actually fill up:
    // the producer never drains, and the scheduler is parked inside the
    // consumer callback holding the drain lock.
    let (entered_tx, entered_rx) = crossbeam_channel::unbounded::<()>();
    let (release_tx, release_rx) = crossbeam_channel::unbounded::<()>();

    let config = CollectorConfig {
        period_ms: 60_000,
        max_qty: 5,
        queue_capacity: 5,
        drain_policy: DrainPolicy::SchedulerRuns,
    };
    let batches: Batches = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&batches);
    let mut collector = WindowedBatchCollector::new(config, move |batch, remaining| {
        sink.lock().unwrap().push((batch, remaining));
        entered_tx.send(()).unwrap();
        release_rx.recv().unwrap();
    })
    .unwrap();

    for i in 1..=5u32 {
        collector.submit(i).unwrap();
    }
    entered_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("scheduler should drain on the early signal");

    // First batch is out of the queue; refill it while the consumer blocks.
    for i in 6..=10u32 {
        collector.submit(i).unwrap();
    }
    assert_eq!(collector.len(), 5);

    let rejected = collector.submit(11);
    assert!(matches!(
        rejected,
        Err(SubmitError::QueueFull { capacity: 5 })
    ));
    assert_eq!(collector.len(), 5, "rejected item must not be enqueued");

    // Unblock both drains (the refill raised a second signal).
    release_tx.send(()).unwrap();
    entered_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("pending signal should trigger a second drain");
    release_tx.send(()).unwrap();

    thread::sleep(Duration::from_millis(100));
    let leftover = collector.shutdown();
    assert!(leftover.is_empty());

    let recorded = batches.lock().unwrap();
    assert_eq!(recorded[0].0, vec![1, 2, 3, 4, 5]);
    assert_eq!(recorded[1].0, vec![6, 7, 8, 9, 10]);
}

#[test]
fn every_item_delivered_once_in_order() {
    let config = CollectorConfig {
        period_ms: 50,
        max_qty: 4,
        queue_capacity: 100,
        drain_policy: DrainPolicy::CallerRuns,
    };
    let (mut collector, batches) = recording_collector(config);

    for i in 0..20u32 {
        collector.submit(i).unwrap();
    }
    thread::sleep(Duration::from_millis(300));

    let leftover = collector.shutdown();

    let recorded = batches.lock().unwrap();
    let mut delivered: Vec<u32> = Vec::new();
    for (batch, _remaining) in recorded.iter() {
        assert!(batch.len() <= 4, "batch exceeded max_qty: {:?}", batch);
        delivered.extend_from_slice(batch);
    }
    delivered.extend_from_slice(&leftover);

    // Conservation: everything submitted shows up exactly once, FIFO.
    assert_eq!(delivered, (0..20).collect::<Vec<u32>>());
}

#[test]
fn shutdown_returns_undrained_items() {
    let config = CollectorConfig {
        period_ms: 60_000,
        max_qty: 10,
        queue_capacity: 10,
        drain_policy: DrainPolicy::CallerRuns,
    };
    let (mut collector, batches) = recording_collector(config);

    collector.submit(1).unwrap();
    collector.submit(2).unwrap();
    collector.submit(3).unwrap();

    let leftover = collector.shutdown();
    assert_eq!(leftover, vec![1, 2, 3]);
    assert!(batches.lock().unwrap().is_empty());

    // The collector no longer accepts work.
    assert!(matches!(collector.submit(4), Err(SubmitError::Shutdown)));
}

#[test]
fn empty_ticks_do_not_invoke_consumer() {
    let config = CollectorConfig {
        period_ms: 100,
        max_qty: 10,
        queue_capacity: 10,
        drain_policy: DrainPolicy::CallerRuns,
    };
    let (mut collector, batches) = recording_collector(config);

    thread::sleep(Duration::from_millis(350));
    assert!(batches.lock().unwrap().is_empty());
    assert!(collector.shutdown().is_empty());
}

#[test]
fn panicking_consumer_does_not_kill_scheduler() {
    let config = CollectorConfig {
        period_ms: 100,
        max_qty: 10,
        queue_capacity: 10,
        drain_policy: DrainPolicy::CallerRuns,
    };
    let batches: Batches = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&batches);
    let mut collector = WindowedBatchCollector::new(config, move |batch: Vec<u32>, remaining| {
        sink.lock().unwrap().push((batch, remaining));
        panic!("consumer boom");
    })
    .unwrap();

    collector.submit(1).unwrap();
    collector.submit(2).unwrap();
    thread::sleep(Duration::from_millis(300));
    assert_eq!(batches.lock().unwrap().len(), 1);

    // The scheduler survived the panic and keeps draining.
    collector.submit(3).unwrap();
    thread::sleep(Duration::from_millis(300));
    assert_eq!(batches.lock().unwrap().len(), 2);

    assert!(collector.shutdown().is_empty());
}

#[test]
fn invalid_configs_fail_construction() {
    let consumer = |_batch: Vec<u32>, _remaining: Vec<u32>| {};

    let zero_period = CollectorConfig {
        period_ms: 0,
        ..CollectorConfig::default()
    };
    assert!(matches!(
        WindowedBatchCollector::new(zero_period, consumer),
        Err(ConfigError::ValidationError(_))
    ));

    let zero_qty = CollectorConfig {
        max_qty: 0,
        ..CollectorConfig::default()
    };
    assert!(matches!(
        WindowedBatchCollector::new(zero_qty, consumer),
        Err(ConfigError::ValidationError(_))
    ));

    let undersized = CollectorConfig {
        max_qty: 8,
        queue_capacity: 4,
        ..CollectorConfig::default()
    };
    assert!(matches!(
        WindowedBatchCollector::new(undersized, consumer),
        Err(ConfigError::ValidationError(_))
    ));
}
