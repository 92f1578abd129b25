use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use windrow::{InstrumentedWorkerPool, WindowedBatchCollector, WindrowConfig};

fn main() -> Result<()> {
    env_logger::init();

    // Load configuration
    let config = WindrowConfig::from_yaml("config.yaml").unwrap_or_else(|err| {
        eprintln!("Failed to load config.yaml: {}. Using defaults.", err);
        WindrowConfig::default()
    });
    println!("windrow configuration: {:?}", config);

    run_collector_demo(&config)?;
    run_pool_demo(&config)?;

    Ok(())
}

fn run_collector_demo(config: &WindrowConfig) -> Result<()> {
    println!("-- batch collector demo --");

    let mut collector =
        WindowedBatchCollector::new(config.collector.clone(), |batch: Vec<u32>, remaining| {
            println!("drained {:?}, remaining {:?}", batch, remaining);
        })?;

    let mut rng = rand::thread_rng();
    for i in 0..25u32 {
        thread::sleep(Duration::from_millis(rng.gen_range(0..200)));
        if let Err(err) = collector.submit(i) {
            eprintln!("submit failed for {}: {}", i, err);
        }
    }

    // Let the timer flush whatever is left of the last window.
    thread::sleep(config.collector.period() + Duration::from_millis(200));

    let leftover = collector.shutdown();
    println!("collector stopped, {} items returned undrained", leftover.len());
    Ok(())
}

fn run_pool_demo(config: &WindrowConfig) -> Result<()> {
    println!("-- instrumented pool demo --");

    let mut pool = InstrumentedWorkerPool::new(config.pool.clone())?;
    pool.set_wait_timeout(500);
    pool.set_run_timeout(600);

    let mut rng = rand::thread_rng();
    for i in 0..10u32 {
        let sleep_ms = rng.gen_range(0..1000);
        let outcome = pool.execute(move || {
            thread::sleep(Duration::from_millis(sleep_ms));
            if sleep_ms > 900 {
                return Err(format!("task {} took too long a nap", i));
            }
            Ok(())
        });
        if let Err(err) = outcome {
            eprintln!("execute failed for task {}: {}", i, err);
        }
    }

    // Swap the reporter mid-run: only flagged tasks get printed from here on.
    pool.set_reporter(Arc::new(FlaggedOnlyReporter));
    for _ in 0..5u32 {
        let sleep_ms = rng.gen_range(400..800);
        let _ = pool.execute(move || {
            thread::sleep(Duration::from_millis(sleep_ms));
            Ok(())
        });
    }

    pool.shutdown();
    let (total, wait_timeouts, run_timeouts) = pool.counters();
    println!(
        "pool stopped. total/waitTimeouts/runTimeouts: [{}/{}/{}]",
        total, wait_timeouts, run_timeouts
    );
    Ok(())
}

struct FlaggedOnlyReporter;

impl windrow::Reporter for FlaggedOnlyReporter {
    fn report(&self, snapshot: &windrow::ExecutionSnapshot) {
        if snapshot.is_wait_timeout || snapshot.is_run_timeout {
            println!(
                "task {} flagged: wait {}ms, run {}ms",
                snapshot.task_id, snapshot.wait_cost_ms, snapshot.run_cost_ms
            );
        }
    }
}
