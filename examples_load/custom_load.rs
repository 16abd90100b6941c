use std::time::Instant;
use tokio::time::Duration;
use tracing::error;

use tracing_daily_json::noop_sink::NoopSink;
use tracing_daily_json::{LoggerConfig, LoggerManager};

#[tokio::main]
async fn main() {
    let config = LoggerConfig {
        queue_capacity: 50_000,
        poll_interval: Duration::from_millis(200),
        enable_stdout: false,
        ..LoggerConfig::default()
    };

    // Measures encode + enqueue overhead only; nothing touches the disk.
    let mut manager = LoggerManager::start_with_sink(config, Box::new(NoopSink)).expect("start logger");
    manager.install_global().expect("install global subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "custom load test error");
    }

    let elapsed = start.elapsed();
    let stats = manager.stats().clone();
    manager.close().await;

    println!("custom config: sent {} events in {:?} (~{:.0} ev/s), enqueued {}, dropped {}",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        stats.enqueued(),
        stats.dropped(),
    );
}
