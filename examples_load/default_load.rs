use std::time::Instant;
use tracing::error;

use tracing_daily_json::{LoggerConfig, LoggerManager};

#[tokio::main]
async fn main() {
    let config = LoggerConfig {
        enable_stdout: false,
        ..LoggerConfig::default()
    };
    let mut manager = LoggerManager::start(config).expect("start logger");
    manager.install_global().expect("install global subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    let stats = manager.stats().clone();
    let path = manager.today_path();
    manager.close().await;

    println!("default config: sent {} events in {:?} (~{:.0} ev/s), dropped {}, file {}",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        stats.dropped(),
        path.display(),
    );
}
