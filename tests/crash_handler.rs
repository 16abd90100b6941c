use std::path::Path;
use tempfile::TempDir;
use tokio::time::Duration;

use tracing_daily_json::supervisor::{restartable_task, TaskExit};
use tracing_daily_json::{LoggerConfig, LoggerManager};

fn read_json_lines(path: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

// Installs the process-wide subscriber and panic hook, so it lives in its
// own test binary.
#[tokio::test]
async fn global_install_records_panics_and_events() {
    let tmp = TempDir::new().unwrap();
    let config = LoggerConfig {
        enable_stdout: false,
        poll_interval: Duration::from_millis(20),
        ..LoggerConfig::new(tmp.path(), "crash", 7)
    };
    let mut manager = LoggerManager::start(config).unwrap();
    manager.install_global().unwrap();
    let path = manager.today_path();

    tracing::info!(component = "startup", "service ready");
    let joined = std::thread::Builder::new()
        .name("worker-1".to_string())
        .spawn(|| panic!("prediction model missing"))
        .unwrap()
        .join();
    assert!(joined.is_err());

    let mut attempts = 0;
    let exit = restartable_task(
        "indexer",
        move || {
            attempts += 1;
            let first = attempts == 1;
            async move {
                if first {
                    panic!("index corrupted");
                }
                Ok::<(), String>(())
            }
        },
        Duration::from_millis(5),
    )
    .await;
    assert_eq!(exit, TaskExit::Finished);

    assert!(manager.install_global().is_err());
    manager.close().await;

    let lines = read_json_lines(&path);
    assert_eq!(lines[0]["message"], "service ready");
    assert_eq!(lines[0]["component"], "startup");

    assert_eq!(lines[1]["level"], "ERROR");
    assert_eq!(lines[1]["message"], "Uncaught exception");
    let exception = lines[1]["exception"].as_str().unwrap();
    assert!(exception.starts_with("panic: prediction model missing"));
    assert!(exception.contains("thread 'worker-1' panicked"));

    // The supervisor's own start/restart events follow in the same file.
    let uncaught = lines.iter().filter(|l| l["message"] == "Uncaught exception").count();
    assert_eq!(uncaught, 1);
    let supervised: Vec<_> = lines
        .iter()
        .filter(|l| l["message"] == "Panic in supervised task")
        .collect();
    assert_eq!(supervised.len(), 1);
    assert_eq!(supervised[0]["level"], "ERROR");
    assert_eq!(supervised[0]["task"], "indexer");
    assert!(supervised[0]["exception"].as_str().unwrap().starts_with("panic: index corrupted"));
}
