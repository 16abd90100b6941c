use crate::clock::{Clock, SystemClock};
use crate::config::LoggerConfig;
use crate::crash::{install_crash_handler, panic_exception, CrashHandlerGuard};
use crate::error::LoggerError;
use crate::file::{DailyFileSink, LogFileNaming};
use crate::handle::LogHandle;
use crate::layer::JsonQueueLayer;
use crate::queue::{bounded, QueueStats};
use crate::record::{Level, LogRecord};
use crate::sink::LineSink;
use crate::supervisor;
use crate::writer::{spawn_writer, LogWriter};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Subscriber};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Owns the logging pipeline: queue, writer task, daily files and hooks.
///
/// Only one manager per process should call [`install_global`]; the
/// global `tracing` dispatcher and the panic hook are process-wide. Tests
/// and embedders that need several managers use [`subscriber`] with
/// `tracing::subscriber::set_default` instead.
///
/// [`install_global`]: LoggerManager::install_global
/// [`subscriber`]: LoggerManager::subscriber
pub struct LoggerManager {
    config: LoggerConfig,
    naming: LogFileNaming,
    clock: Arc<dyn Clock>,
    handle: LogHandle,
    stop: Arc<AtomicBool>,
    writer: Arc<Mutex<LogWriter>>,
    task: Option<JoinHandle<()>>,
    crash_guard: Option<CrashHandlerGuard>,
    written: Arc<AtomicU64>,
}

impl LoggerManager {
    /// Start the pipeline with the system clock.
    ///
    /// Must be called from within a tokio runtime; the writer runs as a
    /// task on it.
    pub fn start(config: LoggerConfig) -> Result<Self, LoggerError> {
        Self::start_with_clock(config, Arc::new(SystemClock))
    }

    /// Start the pipeline with an explicit clock (used to simulate rollover).
    pub fn start_with_clock(config: LoggerConfig, clock: Arc<dyn Clock>) -> Result<Self, LoggerError> {
        let (config, naming) = prepare(config)?;

        let sink = DailyFileSink::new(naming.clone(), config.storage_days, Arc::clone(&clock));
        let report = sink.sweep();
        if !report.deleted.is_empty() {
            debug!(
                target: crate::INTERNAL_TARGET,
                deleted = report.deleted.len(),
                "removed old log files"
            );
        }
        info!(
            target: crate::INTERNAL_TARGET,
            file = %sink.current_path().display(),
            "Logger initialized"
        );

        Ok(Self::launch(config, naming, clock, Box::new(sink)))
    }

    /// Start the pipeline in front of a custom [`LineSink`] instead of the
    /// daily files. Retention and rollover are then the sink's business.
    pub fn start_with_sink(config: LoggerConfig, sink: Box<dyn LineSink>) -> Result<Self, LoggerError> {
        let (config, naming) = prepare(config)?;
        Ok(Self::launch(config, naming, Arc::new(SystemClock), sink))
    }

    fn launch(
        config: LoggerConfig,
        naming: LogFileNaming,
        clock: Arc<dyn Clock>,
        sink: Box<dyn LineSink>,
    ) -> Self {
        let (queue, receiver) = bounded(config.queue_capacity);
        let writer = LogWriter::new(receiver, sink);
        let written = writer.written();
        let writer = Arc::new(Mutex::new(writer));
        let stop = Arc::new(AtomicBool::new(false));
        let task = spawn_writer(Arc::clone(&writer), Arc::clone(&stop), config.poll_interval);

        let handle =
            LogHandle::new(queue, config.level, "root", Arc::clone(&clock)).with_console_echo(config.enable_stdout);

        Self {
            config,
            naming,
            clock,
            handle,
            stop,
            writer,
            task: Some(task),
            crash_guard: None,
            written,
        }
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// Direct, non-blocking entry point for records.
    pub fn handle(&self) -> LogHandle {
        self.handle.clone()
    }

    /// Layer that feeds `tracing` events into the JSON file.
    pub fn layer(&self) -> JsonQueueLayer {
        JsonQueueLayer::new(self.handle.clone())
    }

    /// Registry with the level filter, the JSON layer and, if enabled, a
    /// human-readable console layer.
    pub fn subscriber(&self) -> impl Subscriber + Send + Sync + 'static {
        let console = self.config.enable_stdout.then(|| {
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
        });

        Registry::default()
            .with(self.config.level.as_level_filter())
            .with(self.layer())
            .with(console)
    }

    /// Install [`subscriber`](Self::subscriber) as the process-wide default
    /// and register the panic hook.
    ///
    /// The hook logs every panic at ERROR with its backtrace. A panic inside
    /// a [`restartable_task`](crate::supervisor::restartable_task) attempt is
    /// recorded as "Panic in supervised task" with a `task` field, since the
    /// supervisor catches it; any other panic is an "Uncaught exception".
    ///
    /// Fails if another global subscriber is already installed.
    pub fn install_global(&mut self) -> Result<(), LoggerError> {
        tracing::subscriber::set_global_default(self.subscriber())?;

        let handle = self.handle.clone();
        self.crash_guard = Some(install_crash_handler(move |info| {
            let record = match supervisor::current_task_name() {
                Some(task) => {
                    LogRecord::new(Level::Error, "root", "Panic in supervised task").with_extra("task", &task)
                }
                None => LogRecord::new(Level::Error, "root", "Uncaught exception"),
            };
            handle.record(record.with_exception(panic_exception(info)));
        }));
        Ok(())
    }

    pub fn stats(&self) -> &Arc<QueueStats> {
        self.handle.queue().stats()
    }

    /// Lines the writer has put on disk so far.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn path_for_date(&self, date: NaiveDate) -> PathBuf {
        self.naming.path_for_date(date)
    }

    /// Today's file according to the manager's clock.
    pub fn today_path(&self) -> PathBuf {
        self.naming.path_for_date(self.clock.today())
    }

    /// Stop the writer and flush everything still queued.
    ///
    /// Waits up to `shutdown_timeout` for the writer task to drain and exit;
    /// a stuck task is aborted. Either way the remaining lines are then
    /// written directly, so nothing accepted before this call is lost.
    pub async fn close(mut self) {
        self.stop.store(true, Ordering::Release);

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.config.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(target: crate::INTERNAL_TARGET, error = %e, "log writer task failed");
                }
                Err(_) => {
                    warn!(target: crate::INTERNAL_TARGET, "log writer did not stop in time, aborting");
                    task.abort();
                    let _ = task.await;
                }
            }
        }

        let remainder = self.writer.lock().await.finish().await;
        if remainder > 0 {
            debug!(target: crate::INTERNAL_TARGET, remainder, "flushed queued log lines on close");
        }

        if let Some(guard) = self.crash_guard.take() {
            guard.uninstall();
        }

        info!(target: crate::INTERNAL_TARGET, "Logger closed");
    }
}

fn prepare(config: LoggerConfig) -> Result<(LoggerConfig, LogFileNaming), LoggerError> {
    if tokio::runtime::Handle::try_current().is_err() {
        return Err(LoggerError::NoRuntime);
    }

    let config = config.normalized();
    std::fs::create_dir_all(&config.log_dir).map_err(|source| LoggerError::CreateDir {
        path: config.log_dir.clone(),
        source,
    })?;
    let log_dir = std::fs::canonicalize(&config.log_dir).unwrap_or_else(|_| config.log_dir.clone());
    let naming = LogFileNaming::new(log_dir, config.base_filename.clone());
    Ok((config, naming))
}

impl Drop for LoggerManager {
    fn drop(&mut self) {
        // Not closed explicitly: let the writer drain and exit on its own.
        self.stop.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn read_lines(path: &std::path::Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn start_outside_runtime_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let result = LoggerManager::start(LoggerConfig::new(tmp.path(), "svc", 7));
        assert!(matches!(result, Err(LoggerError::NoRuntime)));
    }

    #[tokio::test]
    async fn start_creates_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("logs");
        let manager = LoggerManager::start(LoggerConfig::new(&dir, "svc", 7)).unwrap();
        assert!(dir.is_dir());
        manager.close().await;
    }

    #[tokio::test]
    async fn handle_records_reach_the_file_on_close() {
        let tmp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 2, 10, 9, 0, 0).unwrap()));
        let manager = LoggerManager::start_with_clock(LoggerConfig::new(tmp.path(), "svc", 7), clock).unwrap();

        let handle = manager.handle();
        handle.info("first");
        handle.critical("second");
        let path = manager.today_path();
        manager.close().await;

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["message"], "first");
        assert_eq!(lines[1]["level"], "CRITICAL");
        assert!(path.ends_with("2024-02-10_svc.json"));
    }

    #[tokio::test]
    async fn startup_sweep_applies_retention() {
        let tmp = TempDir::new().unwrap();
        for day in ["2024-02-06", "2024-02-07", "2024-02-08"] {
            std::fs::write(tmp.path().join(format!("{day}_svc.json")), "{}\n").unwrap();
        }
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 2, 8, 9, 0, 0).unwrap()));
        let manager = LoggerManager::start_with_clock(LoggerConfig::new(tmp.path(), "svc", 2), clock).unwrap();

        assert!(!tmp.path().join("2024-02-06_svc.json").exists());
        assert!(tmp.path().join("2024-02-07_svc.json").exists());
        assert!(tmp.path().join("2024-02-08_svc.json").exists());
        manager.close().await;
    }
}
