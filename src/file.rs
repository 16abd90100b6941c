use crate::clock::Clock;
use crate::retention;
use crate::sink::LineSink;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Naming scheme for daily log files: `{dir}/{YYYY-MM-DD}_{base}.json`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogFileNaming {
    dir: PathBuf,
    base_filename: String,
}

impl LogFileNaming {
    pub fn new(dir: impl Into<PathBuf>, base_filename: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base_filename: base_filename.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn base_filename(&self) -> &str {
        &self.base_filename
    }

    pub fn path_for_date(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}_{}.json", date.format("%Y-%m-%d"), self.base_filename))
    }
}

/// [`LineSink`] that appends to one file per UTC day.
///
/// The file is opened in append mode for every line and closed again, so
/// each line is on disk as soon as `write_line` returns and nothing is held
/// open across a crash. On the first write of a new day the active path is
/// switched and the retention sweep runs.
pub struct DailyFileSink {
    naming: LogFileNaming,
    storage_days: i64,
    clock: Arc<dyn Clock>,
    current_date: NaiveDate,
    current_path: PathBuf,
}

impl DailyFileSink {
    pub fn new(naming: LogFileNaming, storage_days: i64, clock: Arc<dyn Clock>) -> Self {
        let current_date = clock.today();
        let current_path = naming.path_for_date(current_date);
        Self {
            naming,
            storage_days,
            clock,
            current_date,
            current_path,
        }
    }

    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    pub fn current_date(&self) -> NaiveDate {
        self.current_date
    }

    pub fn naming(&self) -> &LogFileNaming {
        &self.naming
    }

    /// Run retention against the directory, counting the active day as present.
    pub fn sweep(&self) -> retention::RetentionReport {
        retention::sweep(
            self.naming.dir(),
            self.naming.base_filename(),
            self.storage_days,
            Some(self.current_date),
        )
    }

    async fn roll_if_needed(&mut self) {
        let today = self.clock.today();
        if today == self.current_date {
            return;
        }
        debug!(
            target: crate::INTERNAL_TARGET,
            from = %self.current_date,
            to = %today,
            "rolling log file"
        );
        self.current_date = today;
        self.current_path = self.naming.path_for_date(today);

        // Directory listing and deletes are blocking fs calls.
        let dir = self.naming.dir().to_path_buf();
        let base = self.naming.base_filename().to_string();
        let storage_days = self.storage_days;
        let swept =
            tokio::task::spawn_blocking(move || retention::sweep(&dir, &base, storage_days, Some(today))).await;
        match swept {
            Ok(report) if !report.deleted.is_empty() => {
                debug!(target: crate::INTERNAL_TARGET, deleted = report.deleted.len(), "removed old log files");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(target: crate::INTERNAL_TARGET, error = %e, "retention sweep did not complete");
            }
        }
    }
}

#[async_trait]
impl LineSink for DailyFileSink {
    async fn write_line(&mut self, line: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.roll_if_needed().await;

        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.current_path)
            .await?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
