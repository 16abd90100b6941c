use crate::env::{env_or, env_parse, LOG_BASE_FILENAME_ENV, LOG_DIR_ENV, LOG_LEVEL_ENV, LOG_STORAGE_DAYS_ENV};
use crate::error::SettingsError;
use crate::queue::DEFAULT_QUEUE_CAPACITY;
use crate::record::Level;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::time::Duration;

/// Default directory for log files, relative to the working directory.
pub const DEFAULT_LOG_DIR: &str = "Logs";

/// Default number of daily files kept.
pub const DEFAULT_STORAGE_DAYS: i64 = 7;

/// Configuration for a [`LoggerManager`](crate::manager::LoggerManager).
///
/// **Fields**
/// - `log_dir`: directory for the daily files; created on start.
/// - `base_filename`: identifier in `{YYYY-MM-DD}_{base_filename}.json`.
/// - `storage_days`: newest files kept by the retention sweep; `<= 0`
///   disables deletion.
/// - `level`: minimum level recorded by both sinks.
/// - `queue_capacity`: lines buffered before new ones are dropped.
/// - `poll_interval`: longest the writer waits on an empty queue before
///   re-checking the stop signal.
/// - `shutdown_timeout`: how long `close` waits for the writer task.
/// - `enable_stdout`: if `true`, a human-readable `fmt` layer also prints
///   every record to the console.
#[derive(Clone, Debug)]
pub struct LoggerConfig {
    pub log_dir: PathBuf,
    pub base_filename: String,
    pub storage_days: i64,
    pub level: Level,
    pub queue_capacity: usize,
    pub poll_interval: Duration,
    pub shutdown_timeout: Duration,
    pub enable_stdout: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            base_filename: base_filename_from_cwd(),
            storage_days: DEFAULT_STORAGE_DAYS,
            level: Level::Info,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: Duration::from_millis(500),
            shutdown_timeout: Duration::from_secs(3),
            enable_stdout: true,
        }
    }
}

impl LoggerConfig {
    pub fn new(log_dir: impl Into<PathBuf>, base_filename: impl Into<String>, storage_days: i64) -> Self {
        Self {
            log_dir: log_dir.into(),
            base_filename: base_filename.into(),
            storage_days,
            ..Self::default()
        }
    }

    /// Defaults overridden by the `TRACING_DAILY_JSON_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            log_dir: PathBuf::from(env_or(LOG_DIR_ENV, &defaults.log_dir.to_string_lossy())),
            base_filename: env_parse(LOG_BASE_FILENAME_ENV).unwrap_or(defaults.base_filename),
            storage_days: env_parse(LOG_STORAGE_DAYS_ENV).unwrap_or(defaults.storage_days),
            level: env_parse(LOG_LEVEL_ENV).unwrap_or(defaults.level),
            ..defaults
        }
    }

    /// Clamp values that would make the pipeline degenerate.
    pub(crate) fn normalized(mut self) -> Self {
        self.queue_capacity = self.queue_capacity.max(1);
        if self.poll_interval < Duration::from_millis(10) {
            self.poll_interval = Duration::from_millis(10);
        }
        if self.base_filename.trim().is_empty() {
            self.base_filename = base_filename_from_cwd();
        }
        self
    }
}

/// Name of the current working directory, used as the default base filename.
pub fn base_filename_from_cwd() -> String {
    std::env::current_dir()
        .ok()
        .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "app".to_string())
}

/// Application settings file (JSON) with the logging keys.
///
/// Empty strings are treated as unset. Unknown keys are ignored so the
/// logger can share a settings file with the rest of the application.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(rename = "LOG_PATH", default, deserialize_with = "empty_as_none")]
    pub log_path: Option<String>,
    #[serde(rename = "STORAGE_DAYS", default)]
    pub storage_days: Option<i64>,
    #[serde(rename = "BASE_FILENAME", default, deserialize_with = "empty_as_none")]
    pub base_filename: Option<String>,
    #[serde(rename = "LOG_LEVEL", default)]
    pub log_level: Option<Level>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

impl Settings {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn into_config(self) -> LoggerConfig {
        let defaults = LoggerConfig::default();
        LoggerConfig {
            log_dir: self.log_path.map(PathBuf::from).unwrap_or(defaults.log_dir),
            base_filename: self.base_filename.unwrap_or(defaults.base_filename),
            storage_days: self.storage_days.unwrap_or(defaults.storage_days),
            level: self.log_level.unwrap_or(defaults.level),
            ..defaults
        }
    }
}
