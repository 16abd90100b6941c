use crate::finite::has_non_finite_float;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::panic::Location;
use std::path::Path;
use std::str::FromStr;

/// Severity of a [`LogRecord`], ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }

    /// Closest `tracing` filter; `Critical` has no counterpart and maps to `ERROR`.
    pub fn as_level_filter(&self) -> tracing_subscriber::filter::LevelFilter {
        use tracing_subscriber::filter::LevelFilter;
        match self {
            Level::Debug => LevelFilter::DEBUG,
            Level::Info => LevelFilter::INFO,
            Level::Warning => LevelFilter::WARN,
            Level::Error | Level::Critical => LevelFilter::ERROR,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" | "TRACE" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARNING" | "WARN" => Ok(Level::Warning),
            "ERROR" => Ok(Level::Error),
            "CRITICAL" => Ok(Level::Critical),
            _ => Err(format!("unknown log level: {s}")),
        }
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warning,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Error details attached to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    pub kind: String,
    pub message: String,
    pub trace: Option<String>,
}

impl ExceptionInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Build from an error value, rendering its `source()` chain as the trace.
    pub fn from_error(kind: impl Into<String>, err: &(dyn Error + 'static)) -> Self {
        let mut info = Self::new(kind, err.to_string());
        let mut chain = String::new();
        let mut source = err.source();
        let mut depth = 0;
        while let Some(cause) = source {
            if depth == 0 {
                chain.push_str("Caused by:");
            }
            chain.push_str(&format!("\n    {depth}: {cause}"));
            depth += 1;
            source = cause.source();
        }
        if !chain.is_empty() {
            info.trace = Some(chain);
        }
        info
    }

    /// Text written into the `exception` field.
    pub fn formatted(&self) -> String {
        match &self.trace {
            Some(trace) if !trace.is_empty() => format!("{}: {}\n{}", self.kind, self.message, trace),
            _ => format!("{}: {}", self.kind, self.message),
        }
    }
}

/// A single log event as produced by the host process.
///
/// Records are ephemeral: they are encoded into one JSON line on the
/// producer's thread and never leave it otherwise.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub logger: String,
    pub message: String,
    pub module: String,
    pub function: String,
    pub pathname: String,
    pub line: Option<u32>,
    pub thread: String,
    pub exception: Option<ExceptionInfo>,
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl LogRecord {
    /// Create a record stamped with the current instant, thread and caller location.
    #[track_caller]
    pub fn new(level: Level, logger: impl Into<String>, message: impl Into<String>) -> Self {
        let location = Location::caller();
        let module = Path::new(location.file())
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        Self {
            timestamp: Utc::now(),
            level,
            logger: logger.into(),
            message: message.into(),
            module,
            function: "unknown".to_string(),
            pathname: location.file().to_string(),
            line: Some(location.line()),
            thread: current_thread_name(),
            exception: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = function.into();
        self
    }

    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    pub fn with_extra<T>(mut self, key: impl Into<String>, value: &T) -> Self
    where
        T: Serialize + fmt::Debug + ?Sized,
    {
        self.insert_extra(key, value);
        self
    }

    /// Attach a caller-supplied field.
    ///
    /// Values serde cannot turn into JSON (maps with non-string keys,
    /// non-finite floats, failing `Serialize` impls) are stored as their
    /// `Debug` text instead, so encoding never fails on account of an extra.
    /// Everything else, `null` included, is kept as serialized.
    pub fn insert_extra<T>(&mut self, key: impl Into<String>, value: &T)
    where
        T: Serialize + fmt::Debug + ?Sized,
    {
        let json = if has_non_finite_float(value) {
            serde_json::Value::String(format!("{value:?}"))
        } else {
            serde_json::to_value(value).unwrap_or_else(|_| serde_json::Value::String(format!("{value:?}")))
        };
        self.extra.insert(key.into(), json);
    }
}

pub(crate) fn current_thread_name() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}
