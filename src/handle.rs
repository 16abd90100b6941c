use crate::clock::Clock;
use crate::encoder::encode_or_fallback;
use crate::queue::LogQueue;
use crate::record::{Level, LogRecord};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Cheap, cloneable entry point for emitting records straight into the queue.
///
/// Every method is non-blocking: the record is encoded on the caller's
/// thread and offered to the queue; a full queue drops it silently. With
/// console echo on, each accepted record is also emitted as a `tracing`
/// event under [`INTERNAL_TARGET`](crate::INTERNAL_TARGET), which the
/// console layer prints and the JSON layer skips.
#[derive(Clone)]
pub struct LogHandle {
    queue: LogQueue,
    min_level: Level,
    logger: Arc<str>,
    clock: Arc<dyn Clock>,
    echo: bool,
}

impl fmt::Debug for LogHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogHandle")
            .field("min_level", &self.min_level)
            .field("logger", &self.logger)
            .field("echo", &self.echo)
            .finish()
    }
}

impl LogHandle {
    pub(crate) fn new(queue: LogQueue, min_level: Level, logger: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            queue,
            min_level,
            logger: Arc::from(logger),
            clock,
            echo: false,
        }
    }

    /// Also print every accepted record on the console.
    pub fn with_console_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn queue(&self) -> &LogQueue {
        &self.queue
    }

    pub fn min_level(&self) -> Level {
        self.min_level
    }

    pub fn enabled(&self, level: Level) -> bool {
        level >= self.min_level
    }

    /// Encode and enqueue a prepared record. Returns `false` if it was
    /// filtered out or dropped.
    pub fn record(&self, record: LogRecord) -> bool {
        if !self.enabled(record.level) {
            return false;
        }
        if self.echo {
            echo_to_console(&record);
        }
        self.queue.enqueue(encode_or_fallback(&record))
    }

    /// Queue-only path for records that already came through `tracing`.
    pub(crate) fn enqueue(&self, record: &LogRecord) -> bool {
        self.enabled(record.level) && self.queue.enqueue(encode_or_fallback(record))
    }

    #[track_caller]
    pub fn log(&self, level: Level, message: impl Into<String>) -> bool {
        if !self.enabled(level) {
            return false;
        }
        let record = LogRecord::new(level, &*self.logger, message).with_timestamp(self.clock.now());
        self.record(record)
    }

    /// Like [`log`](Self::log) with structured extra fields.
    #[track_caller]
    pub fn log_with<K, V, I>(&self, level: Level, message: impl Into<String>, extras: I) -> bool
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Serialize + fmt::Debug,
    {
        if !self.enabled(level) {
            return false;
        }
        let mut record = LogRecord::new(level, &*self.logger, message).with_timestamp(self.clock.now());
        for (key, value) in extras {
            record.insert_extra(key, &value);
        }
        self.record(record)
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) -> bool {
        self.log(Level::Debug, message)
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>) -> bool {
        self.log(Level::Info, message)
    }

    #[track_caller]
    pub fn warning(&self, message: impl Into<String>) -> bool {
        self.log(Level::Warning, message)
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>) -> bool {
        self.log(Level::Error, message)
    }

    #[track_caller]
    pub fn critical(&self, message: impl Into<String>) -> bool {
        self.log(Level::Critical, message)
    }
}

macro_rules! console_event {
    ($level:expr, $record:ident, $exception:ident) => {
        tracing::event!(
            target: crate::INTERNAL_TARGET,
            $level,
            logger = &*$record.logger,
            severity = $record.level.as_str(),
            exception = $exception.as_deref(),
            "{}",
            $record.message
        )
    };
}

fn echo_to_console(record: &LogRecord) {
    let exception = record.exception.as_ref().map(|e| e.formatted());
    match record.level {
        Level::Debug => console_event!(tracing::Level::DEBUG, record, exception),
        Level::Info => console_event!(tracing::Level::INFO, record, exception),
        Level::Warning => console_event!(tracing::Level::WARN, record, exception),
        Level::Error | Level::Critical => console_event!(tracing::Level::ERROR, record, exception),
    }
}
