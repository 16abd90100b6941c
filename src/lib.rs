pub mod record;
pub mod encoder;
pub mod queue;
pub mod sink;
pub mod file;
pub mod retention;
pub mod writer;
pub mod handle;
pub mod layer;

pub mod clock;
pub mod config;
pub mod crash;
pub mod env;
pub mod error;
mod finite;
pub mod manager;
pub mod noop_sink;
pub mod supervisor;
pub mod viewer;

pub use config::LoggerConfig;
pub use error::LoggerError;
pub use handle::LogHandle;
pub use manager::LoggerManager;
pub use record::{ExceptionInfo, Level, LogRecord};

/// Target used by the crate's own diagnostics. Events under it go to the
/// console only and are never written to the JSON files.
pub const INTERNAL_TARGET: &str = "tracing_daily_json::internal";
