//! Environment variable names used by this crate for configuring the
//! logger from the host process.
//!
//! These are purely helpers; [`LoggerConfig`](crate::config::LoggerConfig)
//! can always be built explicitly.

/// Directory that holds the daily log files.
pub const LOG_DIR_ENV: &str = "TRACING_DAILY_JSON_DIR";

/// Base identifier used in file names (`{date}_{base}.json`).
pub const LOG_BASE_FILENAME_ENV: &str = "TRACING_DAILY_JSON_BASE_FILENAME";

/// Number of daily files to keep; zero or negative keeps everything.
pub const LOG_STORAGE_DAYS_ENV: &str = "TRACING_DAILY_JSON_STORAGE_DAYS";

/// Minimum level written (`DEBUG`, `INFO`, `WARNING`, `ERROR`, `CRITICAL`).
pub const LOG_LEVEL_ENV: &str = "TRACING_DAILY_JSON_LEVEL";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read and parse an environment variable; unset, empty or unparseable
/// values yield `None`.
pub fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| v.trim().parse().ok())
}
