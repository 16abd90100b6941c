use std::path::PathBuf;

/// Errors returned while starting or installing a [`LoggerManager`](crate::manager::LoggerManager).
///
/// Once running, the logger never returns errors to producers; write and
/// retention failures are reported through internal events instead.
#[derive(thiserror::Error, Debug)]
pub enum LoggerError {
    #[error("failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("logger must be started from within a tokio runtime")]
    NoRuntime,

    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Errors returned when loading a [`Settings`](crate::config::Settings) file.
#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
