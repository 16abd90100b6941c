//! Read a day's log file back for display, e.g. by a logs page that polls
//! for new lines.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// Lines of a log file plus metadata about the file itself.
#[derive(Debug, Clone, Serialize)]
pub struct LogContent {
    pub content: Vec<String>,
    pub info: LogFileInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogFileInfo {
    pub file_path: String,
    pub file_exists: bool,
    pub file_size: u64,
    pub last_modified: String,
    pub total_lines: usize,
    pub timestamp: String,
}

fn error_line(message: String) -> String {
    serde_json::json!({
        "level": "ERROR",
        "message": message,
        "timestamp": Utc::now().to_rfc3339(),
    })
    .to_string()
}

/// Read `path` as newline-delimited JSON.
///
/// Blank lines are dropped and order is preserved (oldest first). A missing
/// or unreadable file yields a single synthetic ERROR line instead of an
/// error, so callers can always render something.
pub fn read_log_content(path: &Path) -> LogContent {
    let content = match std::fs::read_to_string(path) {
        Ok(raw) => raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            vec![error_line("Log file not found.".to_string())]
        }
        Err(e) => vec![error_line(format!("Error reading log file: {e}"))],
    };

    let metadata = std::fs::metadata(path).ok();
    let last_modified = metadata
        .as_ref()
        .and_then(|m| m.modified().ok())
        .map(|t| DateTime::<Utc>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let info = LogFileInfo {
        file_path: path.display().to_string(),
        file_exists: metadata.is_some(),
        file_size: metadata.as_ref().map(|m| m.len()).unwrap_or(0),
        last_modified,
        total_lines: content.len(),
        timestamp: Utc::now().to_rfc3339(),
    };

    LogContent { content, info }
}
