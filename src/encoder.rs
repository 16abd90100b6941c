use crate::record::LogRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// JSON keys owned by the encoder. Extras using one of these are ignored.
pub const STANDARD_FIELDS: &[&str] = &[
    "timestamp",
    "level",
    "logger",
    "message",
    "module",
    "function",
    "thread",
    "pathname",
    "exception",
];

#[derive(Serialize)]
struct JsonLine<'a> {
    timestamp: String,
    level: &'a str,
    logger: &'a str,
    message: &'a str,
    module: &'a str,
    function: &'a str,
    thread: &'a str,
    pathname: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    exception: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<&'a str, &'a serde_json::Value>,
}

#[derive(Serialize)]
struct HandlerErrorLine<'a> {
    timestamp: String,
    level: &'static str,
    logger: &'a str,
    message: &'static str,
    module: &'a str,
    function: &'a str,
    line: Option<u32>,
    thread: &'a str,
    exception: String,
}

#[derive(Serialize)]
struct InternalErrorLine<'a> {
    timestamp: String,
    level: &'static str,
    logger: &'static str,
    message: &'a str,
    exception: &'a str,
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Encode a record into a single JSON line (no trailing newline).
///
/// Standard fields come first in a fixed order, followed by extras sorted by
/// key, so identical records always produce byte-identical output.
pub fn encode(record: &LogRecord) -> Result<String, serde_json::Error> {
    let extra = record
        .extra
        .iter()
        .filter(|(key, _)| !STANDARD_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.as_str(), value))
        .collect();

    let line = JsonLine {
        timestamp: format_timestamp(&record.timestamp),
        level: record.level.as_str(),
        logger: &record.logger,
        message: &record.message,
        module: &record.module,
        function: &record.function,
        thread: &record.thread,
        pathname: &record.pathname,
        exception: record.exception.as_ref().map(|e| e.formatted()),
        extra,
    };

    serde_json::to_string(&line)
}

/// Encode a record, substituting a handler-error entry if encoding fails.
///
/// Never fails; producers call this on their own thread and must not see
/// logging errors.
pub fn encode_or_fallback(record: &LogRecord) -> String {
    match encode(record) {
        Ok(line) => line,
        Err(e) => handler_error_line(record, &e.to_string()),
    }
}

fn handler_error_line(record: &LogRecord, detail: &str) -> String {
    let line = HandlerErrorLine {
        timestamp: format_timestamp(&Utc::now()),
        level: "ERROR",
        logger: &record.logger,
        message: "Logging handler error",
        module: &record.module,
        function: &record.function,
        line: record.line,
        thread: &record.thread,
        exception: detail.to_string(),
    };
    serde_json::to_string(&line).unwrap_or_else(|_| {
        r#"{"level":"ERROR","message":"Logging handler error"}"#.to_string()
    })
}

/// Synthetic entry the writer appends after a failed write.
pub fn internal_error_line(message: &str, detail: &str) -> String {
    let line = InternalErrorLine {
        timestamp: format_timestamp(&Utc::now()),
        level: "ERROR",
        logger: crate::INTERNAL_TARGET,
        message,
        exception: detail,
    };
    serde_json::to_string(&line)
        .unwrap_or_else(|_| format!(r#"{{"level":"ERROR","message":{:?}}}"#, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ExceptionInfo, Level};
    use chrono::TimeZone;

    fn fixed_record() -> LogRecord {
        LogRecord::new(Level::Info, "app.api", "request served")
            .with_timestamp(Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 6).unwrap())
            .with_module("api")
            .with_function("serve")
            .with_extra("status", &200)
            .with_extra("path", "/health")
    }

    #[test]
    fn encoding_is_deterministic() {
        let record = fixed_record();
        assert_eq!(encode(&record).unwrap(), encode(&record.clone()).unwrap());
    }

    #[test]
    fn standard_fields_come_first_then_sorted_extras() {
        let mut record = fixed_record();
        record.thread = "main".to_string();
        record.pathname = "src/api.rs".to_string();

        let line = encode(&record).unwrap();
        assert_eq!(
            line,
            concat!(
                r#"{"timestamp":"2024-03-09T14:05:06.000000+00:00","level":"INFO","#,
                r#""logger":"app.api","message":"request served","module":"api","#,
                r#""function":"serve","thread":"main","pathname":"src/api.rs","#,
                r#""path":"/health","status":200}"#
            )
        );
    }

    #[test]
    fn standard_fields_win_over_extras() {
        let record = fixed_record()
            .with_extra("level", "DEBUG")
            .with_extra("message", "shadowed");

        let parsed: serde_json::Value = serde_json::from_str(&encode(&record).unwrap()).unwrap();
        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["message"], "request served");
    }

    #[test]
    fn exception_is_included_only_when_present() {
        let plain: serde_json::Value = serde_json::from_str(&encode(&fixed_record()).unwrap()).unwrap();
        assert!(plain.get("exception").is_none());

        let failing = fixed_record()
            .with_exception(ExceptionInfo::new("panic", "boom").with_trace("at src/api.rs:10"));
        let parsed: serde_json::Value = serde_json::from_str(&encode(&failing).unwrap()).unwrap();
        assert_eq!(parsed["exception"], "panic: boom\nat src/api.rs:10");
    }

    #[test]
    fn internal_error_line_is_valid_json() {
        let parsed: serde_json::Value =
            serde_json::from_str(&internal_error_line("Failed to write log line", "permission denied")).unwrap();
        assert_eq!(parsed["level"], "ERROR");
        assert_eq!(parsed["logger"], crate::INTERNAL_TARGET);
        assert_eq!(parsed["exception"], "permission denied");
    }

    #[test]
    fn handler_error_line_keeps_the_record_origin() {
        let record = fixed_record();
        let parsed: serde_json::Value = serde_json::from_str(&handler_error_line(&record, "boom")).unwrap();

        assert_eq!(parsed["level"], "ERROR");
        assert_eq!(parsed["message"], "Logging handler error");
        assert_eq!(parsed["exception"], "boom");
        assert_eq!(parsed["logger"], "app.api");
        assert_eq!(parsed["module"], "api");
        assert_eq!(parsed["function"], "serve");
        assert_eq!(parsed["line"], record.line.unwrap());
    }

    #[test]
    fn encoded_line_has_no_newline() {
        let record = fixed_record().with_extra("note", "first\nsecond");
        assert!(!encode(&record).unwrap().contains('\n'));
    }
}
