use crate::handle::LogHandle;
use crate::record::{current_thread_name, ExceptionInfo, Level, LogRecord};
use chrono::Utc;
use std::collections::BTreeMap;
use std::error::Error;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Field name that promotes an event's level, e.g. `severity = "CRITICAL"`.
pub const SEVERITY_FIELD: &str = "severity";

/// `tracing_subscriber` layer that turns events into JSON lines and pushes
/// them onto the manager's bounded queue.
///
/// Encoding happens on the emitting thread; disk I/O happens on the writer
/// task, so `on_event` never blocks. Events under
/// [`INTERNAL_TARGET`](crate::INTERNAL_TARGET) are skipped so that the
/// writer's own diagnostics cannot feed back into the file.
#[derive(Clone, Debug)]
pub struct JsonQueueLayer {
    handle: LogHandle,
}

impl JsonQueueLayer {
    pub fn new(handle: LogHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &LogHandle {
        &self.handle
    }
}

impl<S> Layer<S> for JsonQueueLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target().starts_with(crate::INTERNAL_TARGET) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut level = Level::from(meta.level());
        if let Some(promoted) = visitor.severity.as_deref().and_then(|s| s.parse::<Level>().ok()) {
            level = level.max(promoted);
        }
        if !self.handle.enabled(level) {
            return;
        }

        let function = ctx
            .event_span(event)
            .map(|span| span.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let record = LogRecord {
            timestamp: Utc::now(),
            level,
            logger: meta.target().to_string(),
            message: visitor.message.unwrap_or_default(),
            module: meta.module_path().unwrap_or("unknown").to_string(),
            function,
            pathname: meta.file().unwrap_or("unknown").to_string(),
            line: meta.line(),
            thread: current_thread_name(),
            exception: visitor.exception,
            extra: visitor.fields,
        };

        self.handle.enqueue(&record);
    }
}

/// Collects event fields into extras, pulling out the message, severity
/// and the first error value.
#[derive(Default)]
pub struct FieldVisitor {
    pub fields: BTreeMap<String, serde_json::Value>,
    pub message: Option<String>,
    pub severity: Option<String>,
    pub exception: Option<ExceptionInfo>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            SEVERITY_FIELD => self.severity = Some(value.to_string()),
            name => {
                self.fields.insert(name.to_string(), serde_json::Value::String(value.to_string()));
            }
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        let json = if value.is_finite() {
            serde_json::Value::from(value)
        } else {
            serde_json::Value::String(value.to_string())
        };
        self.fields.insert(field.name().to_string(), json);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if self.exception.is_none() {
            self.exception = Some(ExceptionInfo::from_error(field.name(), value));
        } else {
            self.fields
                .insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = Some(format!("{:?}", value)),
            SEVERITY_FIELD => self.severity = Some(format!("{:?}", value).trim_matches('"').to_string()),
            name => {
                self.fields.insert(name.to_string(), serde_json::Value::String(format!("{:?}", value)));
            }
        }
    }
}
