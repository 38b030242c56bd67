//! Log Capture Utilities for Testing
//!
//! Records tracing events (message plus structured fields) so tests can
//! assert that a coerced category or a failed background write was logged.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use tracing::subscriber::DefaultGuard;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

/// Captured log record
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Level,
    pub target: String,
    pub message: String,
    /// Remaining fields rendered as `name=value`, space separated
    pub fields: String,
}

/// Log capture layer for testing
#[derive(Clone, Default)]
pub struct LogCapture {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }

    /// Records at `level` whose message contains `pattern`
    pub fn matching_at(&self, level: Level, pattern: &str) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.level == level && r.message.contains(pattern))
            .collect()
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.records().iter().any(|r| r.message.contains(pattern))
    }

    /// Assert at least one log matches pattern
    pub fn assert_contains(&self, pattern: &str) {
        assert!(
            self.contains(pattern),
            "Expected log matching '{}', but none found. All logs:\n{}",
            pattern,
            self.records()
                .iter()
                .map(|r| r.message.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        );
    }
}

impl<S> tracing_subscriber::Layer<S> for LogCapture
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        use tracing::field::Visit;

        #[derive(Default)]
        struct FieldVisitor {
            message: String,
            fields: String,
        }

        impl Visit for FieldVisitor {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "message" {
                    self.message = value.to_string();
                } else {
                    let _ = write!(self.fields, "{}={} ", field.name(), value);
                }
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.message = format!("{:?}", value);
                } else {
                    let _ = write!(self.fields, "{}={:?} ", field.name(), value);
                }
            }
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        self.records.lock().unwrap().push(LogRecord {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            message: visitor.message,
            fields: visitor.fields.trim_end().to_string(),
        });
    }
}

/// Capture logs on the current thread until the guard is dropped
///
/// Works with the default current-thread `#[tokio::test]` runtime.
pub fn capture_logs() -> (LogCapture, DefaultGuard) {
    let capture = LogCapture::new();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (capture, guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captures_message_and_fields() {
        let (capture, _guard) = capture_logs();

        tracing::warn!(raw = %"Dairy Stuff", "Unrecognized category");

        let records = capture.matching_at(Level::WARN, "Unrecognized");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fields, "raw=Dairy Stuff");
    }

    #[test]
    #[should_panic(expected = "Expected log matching")]
    fn test_assert_contains_fails() {
        let capture = LogCapture::new();
        capture.assert_contains("nonexistent pattern");
    }
}
