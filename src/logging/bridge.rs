//! # Tracing Bridge
//!
//! A [`tracing_subscriber::Layer`] that forwards `tracing` events (axum,
//! tower-http and this crate) into a registry logger, so framework output is
//! rendered in the same line format and lands in the same files.
//!
//! Event fields other than `message` are appended to the message as
//! `key=value` pairs and copied into the event's extra fields.

use super::event::{Callsite, Level, LogEvent};
use super::registry::ContextLogger;
use serde_json::Value;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

/// Filter used when neither `STARTER_LOG_LEVEL` nor `RUST_LOG` is usable
pub const DEFAULT_FILTER: &str = "api_starter=info,tower_http=info";

/// Layer forwarding tracing events to a [`ContextLogger`]
#[derive(Debug, Clone)]
pub struct LogBridgeLayer {
    logger: ContextLogger,
}

impl LogBridgeLayer {
    pub fn new(logger: ContextLogger) -> Self {
        Self { logger }
    }
}

impl<S> Layer<S> for LogBridgeLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = map_level(metadata.level());
        if !self.logger.is_enabled_for(level) {
            return;
        }

        let mut visitor = FieldCollector::default();
        event.record(&mut visitor);

        let module = metadata.module_path().unwrap_or_else(|| metadata.target());
        let callsite = Callsite::from_module_path(module, "-", metadata.line().unwrap_or(0));
        let mut log_event = LogEvent::new(level, visitor.render(), callsite);
        for (key, value) in visitor.fields {
            log_event.extra.insert(key, value);
        }
        self.logger.report(self.logger.emit(log_event));
    }
}

/// Map tracing levels onto log levels; TRACE folds into DEBUG
pub fn map_level(level: &tracing::Level) -> Level {
    match *level {
        tracing::Level::TRACE | tracing::Level::DEBUG => Level::Debug,
        tracing::Level::INFO => Level::Info,
        tracing::Level::WARN => Level::Warning,
        tracing::Level::ERROR => Level::Error,
    }
}

/// Parse `directives`, falling back to [`DEFAULT_FILTER`] when they are invalid
pub fn build_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the bridge as the global tracing subscriber
pub fn init_tracing(directives: &str, logger: ContextLogger) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(build_filter(directives))
        .with(LogBridgeLayer::new(logger))
        .try_init()
}

/// Collects the message and remaining fields of one event
#[derive(Default)]
struct FieldCollector {
    message: String,
    fields: Vec<(String, Value)>,
}

impl FieldCollector {
    fn render(&self) -> String {
        let mut rendered = self.message.clone();
        for (key, value) in &self.fields {
            if !rendered.is_empty() {
                rendered.push(' ');
            }
            match value {
                Value::String(text) => rendered.push_str(&format!("{}={}", key, text)),
                other => rendered.push_str(&format!("{}={}", key, other)),
            }
        }
        rendered
    }

    fn push(&mut self, field: &Field, value: Value) {
        self.fields.push((field.name().to_string(), value));
    }
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.push(field, Value::String(format!("{:?}", value)));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push(field, Value::from(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, Value::from(value));
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::format::RecordFormatter;
    use crate::logging::registry::Logger;
    use crate::logging::sink::MemorySink;
    use std::sync::Arc;

    fn memory_logger(level: Level) -> (ContextLogger, Arc<MemorySink>) {
        let formatter = Arc::new(RecordFormatter::new("svc"));
        let memory = Arc::new(MemorySink::new(Level::Debug, formatter));
        let mut logger = Logger::new("app", level);
        logger.add_sink(memory.clone());
        (ContextLogger::new(Arc::new(logger)), memory)
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(map_level(&tracing::Level::TRACE), Level::Debug);
        assert_eq!(map_level(&tracing::Level::WARN), Level::Warning);
        assert_eq!(map_level(&tracing::Level::ERROR), Level::Error);
    }

    #[test]
    fn test_events_are_forwarded_with_fields() {
        let (log, memory) = memory_logger(Level::Debug);
        let subscriber = tracing_subscriber::registry()
            .with(build_filter("debug"))
            .with(LogBridgeLayer::new(log));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(port = 8080, "Server started");
            tracing::warn!("slow upstream");
        });

        let lines = memory.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("│ INFO    │ tests "));
        assert!(lines[0].ends_with("✅ Server started port=8080"));
        assert!(lines[1].ends_with("❗️ slow upstream"));
    }

    #[test]
    fn test_filter_drops_events() {
        let (log, memory) = memory_logger(Level::Debug);
        let subscriber = tracing_subscriber::registry()
            .with(build_filter("warn"))
            .with(LogBridgeLayer::new(log));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("filtered out");
            tracing::error!("kept");
        });

        assert_eq!(memory.count(), 1);
        assert!(memory.lines()[0].ends_with("❌ kept"));
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
