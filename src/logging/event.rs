//! Log events and their building blocks

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::panic::Location;
use std::path::Path;

///////////////////////////////////////////////////////////////////////////////
//****                         Public Types                              ****//
///////////////////////////////////////////////////////////////////////////////

/// Severity of a log event, ordered from least to most severe
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

    /// Parse a level name, accepting the usual aliases (`warn`, `fatal`)
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warning" | "warn" => Some(Level::Warning),
            "error" => Some(Level::Error),
            "critical" | "fatal" => Some(Level::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a log event: plain text or a structured JSON value
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text(String),
    Structured(Value),
}

impl Message {
    /// Text form used on the rendered line; structured values become compact JSON
    pub fn display(&self) -> String {
        match self {
            Message::Text(text) => text.clone(),
            Message::Structured(Value::String(text)) => text.clone(),
            Message::Structured(value) => value.to_string(),
        }
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::Text(text.to_string())
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::Text(text)
    }
}

impl From<Value> for Message {
    fn from(value: Value) -> Self {
        Message::Structured(value)
    }
}

/// Where an event was emitted from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callsite {
    pub module: String,
    pub function: String,
    pub line: u32,
}

impl Callsite {
    pub fn new(module: impl Into<String>, function: impl Into<String>, line: u32) -> Self {
        Self {
            module: module.into(),
            function: function.into(),
            line,
        }
    }

    /// Build a callsite from a `module_path!()` style path, keeping the last segment
    pub fn from_module_path(module_path: &str, function: impl Into<String>, line: u32) -> Self {
        let module = module_path.rsplit("::").next().unwrap_or(module_path);
        Self::new(module, function, line)
    }

    /// Build a callsite from a `#[track_caller]` location.
    ///
    /// The module column is the source file stem; `mod.rs` files report their
    /// directory name instead.
    pub fn from_location(location: &Location<'_>) -> Self {
        let path = Path::new(location.file());
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("unknown");
        let module = if stem == "mod" {
            path.parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .unwrap_or(stem)
        } else {
            stem
        };
        Self::new(module, "-", location.line())
    }
}

/// A single log event. Built at emit time and discarded once written.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub level: Level,
    pub message: Message,
    pub timestamp: DateTime<Local>,
    pub callsite: Callsite,
    /// Contextual fields such as `service_name`, `module_source` or `request_id`
    pub extra: Map<String, Value>,
}

impl LogEvent {
    pub fn new(level: Level, message: impl Into<Message>, callsite: Callsite) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Local::now(),
            callsite,
            extra: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Service name injected by a module view, if any
    pub fn service_name(&self) -> Option<&str> {
        self.extra.get("service_name").and_then(Value::as_str)
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_level_ordering_and_names() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Error < Level::Critical);
        assert_eq!(Level::Warning.as_str(), "WARNING");
        assert_eq!(Level::parse("warn"), Some(Level::Warning));
        assert_eq!(Level::parse(" ERROR "), Some(Level::Error));
        assert_eq!(Level::parse("verbose"), None);
    }

    #[test]
    fn test_message_display() {
        assert_eq!(Message::from("plain").display(), "plain");
        let structured = Message::from(json!({"user": "alice"}));
        assert_eq!(structured.display(), r#"{"user":"alice"}"#);
    }

    #[test]
    fn test_callsite_from_module_path() {
        let callsite = Callsite::from_module_path("api_starter::server::handlers", "hi", 12);
        assert_eq!(callsite.module, "handlers");
        assert_eq!(callsite.function, "hi");
        assert_eq!(callsite.line, 12);
    }

    #[test]
    fn test_callsite_from_location() {
        let callsite = Callsite::from_location(Location::caller());
        assert_eq!(callsite.module, "event");
        assert!(callsite.line > 0);
    }

    #[test]
    fn test_event_service_name_field() {
        let event = LogEvent::new(Level::Info, "hello", Callsite::new("m", "f", 1))
            .with_field("service_name", "orders");
        assert_eq!(event.service_name(), Some("orders"));
    }
}
