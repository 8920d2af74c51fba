//! Line formatting for log events
//!
//! Every sink renders events through a shared [`RecordFormatter`], producing a
//! single pipe-delimited, fixed-width line:
//!
//! ```text
//! 2026-10-19 09:15:02.114 │ api-starter  │ INFO    │ request         │ log_request          │   61 │ Received GET request for /hi
//! ```
//!
//! ## Status glyphs
//!
//! A glyph is prepended by the first matching rule in [`GLYPH_RULES`]. Order
//! matters: the duration-report rule must run before the generic success
//! keyword rule so timing lines get their marker rewritten.

use super::event::{Level, LogEvent, Message};
use super::sanitize::{Sanitizer, SanitizePolicy};
use serde_json::Value;

pub const SUCCESS_GLYPH: &str = "✅";
pub const FAILURE_GLYPH: &str = "❌";
pub const CAUTION_GLYPH: &str = "❗️";

/// Marker emitted by the timing helpers
pub const DURATION_MARKER: &str = "elapsed:";

/// Label the duration marker is rewritten to
pub const DURATION_LABEL: &str = "took";

/// Text messages longer than this are sanitized before rendering
pub const FORMAT_MAX_LENGTH: usize = 1000;

/// Bound for sensitive fields inside sanitized messages
pub const FORMAT_SENSITIVE_MAX_LENGTH: usize = 100;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const SEPARATOR: &str = " │ ";

///////////////////////////////////////////////////////////////////////////////
//****                         Glyph Rules                               ****//
///////////////////////////////////////////////////////////////////////////////

/// One (predicate, prefix) pair of the glyph table
#[derive(Debug, Clone, Copy)]
pub struct GlyphRule {
    pub name: &'static str,
    pub glyph: &'static str,
    matches: fn(&str, Level) -> bool,
    rewrite: Option<fn(&str) -> String>,
}

impl GlyphRule {
    /// Apply the rule, or `None` when it does not match.
    ///
    /// A rule never matches a message that already starts with its glyph.
    pub fn apply(&self, message: &str, level: Level) -> Option<String> {
        if message.starts_with(self.glyph) || !(self.matches)(message, level) {
            return None;
        }
        let body = match self.rewrite {
            Some(rewrite) => rewrite(message),
            None => message.to_string(),
        };
        Some(format!("{} {}", self.glyph, body))
    }
}

/// Glyph rules in evaluation order; first match wins
pub const GLYPH_RULES: [GlyphRule; 4] = [
    GlyphRule {
        name: "duration",
        glyph: SUCCESS_GLYPH,
        matches: reports_duration,
        rewrite: Some(rewrite_duration),
    },
    GlyphRule {
        name: "lifecycle",
        glyph: SUCCESS_GLYPH,
        matches: reports_lifecycle,
        rewrite: None,
    },
    GlyphRule {
        name: "failure",
        glyph: FAILURE_GLYPH,
        matches: is_failure,
        rewrite: None,
    },
    GlyphRule {
        name: "caution",
        glyph: CAUTION_GLYPH,
        matches: is_caution,
        rewrite: None,
    },
];

fn reports_duration(message: &str, _: Level) -> bool {
    message.contains(DURATION_MARKER)
}

fn rewrite_duration(message: &str) -> String {
    message.replace(DURATION_MARKER, DURATION_LABEL)
}

fn reports_lifecycle(message: &str, _: Level) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("initialized") || lowered.contains("started")
}

fn is_failure(_: &str, level: Level) -> bool {
    level >= Level::Error
}

fn is_caution(_: &str, level: Level) -> bool {
    level == Level::Warning
}

/// Prefix `message` with the glyph of the first matching rule
pub fn decorate(message: &str, level: Level) -> String {
    GLYPH_RULES
        .iter()
        .find_map(|rule| rule.apply(message, level))
        .unwrap_or_else(|| message.to_string())
}

///////////////////////////////////////////////////////////////////////////////
//****                         Public Structs                            ****//
///////////////////////////////////////////////////////////////////////////////

/// Renders events into single log lines
#[derive(Debug, Clone)]
pub struct RecordFormatter {
    service_name: String,
    sanitizer: Sanitizer,
}

impl RecordFormatter {
    /// `service_name` is used for events that do not carry their own
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            sanitizer: Sanitizer::new(SanitizePolicy::new(
                FORMAT_MAX_LENGTH,
                FORMAT_SENSITIVE_MAX_LENGTH,
            )),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Sanitize mappings and oversized text; everything else passes through
    pub fn prepare_message(&self, message: &Message) -> Message {
        match message {
            Message::Structured(value @ Value::Object(_)) => {
                Message::Structured(self.sanitizer.sanitize(value, ""))
            }
            Message::Text(text) if text.chars().count() > FORMAT_MAX_LENGTH => {
                Message::Text(self.sanitizer.sanitize_text(text, ""))
            }
            other => other.clone(),
        }
    }

    /// Render `event` without a trailing newline
    pub fn render(&self, event: &LogEvent) -> String {
        let message = self.prepare_message(&event.message).display();
        let message = decorate(&message, event.level);
        let service_name = event.service_name().unwrap_or(&self.service_name);

        format!(
            "{timestamp}{sep}{service:<12}{sep}{level:<7}{sep}{module:<15}{sep}{function:<20}{sep}{line:>4}{sep}{message}",
            timestamp = event.timestamp.format(TIMESTAMP_FORMAT),
            sep = SEPARATOR,
            service = service_name,
            level = event.level.as_str(),
            module = clip(&event.callsite.module, 15),
            function = clip(&event.callsite.function, 20),
            line = event.callsite.line,
            message = message,
        )
    }
}

/// Truncate to `width` characters
fn clip(text: &str, width: usize) -> &str {
    match text.char_indices().nth(width) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////
