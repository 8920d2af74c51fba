//! Size-bounding of log payloads
//!
//! Walks arbitrary JSON values and returns a copy of the same shape in which
//! every string leaf is bounded in length. Key paths that mention sensitive or
//! bulky payloads (images, tokens, credentials) get a stricter bound, and text
//! that looks like inline base64 is cut short regardless of its key.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Default bound for ordinary string leaves
pub const DEFAULT_MAX_LENGTH: usize = 1000;

/// Default bound for sensitive key paths and base64-looking text
pub const DEFAULT_SENSITIVE_MAX_LENGTH: usize = 100;

/// Key path fragments that select the sensitive bound
pub const DEFAULT_SENSITIVE_MARKERS: [&str; 8] = [
    "image", "base64", "file", "content", "body", "data", "password", "token",
];

static BASE64_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9+/]{50,}={0,2}$").expect("base64 pattern is a valid regex")
});

///////////////////////////////////////////////////////////////////////////////
//****                         Public Structs                            ****//
///////////////////////////////////////////////////////////////////////////////

/// Truncation limits, fixed for the lifetime of a [`Sanitizer`]
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizePolicy {
    pub max_length: usize,
    pub sensitive_max_length: usize,
    /// Stored lower-case; matched as substrings of the lower-cased key path
    pub sensitive_markers: Vec<String>,
}

impl SanitizePolicy {
    pub fn new(max_length: usize, sensitive_max_length: usize) -> Self {
        Self {
            max_length,
            sensitive_max_length,
            ..Self::default()
        }
    }

    pub fn with_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.sensitive_markers = markers
            .into_iter()
            .map(|m| m.as_ref().to_lowercase())
            .collect();
        self
    }
}

impl Default for SanitizePolicy {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            sensitive_max_length: DEFAULT_SENSITIVE_MAX_LENGTH,
            sensitive_markers: DEFAULT_SENSITIVE_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

/// Recursive content sanitizer
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    policy: SanitizePolicy,
}

impl Sanitizer {
    pub fn new(policy: SanitizePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SanitizePolicy {
        &self.policy
    }

    /// Whether `key_path` selects the sensitive bound
    pub fn is_sensitive(&self, key_path: &str) -> bool {
        if key_path.is_empty() {
            return false;
        }
        let lowered = key_path.to_lowercase();
        self.policy
            .sensitive_markers
            .iter()
            .any(|marker| lowered.contains(marker.as_str()))
    }

    /// Return a size-bounded copy of `value`.
    ///
    /// Mappings extend the key path with each key (dot-joined); sequences pass
    /// the current key path to every element. Non-string scalars are returned
    /// as-is.
    pub fn sanitize(&self, value: &Value, key_path: &str) -> Value {
        match value {
            Value::Object(map) => {
                let mut result = Map::with_capacity(map.len());
                for (key, child) in map {
                    let child_path = if key_path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", key_path, key)
                    };
                    result.insert(key.clone(), self.sanitize(child, &child_path));
                }
                Value::Object(result)
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.sanitize(item, key_path))
                    .collect(),
            ),
            Value::String(text) => Value::String(self.sanitize_text(text, key_path)),
            other => other.clone(),
        }
    }

    /// Bound a single string found at `key_path`
    pub fn sanitize_text(&self, text: &str, key_path: &str) -> String {
        let sensitive_max = self.policy.sensitive_max_length;
        let effective_max = if self.is_sensitive(key_path) {
            sensitive_max
        } else {
            self.policy.max_length
        };
        let length = text.chars().count();

        if BASE64_PATTERN.is_match(text) && length > sensitive_max {
            return format!(
                "{}... [truncated, total length: {} bytes]",
                char_prefix(text, sensitive_max),
                text.len()
            );
        }

        let trimmed = text.trim();
        if trimmed.starts_with('{') && trimmed.ends_with('}') && length > effective_max {
            // Unparsable brace-wrapped text falls through to plain truncation
            if let Ok(parsed @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
                return self.sanitize(&parsed, "").to_string();
            }
        }

        if length > effective_max {
            return format!(
                "{}... [truncated, total length: {} chars]",
                char_prefix(text, effective_max),
                length
            );
        }

        text.to_string()
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                       Public Functions                            ****//
///////////////////////////////////////////////////////////////////////////////

/// Sanitize `value` with explicit limits and the default sensitive markers
pub fn truncate_large_content(
    value: &Value,
    max_length: usize,
    sensitive_max_length: usize,
    key_path: &str,
) -> Value {
    let policy = SanitizePolicy::new(max_length, sensitive_max_length);
    Sanitizer::new(policy).sanitize(value, key_path)
}

///////////////////////////////////////////////////////////////////////////////
//****                       Private Functions                           ****//
///////////////////////////////////////////////////////////////////////////////

/// First `count` characters of `text`, never splitting a code point
fn char_prefix(text: &str, count: usize) -> &str {
    match text.char_indices().nth(count) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////
