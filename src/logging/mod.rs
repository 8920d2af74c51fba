//! # Logging Module
//!
//! Structured logging for the API starter. Every event is rendered into one
//! pipe-delimited, fixed-width line and written to the console, a rotating
//! log file and an errors-only rotating file.
//!
//! ## Features
//!
//! - **Content Sanitizer**: size-bounds nested payloads, with stricter limits
//!   for sensitive keys and inline base64
//! - **Record Formatter**: fixed-width layout with status glyphs
//! - **Logger Registry**: one logger per (module, file) identity
//! - **Destination Router**: console, primary file and error file sinks
//! - **Timing & Request Logging**: duration reports and an axum middleware
//! - **Tracing Bridge**: routes `tracing` events into the same files
//!
//! ## Macros
//!
//! The level macros record `module_path!()` and `line!()`; pass
//! `func = function_name!()` from inside a `#[named]` function to fill the
//! function column.
//!
//! ```rust,ignore
//! log_info!(log, "loaded {} users", count);
//! log_error!(log, func = function_name!(), "lookup failed: {}", err);
//! ```

pub mod bridge;
pub mod error;
pub mod event;
pub mod format;
pub mod registry;
pub mod request;
pub mod rotation;
pub mod router;
pub mod sanitize;
pub mod sink;
pub mod timing;

pub use error::{LogError, LogResult};
pub use event::{Callsite, Level, LogEvent, Message};
pub use format::RecordFormatter;
pub use registry::{ContextLogger, Logger, LoggerRegistry, LoggingSettings};
pub use rotation::MULTIPROCESS_SINK_AVAILABLE;
pub use router::DestinationRouter;
pub use sanitize::{Sanitizer, SanitizePolicy, truncate_large_content};
pub use timing::{time_async, time_sync};

/// Emit a formatted text event at an explicit level
#[macro_export]
macro_rules! log_event {
    ($logger:expr, $level:expr, func = $func:expr, $($arg:tt)+) => {{
        let logger: &$crate::logging::ContextLogger = &$logger;
        let level: $crate::logging::Level = $level;
        if logger.is_enabled_for(level) {
            let callsite =
                $crate::logging::Callsite::from_module_path(module_path!(), $func, line!());
            logger.report(logger.log(level, callsite, format!($($arg)+)));
        }
    }};
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $crate::log_event!($logger, $level, func = "-", $($arg)+)
    };
}

#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log_event!($logger, $crate::logging::Level::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log_event!($logger, $crate::logging::Level::Info, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_warning {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log_event!($logger, $crate::logging::Level::Warning, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log_event!($logger, $crate::logging::Level::Error, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_critical {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log_event!($logger, $crate::logging::Level::Critical, $($arg)+)
    };
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::sink::MemorySink;
    use super::*;
    use function_name::named;
    use std::sync::Arc;

    fn memory_logger(level: Level) -> (ContextLogger, Arc<MemorySink>) {
        let formatter = Arc::new(RecordFormatter::new("svc"));
        let memory = Arc::new(MemorySink::new(Level::Debug, formatter));
        let mut logger = Logger::new("app", level);
        logger.add_sink(memory.clone());
        (ContextLogger::new(Arc::new(logger)), memory)
    }

    #[test]
    fn test_macros_record_module_and_format_args() {
        let (log, memory) = memory_logger(Level::Debug);
        log_info!(log, "loaded {} users", 3);
        log_debug!(log, "cache warm");

        let lines = memory.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(" │ tests           │ -                    │ "));
        assert!(lines[0].ends_with("│ loaded 3 users"));
    }

    #[test]
    #[named]
    fn test_macros_accept_function_name() {
        let (log, memory) = memory_logger(Level::Debug);
        log_error!(log, func = function_name!(), "lookup failed: {}", "timeout");

        let line = &memory.lines()[0];
        assert!(line.contains("│ test_macros_accept_f │"));
        assert!(line.ends_with("❌ lookup failed: timeout"));
    }

    #[test]
    fn test_macros_respect_logger_level() {
        let (log, memory) = memory_logger(Level::Warning);
        log_info!(log, "quiet");
        log_warning!(log, "disk at {}%", 91);
        log_critical!(log, "disk full");
        assert_eq!(memory.count(), 2);
    }
}
