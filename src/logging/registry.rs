//! # Logger Registry
//!
//! Hands out configured loggers keyed by a (module, file) identity. The first
//! request for an identity builds the logger and attaches its sinks; every
//! later request gets the same logger back, so sinks are never duplicated.
//!
//! ## Features
//! - One logger per `"{module}_{file}"` identity for the registry lifetime
//! - Size-rotating, process-safe file sinks when several workers share the
//!   log directory; daily rotation otherwise
//! - [`ContextLogger`] views that stamp `module_source` and `service_name`
//!   on every event without touching the shared logger
//!
//! ## Usage
//! ```rust,ignore
//! let registry = LoggerRegistry::from_env();
//! let log = registry.get_logger(Some("orders"), None)?;
//! log.info("order service initialized");
//! ```

use super::error::{LogError, LogResult};
use super::event::{Callsite, Level, LogEvent, Message};
use super::format::RecordFormatter;
use super::router::DestinationRouter;
use super::sink::Sink;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::panic::Location;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub const DEFAULT_SERVICE_NAME: &str = "api-starter";
pub const DEFAULT_LOGGER_NAME: &str = "app";
pub const DEFAULT_LOG_FILE: &str = "app.log";
pub const DEFAULT_LOG_DIR: &str = "logs";

///////////////////////////////////////////////////////////////////////////////
//****                             Logger                                ****//
///////////////////////////////////////////////////////////////////////////////

/// A named logger dispatching events to its sinks
pub struct Logger {
    name: String,
    min_level: Level,
    sinks: Vec<Arc<dyn Sink>>,
}

impl Logger {
    /// A logger with no sinks
    pub fn new(name: impl Into<String>, min_level: Level) -> Self {
        Self {
            name: name.into(),
            min_level,
            sinks: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_level(&self) -> Level {
        self.min_level
    }

    pub fn is_enabled_for(&self, level: Level) -> bool {
        level >= self.min_level
    }

    pub fn add_sink(&mut self, sink: Arc<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn clear_sinks(&mut self) {
        self.sinks.clear();
    }

    pub fn sinks(&self) -> &[Arc<dyn Sink>] {
        &self.sinks
    }

    /// Dispatch `event` to every sink that accepts its level.
    ///
    /// All sinks are attempted; the first failure is returned.
    pub fn log(&self, event: &LogEvent) -> LogResult<()> {
        if !self.is_enabled_for(event.level) {
            return Ok(());
        }

        let mut first_error = None;
        for sink in self.sinks.iter().filter(|s| s.accepts(event.level)) {
            if let Err(e) = sink.write(event) {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("min_level", &self.min_level)
            .field("sinks", &self.sinks.iter().map(|s| s.kind()).collect::<Vec<_>>())
            .finish()
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                          Context Logger                           ****//
///////////////////////////////////////////////////////////////////////////////

/// Handle over a shared [`Logger`] carrying fixed extra fields.
///
/// Fields held by the handle overwrite same-named fields on the event.
#[derive(Debug, Clone)]
pub struct ContextLogger {
    logger: Arc<Logger>,
    extra: Map<String, Value>,
}

impl ContextLogger {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self {
            logger,
            extra: Map::new(),
        }
    }

    /// A copy of this handle with one more extra field
    pub fn with_field(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut extra = self.extra.clone();
        extra.insert(key.into(), value.into());
        Self {
            logger: self.logger.clone(),
            extra,
        }
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn is_enabled_for(&self, level: Level) -> bool {
        self.logger.is_enabled_for(level)
    }

    /// Merge the handle's fields into `event` and dispatch it
    pub fn emit(&self, mut event: LogEvent) -> LogResult<()> {
        for (key, value) in &self.extra {
            event.extra.insert(key.clone(), value.clone());
        }
        self.logger.log(&event)
    }

    pub fn log(
        &self,
        level: Level,
        callsite: Callsite,
        message: impl Into<Message>,
    ) -> LogResult<()> {
        self.emit(LogEvent::new(level, message, callsite))
    }

    /// Log at `level` with the caller's location, reporting sink failures on stderr
    #[track_caller]
    pub fn log_at(&self, level: Level, message: impl Into<Message>) {
        if !self.is_enabled_for(level) {
            return;
        }
        let callsite = Callsite::from_location(Location::caller());
        self.report(self.log(level, callsite, message));
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<Message>) {
        self.log_at(Level::Debug, message);
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<Message>) {
        self.log_at(Level::Info, message);
    }

    #[track_caller]
    pub fn warning(&self, message: impl Into<Message>) {
        self.log_at(Level::Warning, message);
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<Message>) {
        self.log_at(Level::Error, message);
    }

    #[track_caller]
    pub fn critical(&self, message: impl Into<Message>) {
        self.log_at(Level::Critical, message);
    }

    /// Print a failed emit to stderr; logging never aborts the caller
    pub fn report(&self, result: LogResult<()>) {
        if let Err(e) = result {
            eprintln!("--- Logging error in logger '{}': {}", self.logger.name(), e);
        }
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                            Settings                               ****//
///////////////////////////////////////////////////////////////////////////////

/// Logging settings read from the process environment
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub log_dir: PathBuf,
    pub min_level: Level,
    pub service_name: Option<String>,
    pub web_concurrency: u32,
    pub workers: u32,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            min_level: Level::Info,
            service_name: None,
            web_concurrency: 1,
            workers: 1,
        }
    }
}

impl LoggingSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    ///
    /// Unparsable worker counts count as a single worker. `STARTER_LOG_LEVEL`
    /// only sets the logger level when it is a bare level name.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let worker_count = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or(1)
        };

        Self {
            log_dir: lookup("STARTER_LOG_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            min_level: lookup("STARTER_LOG_LEVEL")
                .and_then(|v| Level::parse(&v))
                .unwrap_or(defaults.min_level),
            service_name: lookup("SERVICE_NAME").filter(|v| !v.trim().is_empty()),
            web_concurrency: worker_count("WEB_CONCURRENCY"),
            workers: worker_count("STARTER_WORKERS"),
        }
    }

    /// True when more than one worker process will share the log files
    pub fn is_multiprocess_environment(&self) -> bool {
        self.web_concurrency > 1 || self.workers > 1
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                            Registry                               ****//
///////////////////////////////////////////////////////////////////////////////

/// Process-wide cache of configured loggers
pub struct LoggerRegistry {
    settings: LoggingSettings,
    service_name: String,
    router: DestinationRouter,
    formatter: Arc<RecordFormatter>,
    loggers: Mutex<HashMap<String, Arc<Logger>>>,
}

impl LoggerRegistry {
    pub fn new(settings: LoggingSettings) -> Self {
        let service_name = settings
            .service_name
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());
        let router = DestinationRouter::new(settings.log_dir.clone());
        let formatter = Arc::new(RecordFormatter::new(service_name.clone()));

        Self {
            settings,
            service_name,
            router,
            formatter,
            loggers: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_env() -> Self {
        Self::new(LoggingSettings::from_env())
    }

    /// Replace the destination router, e.g. to change rotation limits
    pub fn with_router(mut self, router: DestinationRouter) -> Self {
        self.router = router;
        self
    }

    pub fn settings(&self) -> &LoggingSettings {
        &self.settings
    }

    /// Service name resolved when the registry was built
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn router(&self) -> &DestinationRouter {
        &self.router
    }

    pub fn formatter(&self) -> Arc<RecordFormatter> {
        self.formatter.clone()
    }

    /// Number of distinct identities configured so far
    pub fn logger_count(&self) -> usize {
        self.loggers.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// Get or build the logger for `(module, file)`.
    ///
    /// The sink policy follows the worker count in the environment.
    pub fn get_logger(
        &self,
        module: Option<&str>,
        file: Option<&str>,
    ) -> LogResult<ContextLogger> {
        self.get_logger_with(module, file, None)
    }

    /// Like [`get_logger`](Self::get_logger) with an explicit process-safety choice.
    ///
    /// `multiprocess_safe` only matters on the first request for an identity.
    pub fn get_logger_with(
        &self,
        module: Option<&str>,
        file: Option<&str>,
        multiprocess_safe: Option<bool>,
    ) -> LogResult<ContextLogger> {
        let key = identity_key(module, file);
        let logger = {
            let mut loggers = self
                .loggers
                .lock()
                .map_err(|_| LogError::Internal("logger registry lock poisoned".to_string()))?;

            match loggers.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let multiprocess = multiprocess_safe
                        .unwrap_or_else(|| self.settings.is_multiprocess_environment());
                    let mut logger = Logger::new(
                        module.unwrap_or(DEFAULT_LOGGER_NAME),
                        self.settings.min_level,
                    );
                    logger.clear_sinks();
                    self.router.attach_sinks(
                        &mut logger,
                        file.unwrap_or(DEFAULT_LOG_FILE),
                        self.formatter.clone(),
                        multiprocess,
                    )?;
                    let logger = Arc::new(logger);
                    loggers.insert(key, logger.clone());
                    logger
                }
            }
        };

        let handle = ContextLogger::new(logger);
        Ok(match module {
            Some(module) => handle
                .with_field("module_source", module)
                .with_field("service_name", self.service_name.clone()),
            None => handle,
        })
    }
}

impl std::fmt::Debug for LoggerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerRegistry")
            .field("settings", &self.settings)
            .field("service_name", &self.service_name)
            .field("loggers", &self.logger_count())
            .finish()
    }
}

/// `"{module or 'default'}_{file or 'app'}"`
pub fn identity_key(module: Option<&str>, file: Option<&str>) -> String {
    format!("{}_{}", module.unwrap_or("default"), file.unwrap_or("app"))
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////
