//! Destination routing
//!
//! Attaches the standard trio of sinks to a freshly built logger:
//!
//! | Sink    | Destination                   | Levels        |
//! |---------|-------------------------------|---------------|
//! | console | stdout                        | all           |
//! | primary | `{log_dir}/{file}`            | all           |
//! | errors  | `{log_dir}/{file}` → `_error` | ERROR and up  |
//!
//! File sinks are size-rotating and process-safe when the caller asks for it
//! and the capability was compiled in, time-rotating otherwise.
//!
//! Each file path gets exactly one file sink per router. Loggers writing to the
//! same file share it, so only one writer ever rotates a given file in this
//! process. The policy and level of a shared sink are fixed by the first
//! logger that opened it.

use super::error::{LogError, LogResult};
use super::event::Level;
use super::format::RecordFormatter;
use super::registry::Logger;
use super::rotation::{
    DEFAULT_BACKUP_COUNT, DEFAULT_MAX_BYTES, MULTIPROCESS_SINK_AVAILABLE, TimedRotatingFileSink,
};
use super::sink::{ConsoleSink, Sink};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

type OpenFileSinks = Arc<Mutex<HashMap<PathBuf, Arc<dyn Sink>>>>;

/// Builds and attaches sinks for new loggers
#[derive(Clone)]
pub struct DestinationRouter {
    log_dir: PathBuf,
    max_bytes: u64,
    backup_count: usize,
    file_sinks: OpenFileSinks,
}

impl DestinationRouter {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            max_bytes: DEFAULT_MAX_BYTES,
            backup_count: DEFAULT_BACKUP_COUNT,
            file_sinks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_rotation(mut self, max_bytes: u64, backup_count: usize) -> Self {
        self.max_bytes = max_bytes;
        self.backup_count = backup_count;
        self
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Path of the primary file for `file_name`
    pub fn primary_path(&self, file_name: &str) -> PathBuf {
        self.log_dir.join(file_name)
    }

    /// Path of the errors-only file for `file_name`
    pub fn error_path(&self, file_name: &str) -> PathBuf {
        self.log_dir.join(error_file_name(file_name))
    }

    /// Number of distinct files with an open sink
    pub fn open_file_count(&self) -> usize {
        self.file_sinks.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Attach console, primary file and error file sinks to `logger`.
    ///
    /// Creates the log directory when missing. Any I/O failure is returned
    /// unchanged and leaves the logger without file sinks. When the error
    /// file resolves to the primary file only the primary sink is attached.
    pub fn attach_sinks(
        &self,
        logger: &mut Logger,
        file_name: &str,
        formatter: Arc<RecordFormatter>,
        multiprocess_safe: bool,
    ) -> LogResult<()> {
        logger.add_sink(Arc::new(ConsoleSink::new(Level::Debug, formatter.clone())));

        fs::create_dir_all(&self.log_dir)?;

        let primary = self.file_sink(
            self.primary_path(file_name),
            Level::Debug,
            formatter.clone(),
            multiprocess_safe,
        )?;
        let errors = self.file_sink(
            self.error_path(file_name),
            Level::Error,
            formatter,
            multiprocess_safe,
        )?;
        let same_file = Arc::ptr_eq(&primary, &errors);
        logger.add_sink(primary);
        if !same_file {
            logger.add_sink(errors);
        }
        Ok(())
    }

    /// The sink already open on `path`, or a new one
    fn file_sink(
        &self,
        path: PathBuf,
        min_level: Level,
        formatter: Arc<RecordFormatter>,
        multiprocess_safe: bool,
    ) -> LogResult<Arc<dyn Sink>> {
        let mut open = self
            .file_sinks
            .lock()
            .map_err(|_| LogError::Internal("destination router lock poisoned".to_string()))?;
        if let Some(existing) = open.get(&path) {
            return Ok(existing.clone());
        }

        let sink = self.open_file_sink(&path, min_level, formatter, multiprocess_safe)?;
        open.insert(path, sink.clone());
        Ok(sink)
    }

    fn open_file_sink(
        &self,
        path: &Path,
        min_level: Level,
        formatter: Arc<RecordFormatter>,
        multiprocess_safe: bool,
    ) -> LogResult<Arc<dyn Sink>> {
        if multiprocess_safe && MULTIPROCESS_SINK_AVAILABLE {
            if let Some(sink) = self.size_rotating_sink(path, min_level, formatter.clone())? {
                return Ok(sink);
            }
        }

        let sink = TimedRotatingFileSink::open(path, min_level, formatter, self.backup_count)?;
        Ok(Arc::new(sink))
    }

    #[cfg(all(unix, feature = "multiprocess"))]
    fn size_rotating_sink(
        &self,
        path: &Path,
        min_level: Level,
        formatter: Arc<RecordFormatter>,
    ) -> LogResult<Option<Arc<dyn Sink>>> {
        let sink = super::rotation::SizeRotatingFileSink::open(
            path,
            min_level,
            formatter,
            self.max_bytes,
            self.backup_count,
        )?;
        Ok(Some(Arc::new(sink)))
    }

    #[cfg(not(all(unix, feature = "multiprocess")))]
    fn size_rotating_sink(
        &self,
        _path: &Path,
        _min_level: Level,
        _formatter: Arc<RecordFormatter>,
    ) -> LogResult<Option<Arc<dyn Sink>>> {
        Ok(None)
    }
}

impl std::fmt::Debug for DestinationRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationRouter")
            .field("log_dir", &self.log_dir)
            .field("max_bytes", &self.max_bytes)
            .field("backup_count", &self.backup_count)
            .field("open_files", &self.open_file_count())
            .finish()
    }
}

/// `app.log` -> `app_error.log`. Every `.log` occurrence is replaced, and a
/// name without `.log` is returned unchanged.
pub fn error_file_name(file_name: &str) -> String {
    file_name.replace(".log", "_error.log")
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::sink::SinkKind;
    use tempfile::tempdir;

    #[test]
    fn test_error_file_name() {
        assert_eq!(error_file_name("app.log"), "app_error.log");
        assert_eq!(error_file_name("worker.log"), "worker_error.log");
        assert_eq!(error_file_name("plain"), "plain");
    }

    #[test]
    fn test_attach_creates_directory_and_three_sinks() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().join("nested").join("logs");
        let router = DestinationRouter::new(&log_dir);
        let mut logger = Logger::new("app", Level::Info);

        router
            .attach_sinks(&mut logger, "app.log", Arc::new(RecordFormatter::new("svc")), false)
            .unwrap();

        assert!(log_dir.is_dir());
        assert!(log_dir.join("app.log").exists());
        assert!(log_dir.join("app_error.log").exists());

        let kinds: Vec<SinkKind> = logger.sinks().iter().map(|s| s.kind()).collect();
        assert_eq!(
            kinds,
            vec![SinkKind::Console, SinkKind::TimeRotatingFile, SinkKind::TimeRotatingFile]
        );
        assert_eq!(logger.sinks()[2].min_level(), Level::Error);
    }

    #[test]
    fn test_multiprocess_selection_follows_capability() {
        let dir = tempdir().unwrap();
        let router = DestinationRouter::new(dir.path());
        let mut logger = Logger::new("app", Level::Info);

        router
            .attach_sinks(&mut logger, "mp.log", Arc::new(RecordFormatter::new("svc")), true)
            .unwrap();

        let expected = if MULTIPROCESS_SINK_AVAILABLE {
            SinkKind::SizeRotatingFile
        } else {
            SinkKind::TimeRotatingFile
        };
        assert_eq!(logger.sinks()[1].kind(), expected);
        assert_eq!(logger.sinks()[2].kind(), expected);
    }

    #[test]
    fn test_directory_creation_failure_is_fatal() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file in the way").unwrap();

        let router = DestinationRouter::new(blocker.join("logs"));
        let mut logger = Logger::new("app", Level::Info);
        let formatter = Arc::new(RecordFormatter::new("svc"));
        let result = router.attach_sinks(&mut logger, "app.log", formatter, false);
        assert!(result.is_err());
    }

    #[test]
    fn test_loggers_on_one_file_share_file_sinks() {
        let dir = tempdir().unwrap();
        let router = DestinationRouter::new(dir.path());
        let formatter = Arc::new(RecordFormatter::new("svc"));
        let mut app = Logger::new("app", Level::Info);
        let mut server = Logger::new("server", Level::Warning);

        router.attach_sinks(&mut app, "app.log", formatter.clone(), false).unwrap();
        router.attach_sinks(&mut server, "app.log", formatter, false).unwrap();

        assert!(!Arc::ptr_eq(&app.sinks()[0], &server.sinks()[0]));
        assert!(Arc::ptr_eq(&app.sinks()[1], &server.sinks()[1]));
        assert!(Arc::ptr_eq(&app.sinks()[2], &server.sinks()[2]));
        assert_eq!(router.open_file_count(), 2);
        assert_eq!(server.min_level(), Level::Warning);
    }

    #[test]
    fn test_error_file_equal_to_primary_is_attached_once() {
        let dir = tempdir().unwrap();
        let router = DestinationRouter::new(dir.path());
        let mut logger = Logger::new("app", Level::Info);

        router
            .attach_sinks(&mut logger, "plain", Arc::new(RecordFormatter::new("svc")), false)
            .unwrap();

        assert_eq!(logger.sinks().len(), 2);
        assert_eq!(logger.sinks()[1].min_level(), Level::Debug);
        assert_eq!(router.open_file_count(), 1);
    }
}
