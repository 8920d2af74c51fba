//! Rotating file sinks
//!
//! Two policies are available:
//!
//! - [`TimedRotatingFileSink`]: rolls over at local midnight, renaming the
//!   current file to `name.YYYY-MM-DD`. Safe for a single writing process only;
//!   several processes sharing one file may interleave lines.
//! - `SizeRotatingFileSink`: rolls over once the file would exceed a size
//!   limit, shifting numbered backups `name.1` .. `name.N`. Every write holds an
//!   advisory `flock` on a sidecar lock file so that independent processes can
//!   share the file. Only built on unix with the `multiprocess` feature; see
//!   [`MULTIPROCESS_SINK_AVAILABLE`].

use super::error::{LogError, LogResult};
use super::event::{Level, LogEvent};
use super::format::RecordFormatter;
use super::sink::{Sink, SinkKind};
use chrono::{DateTime, Local, NaiveDate};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Whether the multi-process-safe size-rotating sink was compiled in
pub const MULTIPROCESS_SINK_AVAILABLE: bool = cfg!(all(unix, feature = "multiprocess"));

/// Size limit of the multi-process-safe sink (10 MiB)
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Rotated files kept by either policy
pub const DEFAULT_BACKUP_COUNT: usize = 30;

const DATE_SUFFIX_FORMAT: &str = "%Y-%m-%d";

///////////////////////////////////////////////////////////////////////////////
//****                     Time Rotating File Sink                       ****//
///////////////////////////////////////////////////////////////////////////////

struct TimedState {
    file: Option<File>,
    next_rollover: DateTime<Local>,
}

/// File sink rotated daily at local midnight
pub struct TimedRotatingFileSink {
    path: PathBuf,
    min_level: Level,
    formatter: Arc<RecordFormatter>,
    backup_count: usize,
    state: Mutex<TimedState>,
}

impl TimedRotatingFileSink {
    /// Open (or create) `path` for appending.
    ///
    /// The first rollover is the midnight following the file's last
    /// modification, so a stale file left from a previous day is rotated on the
    /// first write.
    pub fn open(
        path: impl Into<PathBuf>,
        min_level: Level,
        formatter: Arc<RecordFormatter>,
        backup_count: usize,
    ) -> LogResult<Self> {
        let path = path.into();
        let reference = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map(DateTime::<Local>::from)
            .unwrap_or_else(|_| Local::now());
        let file = open_append(&path)?;

        Ok(Self {
            path,
            min_level,
            formatter,
            backup_count,
            state: Mutex::new(TimedState {
                file: Some(file),
                next_rollover: next_midnight(reference),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line_at(&self, line: &str, now: DateTime<Local>) -> LogResult<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| LogError::Internal("timed rotating sink lock poisoned".to_string()))?;

        if now >= state.next_rollover {
            self.rollover(&mut state, now)?;
        }

        if state.file.is_none() {
            state.file = Some(open_append(&self.path)?);
        }
        if let Some(file) = state.file.as_mut() {
            writeln!(file, "{}", line)?;
            file.flush()?;
        }
        Ok(())
    }

    fn rollover(&self, state: &mut TimedState, now: DateTime<Local>) -> LogResult<()> {
        state.file = None;

        let period = state.next_rollover - chrono::Duration::days(1);
        let target = suffixed_path(&self.path, &period.format(DATE_SUFFIX_FORMAT).to_string());
        if self.path.exists() {
            if target.exists() {
                // Another writer already rotated this period; keep both.
                append_file(&self.path, &target)?;
                fs::remove_file(&self.path)?;
            } else {
                fs::rename(&self.path, &target)?;
            }
        }
        self.prune_backups()?;

        state.next_rollover = next_midnight(now);
        state.file = Some(open_append(&self.path)?);
        Ok(())
    }

    /// Delete the oldest dated backups beyond `backup_count`
    fn prune_backups(&self) -> LogResult<()> {
        if self.backup_count == 0 {
            return Ok(());
        }
        let Some(file_name) = self.path.file_name().and_then(|n| n.to_str()) else {
            return Ok(());
        };
        let prefix = format!("{}.", file_name);
        let parent = parent_dir(&self.path);

        let mut backups: Vec<(NaiveDate, PathBuf)> = fs::read_dir(parent)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                let suffix = name.strip_prefix(&prefix)?;
                let date = NaiveDate::parse_from_str(suffix, DATE_SUFFIX_FORMAT).ok()?;
                Some((date, entry.path()))
            })
            .collect();

        backups.sort();
        let excess = backups.len().saturating_sub(self.backup_count);
        for (_, path) in backups.into_iter().take(excess) {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl Sink for TimedRotatingFileSink {
    fn write(&self, event: &LogEvent) -> LogResult<()> {
        let line = self.formatter.render(event);
        self.write_line_at(&line, Local::now())
    }

    fn kind(&self) -> SinkKind {
        SinkKind::TimeRotatingFile
    }

    fn min_level(&self) -> Level {
        self.min_level
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                     Size Rotating File Sink                       ****//
///////////////////////////////////////////////////////////////////////////////

#[cfg(all(unix, feature = "multiprocess"))]
pub use self::multiprocess::SizeRotatingFileSink;

#[cfg(all(unix, feature = "multiprocess"))]
mod multiprocess {
    use super::*;
    use std::io;
    use std::os::unix::io::{AsRawFd, RawFd};

    /// Exclusive `flock` held until dropped
    struct FileLock {
        fd: RawFd,
    }

    impl FileLock {
        fn acquire(file: &File) -> io::Result<Self> {
            let fd = file.as_raw_fd();
            // SAFETY: `fd` belongs to `file`, which outlives the returned guard.
            let result = unsafe { libc::flock(fd, libc::LOCK_EX) };
            if result != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(Self { fd })
        }
    }

    impl Drop for FileLock {
        fn drop(&mut self) {
            // SAFETY: `fd` is still open; the lock file is owned by the sink.
            unsafe {
                libc::flock(self.fd, libc::LOCK_UN);
            }
        }
    }

    /// File sink rotated by size and shared safely between processes
    pub struct SizeRotatingFileSink {
        path: PathBuf,
        min_level: Level,
        formatter: Arc<RecordFormatter>,
        max_bytes: u64,
        backup_count: usize,
        /// Serializes threads of this process; `flock` serializes processes
        lock_file: Mutex<File>,
    }

    impl SizeRotatingFileSink {
        pub fn open(
            path: impl Into<PathBuf>,
            min_level: Level,
            formatter: Arc<RecordFormatter>,
            max_bytes: u64,
            backup_count: usize,
        ) -> LogResult<Self> {
            let path = path.into();
            let lock_path = lock_path(&path);
            let lock_file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            // Surface permission problems now rather than on the first event
            open_append(&path)?;

            Ok(Self {
                path,
                min_level,
                formatter,
                max_bytes,
                backup_count,
                lock_file: Mutex::new(lock_file),
            })
        }

        pub fn path(&self) -> &Path {
            &self.path
        }

        fn write_line(&self, line: &str) -> LogResult<()> {
            let lock_file = self.lock_file.lock().map_err(|_| {
                LogError::Internal("size rotating sink lock poisoned".to_string())
            })?;
            let _guard = FileLock::acquire(&lock_file)?;

            // Another process may have rotated since our last write, so the
            // size is read from disk and the file reopened every time.
            let incoming = line.len() as u64 + 1;
            let current = fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
            if current > 0 && current + incoming > self.max_bytes {
                self.rotate()?;
            }

            let mut file = open_append(&self.path)?;
            writeln!(file, "{}", line)?;
            file.flush()?;
            Ok(())
        }

        fn rotate(&self) -> LogResult<()> {
            if self.backup_count == 0 {
                fs::remove_file(&self.path)?;
                return Ok(());
            }
            for index in (1..self.backup_count).rev() {
                let source = numbered_path(&self.path, index);
                if source.exists() {
                    fs::rename(&source, numbered_path(&self.path, index + 1))?;
                }
            }
            if self.path.exists() {
                fs::rename(&self.path, numbered_path(&self.path, 1))?;
            }
            Ok(())
        }
    }

    impl Sink for SizeRotatingFileSink {
        fn write(&self, event: &LogEvent) -> LogResult<()> {
            let line = self.formatter.render(event);
            self.write_line(&line)
        }

        fn kind(&self) -> SinkKind {
            SinkKind::SizeRotatingFile
        }

        fn min_level(&self) -> Level {
            self.min_level
        }
    }

    fn numbered_path(path: &Path, index: usize) -> PathBuf {
        suffixed_path(path, &index.to_string())
    }

    fn lock_path(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("log");
        parent_dir(path).join(format!(".{}.lock", name))
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::logging::event::Callsite;
        use tempfile::tempdir;

        fn event(message: &str) -> LogEvent {
            LogEvent::new(Level::Info, message, Callsite::new("m", "f", 1))
        }

        #[test]
        fn test_rotates_when_size_exceeded() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("app.log");
            let formatter = Arc::new(RecordFormatter::new("svc"));
            let sink = SizeRotatingFileSink::open(&path, Level::Info, formatter, 300, 2).unwrap();

            for i in 0..12 {
                sink.write(&event(&format!("message number {}", i))).unwrap();
            }

            assert!(path.exists());
            assert!(numbered_path(&path, 1).exists());
            assert!(numbered_path(&path, 2).exists());
            assert!(!numbered_path(&path, 3).exists());
            assert!(fs::metadata(&path).unwrap().len() <= 300);

            let latest = fs::read_to_string(&path).unwrap();
            assert!(latest.contains("message number 11"));
        }

        #[test]
        fn test_lock_file_is_created_beside_log() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("worker.log");
            let formatter = Arc::new(RecordFormatter::new("svc"));
            let sink =
                SizeRotatingFileSink::open(&path, Level::Info, formatter, DEFAULT_MAX_BYTES, 30)
                    .unwrap();

            sink.write(&event("hello")).unwrap();
            assert!(dir.path().join(".worker.log.lock").exists());
            assert_eq!(sink.kind(), SinkKind::SizeRotatingFile);
            assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
        }
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                       Private Functions                           ****//
///////////////////////////////////////////////////////////////////////////////

fn open_append(path: &Path) -> LogResult<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Append the contents of `from` to `to`
fn append_file(from: &Path, to: &Path) -> LogResult<()> {
    let mut source = File::open(from)?;
    let mut target = open_append(to)?;
    io::copy(&mut source, &mut target)?;
    target.flush()?;
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// `dir/name.log` + `suffix` -> `dir/name.log.suffix`
fn suffixed_path(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("log");
    parent_dir(path).join(format!("{}.{}", name, suffix))
}

/// First local midnight strictly after `instant`
fn next_midnight(instant: DateTime<Local>) -> DateTime<Local> {
    instant
        .date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .unwrap_or_else(|| instant + chrono::Duration::days(1))
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Timelike, TimeZone};
    use tempfile::tempdir;

    fn formatter() -> Arc<RecordFormatter> {
        Arc::new(RecordFormatter::new("svc"))
    }

    #[test]
    fn test_next_midnight_is_local_and_after() {
        let noon = Local.with_ymd_and_hms(2026, 5, 20, 12, 0, 0).unwrap();
        let midnight = next_midnight(noon);
        assert!(midnight > noon);
        assert_eq!(midnight.hour(), 0);
        assert_eq!(midnight.minute(), 0);
        assert_eq!(midnight.date_naive(), NaiveDate::from_ymd_opt(2026, 5, 21).unwrap());
    }

    #[test]
    fn test_suffixed_path() {
        let path = Path::new("logs/app.log");
        assert_eq!(suffixed_path(path, "2026-01-02"), PathBuf::from("logs/app.log.2026-01-02"));
        assert_eq!(suffixed_path(Path::new("app.log"), "1"), PathBuf::from("./app.log.1"));
    }

    #[test]
    fn test_writes_append_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let sink = TimedRotatingFileSink::open(&path, Level::Info, formatter(), 30).unwrap();

        sink.write_line_at("first", Local::now()).unwrap();
        sink.write_line_at("second", Local::now()).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
        assert_eq!(sink.kind(), SinkKind::TimeRotatingFile);
    }

    #[test]
    fn test_rollover_at_midnight() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let sink = TimedRotatingFileSink::open(&path, Level::Info, formatter(), 30).unwrap();

        let first_rollover = sink.state.lock().unwrap().next_rollover;
        sink.write_line_at("yesterday", first_rollover - chrono::Duration::minutes(1))
            .unwrap();
        sink.write_line_at("today", first_rollover + chrono::Duration::minutes(1))
            .unwrap();

        let period = (first_rollover - chrono::Duration::days(1))
            .format(DATE_SUFFIX_FORMAT)
            .to_string();
        let rotated = suffixed_path(&path, &period);
        assert_eq!(fs::read_to_string(&rotated).unwrap(), "yesterday\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "today\n");
        assert!(sink.state.lock().unwrap().next_rollover > first_rollover);
    }

    #[test]
    fn test_two_writers_keep_both_days_across_midnight() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let first = TimedRotatingFileSink::open(&path, Level::Info, formatter(), 30).unwrap();
        let second = TimedRotatingFileSink::open(&path, Level::Info, formatter(), 30).unwrap();
        let first_midnight = first.state.lock().unwrap().next_rollover;
        let second_midnight = second.state.lock().unwrap().next_rollover;
        let minutes = chrono::Duration::minutes(5);

        first.write_line_at("day1 from first", first_midnight - minutes).unwrap();
        second.write_line_at("day1 from second", second_midnight - minutes).unwrap();
        first.write_line_at("day2 from first", first_midnight + minutes).unwrap();
        second.write_line_at("day2 from second", second_midnight + minutes).unwrap();

        let period = (first_midnight - chrono::Duration::days(1))
            .format(DATE_SUFFIX_FORMAT)
            .to_string();
        let backup = fs::read_to_string(suffixed_path(&path, &period)).unwrap();
        let current = fs::read_to_string(&path).unwrap();

        assert!(backup.contains("day1 from first\n"));
        assert!(backup.contains("day1 from second\n"));
        assert_eq!(current, "day2 from second\n");
        let everything = format!("{}{}", backup, current);
        let all_lines = [
            "day1 from first",
            "day1 from second",
            "day2 from first",
            "day2 from second",
        ];
        for line in all_lines {
            assert_eq!(everything.matches(line).count(), 1, "{} lost or duplicated", line);
        }
    }

    #[test]
    fn test_prune_keeps_newest_backups() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        for day in 1..=4 {
            fs::write(suffixed_path(&path, &format!("2020-01-0{}", day)), "old").unwrap();
        }
        // Unrelated files sharing the prefix are left alone
        fs::write(dir.path().join("app.log.notes"), "keep").unwrap();
        fs::write(dir.path().join("app_error.log.2020-01-01"), "keep").unwrap();

        let sink = TimedRotatingFileSink::open(&path, Level::Info, formatter(), 2).unwrap();
        sink.prune_backups().unwrap();

        assert!(!suffixed_path(&path, "2020-01-01").exists());
        assert!(!suffixed_path(&path, "2020-01-02").exists());
        assert!(suffixed_path(&path, "2020-01-03").exists());
        assert!(suffixed_path(&path, "2020-01-04").exists());
        assert!(dir.path().join("app.log.notes").exists());
        assert!(dir.path().join("app_error.log.2020-01-01").exists());
    }

    #[test]
    fn test_capability_flag_matches_build() {
        assert_eq!(
            MULTIPROCESS_SINK_AVAILABLE,
            cfg!(unix) && cfg!(feature = "multiprocess")
        );
    }
}
