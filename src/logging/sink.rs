//! Log sinks
//!
//! A sink receives events from a logger, renders them with its shared
//! formatter and appends the line to its destination. File sinks live in
//! [`super::rotation`].

use super::error::{LogError, LogResult};
use super::event::{Level, LogEvent};
use super::format::RecordFormatter;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Kind of destination behind a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Console,
    SizeRotatingFile,
    TimeRotatingFile,
    #[cfg(test)]
    Memory,
}

/// A destination for rendered log lines
pub trait Sink: Send + Sync {
    /// Render and write one event; called only for accepted levels
    fn write(&self, event: &LogEvent) -> LogResult<()>;

    fn kind(&self) -> SinkKind;

    /// Lowest level this sink emits
    fn min_level(&self) -> Level;

    fn accepts(&self, level: Level) -> bool {
        level >= self.min_level()
    }
}

/// Standard output sink, flushed after every line
pub struct ConsoleSink {
    min_level: Level,
    formatter: Arc<RecordFormatter>,
}

impl ConsoleSink {
    pub fn new(min_level: Level, formatter: Arc<RecordFormatter>) -> Self {
        Self {
            min_level,
            formatter,
        }
    }
}

impl Sink for ConsoleSink {
    fn write(&self, event: &LogEvent) -> LogResult<()> {
        let line = self.formatter.render(event);
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{}", line)?;
        handle.flush()?;
        Ok(())
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Console
    }

    fn min_level(&self) -> Level {
        self.min_level
    }
}

/// In-memory sink that keeps rendered lines
#[cfg(test)]
pub struct MemorySink {
    min_level: Level,
    formatter: Arc<RecordFormatter>,
    lines: Mutex<Vec<String>>,
}

#[cfg(test)]
impl MemorySink {
    pub fn new(min_level: Level, formatter: Arc<RecordFormatter>) -> Self {
        Self {
            min_level,
            formatter,
            lines: Mutex::new(Vec::new()),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.lines.lock().map(|l| l.len()).unwrap_or(0)
    }
}

#[cfg(test)]
impl Sink for MemorySink {
    fn write(&self, event: &LogEvent) -> LogResult<()> {
        let line = self.formatter.render(event);
        let mut lines = self
            .lines
            .lock()
            .map_err(|_| LogError::Internal("memory sink lock poisoned".to_string()))?;
        lines.push(line);
        Ok(())
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Memory
    }

    fn min_level(&self) -> Level {
        self.min_level
    }
}
