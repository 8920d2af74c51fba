//! Duration reporting for blocks of work
//!
//! Both helpers emit a DEBUG event `"{name} elapsed: {ms} ms"` once the work
//! finishes; the formatter renders it as `✅ {name} took {ms} ms`.

use super::event::{Callsite, Level};
use super::format::DURATION_MARKER;
use super::registry::ContextLogger;
use std::future::Future;
use std::panic::Location;
use std::time::{Duration, Instant};

/// Run `f` and report how long it took
#[track_caller]
pub fn time_sync<T, F>(logger: &ContextLogger, name: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    let location = Location::caller();
    let start = Instant::now();
    let output = f();
    report_duration(logger, name, start.elapsed(), location);
    output
}

/// Await `future` and report how long it took
#[track_caller]
pub fn time_async<'a, F>(
    logger: &'a ContextLogger,
    name: &'a str,
    future: F,
) -> impl Future<Output = F::Output> + 'a
where
    F: Future + 'a,
{
    let location = Location::caller();
    async move {
        let start = Instant::now();
        let output = future.await;
        report_duration(logger, name, start.elapsed(), location);
        output
    }
}

fn report_duration(
    logger: &ContextLogger,
    name: &str,
    elapsed: Duration,
    location: &'static Location<'static>,
) {
    if !logger.is_enabled_for(Level::Debug) {
        return;
    }
    let mut callsite = Callsite::from_location(location);
    callsite.function = name.to_string();
    let message = format!(
        "{} {} {:.2} ms",
        name,
        DURATION_MARKER,
        elapsed.as_secs_f64() * 1000.0
    );
    logger.report(logger.log(Level::Debug, callsite, message));
}

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
        let mut logger = Logger::new("timing", level);
        logger.add_sink(memory.clone());
        (ContextLogger::new(Arc::new(logger)), memory)
    }

    #[test]
    fn test_time_sync_reports_duration() {
        let (log, memory) = memory_logger(Level::Debug);
        let total = time_sync(&log, "sum_numbers", || (1..=10).sum::<u32>());
        assert_eq!(total, 55);

        let lines = memory.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("│ DEBUG   │ timing          │ sum_numbers          │"));
        assert!(lines[0].contains("✅ sum_numbers took "));
        assert!(lines[0].ends_with(" ms"));
    }

    #[test]
    fn test_time_sync_silent_above_debug() {
        let (log, memory) = memory_logger(Level::Info);
        time_sync(&log, "quiet", || ());
        assert_eq!(memory.count(), 0);
    }

    #[tokio::test]
    async fn test_time_async_reports_duration() {
        let (log, memory) = memory_logger(Level::Debug);
        let value = time_async(&log, "fetch_user", async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            "alice"
        })
        .await;
        assert_eq!(value, "alice");
        assert!(memory.lines()[0].contains("✅ fetch_user took "));
    }
}
