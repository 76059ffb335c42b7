//! User-facing log sink.
//!
//! Engine components report conflicts, skipped registrations and macro runs
//! as plain lines through a [`LogSink`] handed to them at construction. The UI
//! decides how to present them; the default sink forwards to `tracing`.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use tracing::Level;

/// Destination for user-facing log lines.
pub trait LogSink: Send + Sync {
    /// Record one line at the given level.
    fn log(&self, level: Level, message: &str);

    /// Log at info level.
    fn info(&self, message: &str) {
        emit(self, Level::INFO, message);
    }

    /// Log at warn level.
    fn warn(&self, message: &str) {
        emit(self, Level::WARN, message);
    }

    /// Log at error level.
    fn error(&self, message: &str) {
        emit(self, Level::ERROR, message);
    }
}

/// Call the sink, falling back to `tracing` if it panics.
fn emit<S: LogSink + ?Sized>(sink: &S, level: Level, message: &str) {
    if panic::catch_unwind(AssertUnwindSafe(|| sink.log(level, message))).is_err() {
        TracingSink.log(level, message);
    }
}

/// Forwards every line to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, message: &str) {
        if level == Level::ERROR {
            tracing::error!("{message}");
        } else if level == Level::WARN {
            tracing::warn!("{message}");
        } else if level == Level::INFO {
            tracing::info!("{message}");
        } else if level == Level::DEBUG {
            tracing::debug!("{message}");
        } else {
            tracing::trace!("{message}");
        }
    }
}

/// Keeps the most recent lines in memory, dropping the oldest beyond capacity.
#[derive(Debug)]
pub struct MemoryLog {
    lines: Mutex<VecDeque<(Level, String)>>,
    capacity: usize,
}

impl MemoryLog {
    /// A buffer keeping the newest `capacity` lines.
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// All retained messages, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().iter().map(|(_, l)| l.clone()).collect()
    }

    /// Retained messages at exactly `level`.
    pub fn lines_at(&self, level: Level) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|(lv, _)| *lv == level)
            .map(|(_, l)| l.clone())
            .collect()
    }

    /// True if any retained line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|(_, l)| l.contains(needle))
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl LogSink for MemoryLog {
    fn log(&self, level: Level, message: &str) {
        let mut lines = self.lines.lock();
        if lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back((level, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_log_drops_oldest() {
        let log = MemoryLog::new(2);
        log.info("one");
        log.warn("two");
        log.error("three");
        assert_eq!(log.lines(), vec!["two".to_string(), "three".to_string()]);
        assert_eq!(log.lines_at(Level::WARN), vec!["two".to_string()]);
        assert!(log.contains("thr"));
    }

    struct Exploding;

    impl LogSink for Exploding {
        fn log(&self, _level: Level, _message: &str) {
            panic!("sink failure");
        }
    }

    #[test]
    fn test_panicking_sink_is_contained() {
        let sink = Exploding;
        sink.warn("still fine");
    }
}
