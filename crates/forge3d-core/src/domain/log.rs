//! Operator-facing session log.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Number of entries kept before the oldest is evicted.
pub const MAX_LOG_ENTRIES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
        })
    }
}

/// A single operator-facing log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:<5} {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.message
        )
    }
}

/// Append-only ring buffer of log entries.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    /// Entries ever pushed, including evicted ones.
    pushed: u64,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LOG_ENTRIES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            pushed: 0,
        }
    }

    /// Add an entry, evicting the oldest if at capacity.
    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.pushed += 1;
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogEntry::new(LogLevel::Info, message));
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(LogEntry::new(LogLevel::Warning, message));
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(LogEntry::new(LogLevel::Error, message));
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Running count of pushes. Use as a mark for [`Self::since`].
    pub const fn pushed(&self) -> u64 {
        self.pushed
    }

    /// Entries pushed after `mark` that are still retained.
    pub fn since(&self, mark: u64) -> impl Iterator<Item = &LogEntry> {
        let new = usize::try_from(self.pushed.saturating_sub(mark)).unwrap_or(usize::MAX);
        let skip = self.entries.len().saturating_sub(new);
        self.entries.iter().skip(skip)
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest() {
        let mut buffer = LogBuffer::with_capacity(3);
        for i in 0..5 {
            buffer.info(format!("line {i}"));
        }
        let messages: Vec<_> = buffer.entries().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn test_since_survives_eviction() {
        let mut buffer = LogBuffer::with_capacity(3);
        buffer.info("a");
        let mark = buffer.pushed();
        for m in ["b", "c", "d", "e"] {
            buffer.info(m);
        }
        let fresh: Vec<_> = buffer.since(mark).map(|e| e.message.as_str()).collect();
        assert_eq!(fresh, vec!["c", "d", "e"]);
        assert_eq!(buffer.since(buffer.pushed()).count(), 0);
    }

    #[test]
    fn test_default_capacity() {
        let mut buffer = LogBuffer::new();
        for i in 0..(MAX_LOG_ENTRIES + 10) {
            buffer.warning(i.to_string());
        }
        assert_eq!(buffer.len(), MAX_LOG_ENTRIES);
        assert_eq!(buffer.entries().next().map(|e| e.message.as_str()), Some("10"));
    }
}
