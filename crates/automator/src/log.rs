//! Bounded diagnostic log for session console/exception events.

use chrono::{DateTime, Local};
use std::collections::VecDeque;

use crate::SessionEvent;

/// Fixed capacity of the event log. Oldest entries are evicted first.
pub const LOG_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Console,
    Exception,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub kind: LogKind,
    pub level: String,
    pub text: String,
    pub timestamp: DateTime<Local>,
}

impl LogEntry {
    pub fn from_event(event: &SessionEvent) -> Self {
        match event {
            SessionEvent::Console { level, text } => Self {
                kind: LogKind::Console,
                level: level.clone(),
                text: text.clone(),
                timestamp: Local::now(),
            },
            SessionEvent::Exception { text } => Self {
                kind: LogKind::Exception,
                level: "error".to_string(),
                text: text.clone(),
                timestamp: Local::now(),
            },
        }
    }

    fn is_error(&self) -> bool {
        self.kind == LogKind::Exception || self.level == "error"
    }

    /// Timestamp-prefixed text line (time of day, second precision).
    fn render(&self) -> String {
        format!("[{}] {}", self.timestamp.format("%H:%M:%S"), self.text)
    }
}

/// Fixed-capacity ring of log entries, insertion order = chronological order.
/// Appends come from the event-forwarder task; readers take snapshots via
/// `recent_errors`, never an iterator over live state.
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, entry: LogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Last `n` error-class entries (console errors and exceptions) in
    /// chronological order, rendered as timestamp-prefixed lines.
    pub fn recent_errors(&self, n: usize) -> Vec<String> {
        let errors: Vec<&LogEntry> = self.entries.iter().filter(|e| e.is_error()).collect();
        let start = errors.len().saturating_sub(n);
        errors[start..].iter().map(|e| e.render()).collect()
    }

    /// Invoked on every successful new connection so diagnostics never leak
    /// across sessions.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
