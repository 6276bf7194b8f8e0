//! Diagnostic log
//!
//! Bounded ring of human-readable lines, each prefixed with a
//! `[HH:MM:SS.mmm]` UTC stamp. Oldest entries are dropped first.

use seqmix_common::time::{log_stamp, now};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    entries: VecDeque<String>,
    capacity: usize,
}

impl DiagnosticLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a message and return the stamped line
    pub fn push(&mut self, message: &str) -> String {
        let line = format!("[{}] {}", log_stamp(now()), message);
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(line.clone());
        line
    }

    /// Entries, oldest first
    pub fn entries(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_drops_oldest() {
        let mut log = DiagnosticLog::new(2);
        log.push("one");
        log.push("two");
        log.push("three");

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].ends_with("] two"));
        assert!(entries[1].ends_with("] three"));
    }

    #[test]
    fn test_line_has_stamp_prefix() {
        let mut log = DiagnosticLog::new(10);
        let line = log.push("hello");
        // "[HH:MM:SS.mmm] hello"
        assert_eq!(line.len(), "[00:00:00.000] hello".len());
        assert!(line.starts_with('['));
        assert_eq!(&line[13..15], "] ");
    }
}
