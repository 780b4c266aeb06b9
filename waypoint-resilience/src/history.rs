//! Capped, append-only error history

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use waypoint_logging::{ErrorInfo, ErrorSeverity, ErrorType};

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Most recent errors, oldest evicted first once `capacity` is reached
pub struct ErrorHistory {
    capacity: usize,
    entries: Mutex<VecDeque<ErrorInfo>>,
}

/// Aggregate counts over the retained history
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorStats {
    pub total: usize,
    pub by_type: HashMap<ErrorType, usize>,
    pub by_severity: HashMap<ErrorSeverity, usize>,
}

impl ErrorHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
        }
    }

    pub fn record(&self, info: ErrorInfo) {
        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(info);
    }

    /// All retained entries, oldest first
    pub fn entries(&self) -> Vec<ErrorInfo> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Up to `n` most recent entries, newest first
    pub fn recent(&self, n: usize) -> Vec<ErrorInfo> {
        self.entries.lock().iter().rev().take(n).cloned().collect()
    }

    pub fn stats(&self) -> ErrorStats {
        let entries = self.entries.lock();
        let mut stats = ErrorStats {
            total: entries.len(),
            ..Default::default()
        };
        for entry in entries.iter() {
            *stats.by_type.entry(entry.error_type).or_default() += 1;
            *stats.by_severity.entry(entry.severity).or_default() += 1;
        }
        stats
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ErrorHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
