//! Priority queue with dependency ordering

use std::collections::{HashMap, HashSet};

use crate::operation::Operation;

/// Pending operations awaiting dispatch
///
/// An operation is ready once none of its dependencies are still queued or
/// in flight; ids the queue has never seen count as resolved. Ready
/// operations leave in priority order, FIFO within a priority.
#[derive(Debug, Default)]
pub struct OperationQueue {
    pending: Vec<Operation>,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: Operation) {
        self.pending.push(operation);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.pending.iter().any(|op| op.id == id)
    }

    /// Remove and return up to `max` operations for the next batch.
    ///
    /// When nothing is ready and nothing is in flight the remaining
    /// operations can only be waiting on each other, so they are released in
    /// priority order instead of stalling forever. `in_flight` maps running
    /// operation ids to their batch.
    pub fn take_batch(&mut self, max: usize, in_flight: &HashMap<String, u64>) -> Vec<Operation> {
        if self.pending.is_empty() || max == 0 {
            return Vec::new();
        }

        let queued: HashSet<&str> = self.pending.iter().map(|op| op.id.as_str()).collect();
        let mut ready: Vec<usize> = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, op)| {
                op.dependencies
                    .iter()
                    .all(|dep| !queued.contains(dep.as_str()) && !in_flight.contains_key(dep))
            })
            .map(|(i, _)| i)
            .collect();

        if ready.is_empty() {
            if !in_flight.is_empty() {
                return Vec::new();
            }
            tracing::warn!(
                "Dependency cycle among {} queued operations; releasing in priority order",
                self.pending.len()
            );
            ready = (0..self.pending.len()).collect();
        }

        ready.sort_by_key(|&i| self.pending[i].dispatch_key());
        ready.truncate(max);

        let chosen: HashSet<usize> = ready.iter().copied().collect();
        let mut batch = Vec::with_capacity(ready.len());
        let mut remaining = Vec::with_capacity(self.pending.len() - ready.len());
        for (i, op) in self.pending.drain(..).enumerate() {
            if chosen.contains(&i) {
                batch.push(op);
            } else {
                remaining.push(op);
            }
        }
        self.pending = remaining;

        batch.sort_by_key(Operation::dispatch_key);
        batch
    }
}
