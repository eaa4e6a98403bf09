use std::collections::HashSet;

use crate::record::RecordIdentifier;

/// Records already fetched during one traversal run.
#[derive(Debug, Clone, Default)]
pub struct VisitedTracker {
    visited: HashSet<RecordIdentifier>,
}

impl VisitedTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visited(&self, identifier: &RecordIdentifier) -> bool {
        self.visited.contains(identifier)
    }

    /// Marking twice is a no-op.
    pub fn mark_visited(&mut self, identifier: RecordIdentifier) {
        self.visited.insert(identifier);
    }

    pub fn reset(&mut self) {
        self.visited.clear();
    }

    pub fn get_visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Snapshot of the visited set; changes to it do not reach the tracker.
    pub fn get_visited_records(&self) -> HashSet<RecordIdentifier> {
        self.visited.clone()
    }
}
