use std::sync::Arc;

use match_model::Match;

use crate::merge::same_fingerprints;

/// Committed live set. A commit with identical fingerprints is a no-op and
/// keeps the same `Arc`.
#[derive(Debug, Clone, Default)]
pub struct LiveState {
    committed: Arc<Vec<Match>>,
}

impl LiveState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Arc<Vec<Match>> {
        Arc::clone(&self.committed)
    }

    /// Returns true when state was replaced.
    pub fn commit(&mut self, candidate: Vec<Match>) -> bool {
        if same_fingerprints(&self.committed, &candidate) {
            return false;
        }
        self.committed = Arc::new(candidate);
        true
    }
}
