use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use match_model::{from_push_payload, Match};

use crate::protocol::payload_items;

/// Running set of pushed matches. Later pushes overwrite by `event_id`;
/// order is first-seen.
#[derive(Debug, Default)]
pub struct LiveMatchStore {
    by_id: HashMap<String, Match>,
    order: Vec<String>,
}

impl LiveMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one `matches` payload. Returns how many items were accepted.
    pub fn apply(&mut self, payload: &Value) -> usize {
        let mut accepted = 0;
        for m in payload_items(payload).iter().filter_map(from_push_payload) {
            if !self.by_id.contains_key(&m.event_id) {
                self.order.push(m.event_id.clone());
            }
            self.by_id.insert(m.event_id.clone(), m);
            accepted += 1;
        }
        accepted
    }

    pub fn snapshot(&self) -> Arc<Vec<Match>> {
        Arc::new(
            self.order
                .iter()
                .filter_map(|id| self.by_id.get(id).cloned())
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_id.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn push(id: &str, score_home: u32) -> Value {
        json!({
            "eventId": id,
            "coreData": { "teams": { "home": { "name": "A" }, "away": { "name": "B" } } },
            "statistics": { "score": { "home": score_home, "away": 0 } },
        })
    }

    #[test]
    fn later_push_overwrites_in_place() {
        let mut store = LiveMatchStore::new();
        assert_eq!(store.apply(&json!([push("1", 0), push("2", 0)])), 2);
        assert_eq!(store.apply(&json!({ "matches": [push("1", 1)] })), 1);

        let snap = store.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].event_id, "1");
        assert_eq!(snap[0].set_score.as_deref(), Some("1:0"));
    }

    #[test]
    fn unusable_items_are_skipped() {
        let mut store = LiveMatchStore::new();
        let accepted = store.apply(&json!([
            { "eventId": "x" },
            { "coreData": { "teams": { "home": "A", "away": "B" } } },
            push("3", 0),
        ]));
        assert_eq!(accepted, 1);
        assert_eq!(store.len(), 1);
    }
}
