//! Key-value snapshot store contract.
//!
//! Klíče:
//!   `match:{date}:{id}` — jeden zápas
//!   `date:{date}`       — index (seznam id) pro daný den
//!   `prematch:{id}`     — prematch snapshot pro enricher

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::FeedError;
use crate::types::Match;

/// Snapshots expire after 48 h.
pub const SNAPSHOT_TTL: Duration = Duration::from_secs(48 * 3600);

pub trait SnapshotStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, FeedError>;
    fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), FeedError>;

    /// Batch write. Stores with transactions override this to write atomically.
    fn set_many(&self, entries: &[(String, Value)], ttl: Duration) -> Result<(), FeedError> {
        for (key, value) in entries {
            self.set(key, value, ttl)?;
        }
        Ok(())
    }
}

pub fn match_key(date: &str, id: &str) -> String {
    format!("match:{date}:{id}")
}

pub fn date_key(date: &str) -> String {
    format!("date:{date}")
}

pub fn prematch_key(numeric_id: &str) -> String {
    format!("prematch:{numeric_id}")
}

/// Write every match under its own key and extend the day's index.
/// Returns the number of matches written.
pub fn persist_snapshot(
    store: &dyn SnapshotStore,
    date: &str,
    matches: &[Match],
    ttl: Duration,
) -> Result<usize, FeedError> {
    let index_key = date_key(date);
    let mut index: Vec<String> = match store.get(&index_key)? {
        Some(v) => serde_json::from_value(v).unwrap_or_default(),
        None => Vec::new(),
    };

    let mut entries = Vec::with_capacity(matches.len() + 1);
    for m in matches {
        let value = serde_json::to_value(m).map_err(|e| FeedError::Store(e.to_string()))?;
        entries.push((match_key(date, &m.event_id), value));
        if !index.contains(&m.event_id) {
            index.push(m.event_id.clone());
        }
    }
    entries.push((index_key, Value::from(index)));

    store.set_many(&entries, ttl)?;
    debug!("snapshot {}: {} matches written", date, matches.len());
    Ok(matches.len())
}

/// Read a day's snapshot back in index order. Expired or unreadable entries
/// are skipped.
pub fn load_snapshot(store: &dyn SnapshotStore, date: &str) -> Result<Vec<Match>, FeedError> {
    let index: Vec<String> = match store.get(&date_key(date))? {
        Some(v) => serde_json::from_value(v).unwrap_or_default(),
        None => return Ok(Vec::new()),
    };

    let mut out = Vec::with_capacity(index.len());
    for id in index {
        if let Some(v) = store.get(&match_key(date, &id))? {
            if let Ok(m) = serde_json::from_value::<Match>(v) {
                out.push(m);
            }
        }
    }
    Ok(out)
}

/// In-process store, used by tests and as a fallback when no DB is configured.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (Value, Instant)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|(_, exp)| *exp > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, FeedError> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((_, expires)) if *expires <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((v, _)) => Ok(Some(v.clone())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), FeedError> {
        self.entries
            .lock()
            .insert(key.to_string(), (value.clone(), Instant::now() + ttl));
        Ok(())
    }
}
