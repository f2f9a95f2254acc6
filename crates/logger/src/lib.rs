/// Live Match Feed — Logger
/// JSONL event stream (logs/YYYY-MM-DD.jsonl) + throttling chybových logů

use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

pub struct EventLogger {
    log_dir: PathBuf,
}

impl EventLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        let dir = log_dir.into();
        fs::create_dir_all(&dir).ok();
        Self { log_dir: dir }
    }

    pub fn log<T: Serialize>(&self, event: &T) -> Result<()> {
        let date  = Utc::now().format("%Y-%m-%d").to_string();
        let path  = self.log_dir.join(format!("{date}.jsonl"));
        let line  = serde_json::to_string(event)?;
        let mut f = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

/// Pustí stejný klíč do logu nejvýš jednou za `window`.
///
/// Patří vždy konkrétní instanci (enricher, queue), nikdy není globální.
pub struct LogThrottle {
    window: Duration,
    last:   Mutex<HashMap<String, Instant>>,
}

impl LogThrottle {
    pub fn new(window: Duration) -> Self {
        Self { window, last: Mutex::new(HashMap::new()) }
    }

    /// True if the caller should emit the log line for `key` now.
    pub fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut last = self.last.lock();
        match last.get(key) {
            Some(at) if now.duration_since(*at) < self.window => false,
            _ => {
                last.insert(key.to_string(), now);
                true
            }
        }
    }

    pub fn clear(&self) {
        self.last.lock().clear();
    }
}

impl Default for LogThrottle {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

// ── Event typy ────────────────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
pub struct RefreshCycleEvent {
    pub ts:         String,
    pub event:      &'static str,   // "REFRESH_CYCLE"
    pub feed:       String,         // "live" | "upcoming"
    pub upstream:   usize,          // zápasy z odds feedu
    pub merged:     usize,
    pub live:       usize,          // po filtru
    pub committed:  bool,           // false = fingerprinty stejné, no-op
    pub elapsed_ms: u64,
}

#[derive(Serialize, Debug)]
pub struct MatchFinishedEvent {
    pub ts:       String,
    pub event:    &'static str,     // "MATCH_FINISHED"
    pub event_id: String,
    pub home:     String,
    pub away:     String,
    pub score:    Option<String>,
}

#[derive(Serialize, Debug)]
pub struct ApiStatusEvent {
    pub ts:          String,
    pub event:       &'static str,  // "API_STATUS"
    pub source:      String,
    pub ok:          bool,
    pub status_code: Option<u16>,
    pub message:     String,
}

#[derive(Serialize, Debug)]
pub struct FeedConnectionEvent {
    pub ts:      String,
    pub event:   &'static str,      // "FEED_CONNECTION"
    pub state:   String,
    pub attempt: u32,
    pub note:    String,
}

#[derive(Serialize, Debug)]
pub struct SnapshotSavedEvent {
    pub ts:      String,
    pub event:   &'static str,      // "SNAPSHOT_SAVED"
    pub date:    String,
    pub matches: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_allows_once_per_window() {
        let t = LogThrottle::new(Duration::from_secs(60));
        assert!(t.allow("match_info"));
        assert!(!t.allow("match_info"));
        assert!(t.allow("match_timeline"));
        t.clear();
        assert!(t.allow("match_info"));
    }

    #[test]
    fn zero_window_never_throttles() {
        let t = LogThrottle::new(Duration::ZERO);
        assert!(t.allow("k"));
        assert!(t.allow("k"));
    }

    #[test]
    fn writes_jsonl_line() {
        let dir = tempfile::tempdir().unwrap();
        let logger = EventLogger::new(dir.path());
        logger
            .log(&SnapshotSavedEvent {
                ts: now_iso(),
                event: "SNAPSHOT_SAVED",
                date: "2026-10-16".into(),
                matches: 3,
            })
            .unwrap();

        let file = fs::read_dir(dir.path()).unwrap().next().unwrap().unwrap().path();
        let body = fs::read_to_string(file).unwrap();
        assert!(body.contains("\"SNAPSHOT_SAVED\""));
        assert_eq!(body.lines().count(), 1);
    }
}
