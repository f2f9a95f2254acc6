use std::time::Duration;

use match_model::SNAPSHOT_TTL;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub live_interval: Duration,
    pub upcoming_interval: Duration,
    /// Cycles a match may be missing from upstream before it is dropped.
    pub max_missed_cycles: u32,
    pub snapshot_ttl: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            live_interval: Duration::from_millis(1000),
            upcoming_interval: Duration::from_millis(60_000),
            max_missed_cycles: 1,
            snapshot_ttl: SNAPSHOT_TTL,
        }
    }
}

/// Pause nezruší běžící cyklus, jen nepustí další.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerControl {
    Run,
    Pause,
    Stop,
}
