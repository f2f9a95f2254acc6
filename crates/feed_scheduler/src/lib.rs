//! Polling driver — live a upcoming kadence nad odds feedem.
//!
//! Live cyklus: fetch → normalize → enrich (initial při prvním výskytu,
//! jinak realtime) → merge → finished → filtr → commit → publish.
//! Stav se publikuje přes `watch`, odběratelé vidí vždy poslední snapshot.

pub mod config;
pub mod live;
pub mod upcoming;

pub use config::{SchedulerConfig, SchedulerControl};
pub use live::{CycleReport, LiveScheduler};
pub use upcoming::UpcomingScheduler;

use chrono::{DateTime, Utc};
use match_model::Match;
use std::sync::Arc;

/// What consumers see after every committed cycle.
#[derive(Debug, Clone, Default)]
pub struct LiveSnapshot {
    pub matches: Arc<Vec<Match>>,
    /// Set when the odds feed itself failed; `matches` stay from the last
    /// good cycle.
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub cycle: u64,
}
