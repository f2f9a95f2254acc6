use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use logger::{now_iso, ApiStatusEvent, EventLogger, RefreshCycleEvent};
use match_merge::{filter_upcoming, LiveState};
use match_model::normalize;
use stats_client::OddsSource;

use crate::config::{SchedulerConfig, SchedulerControl};
use crate::LiveSnapshot;

/// Upcoming zápasy: bez enrichmentu, jen normalize + filtr.
pub struct UpcomingScheduler {
    odds: Arc<dyn OddsSource>,
    config: SchedulerConfig,
    state: LiveState,
    tx: watch::Sender<LiveSnapshot>,
    events: Option<EventLogger>,
    cycle: u64,
}

impl UpcomingScheduler {
    pub fn new(odds: Arc<dyn OddsSource>, config: SchedulerConfig) -> Self {
        let (tx, _) = watch::channel(LiveSnapshot::default());
        Self {
            odds,
            config,
            state: LiveState::new(),
            tx,
            events: None,
            cycle: 0,
        }
    }

    pub fn with_event_logger(mut self, events: EventLogger) -> Self {
        self.events = Some(events);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<LiveSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        self.tx.borrow().clone()
    }

    /// Returns whether the committed set changed.
    pub async fn refresh(&mut self) -> Result<bool> {
        let started = Instant::now();
        let raw = match self.odds.fetch_upcoming().await.context("odds feed (upcoming)") {
            Ok(raw) => raw,
            Err(e) => {
                let message = format!("{e:#}");
                warn!("upcoming cycle aborted: {}", message);
                self.tx.send_modify(|s| s.error = Some(message.clone()));
                if let Some(events) = &self.events {
                    let _ = events.log(&ApiStatusEvent {
                        ts: now_iso(),
                        event: "API_STATUS",
                        source: "odds_upcoming".to_string(),
                        ok: false,
                        status_code: None,
                        message,
                    });
                }
                return Err(e);
            }
        };

        self.cycle += 1;
        let normalized = normalize(&raw);
        let upcoming = filter_upcoming(&normalized);
        let count = upcoming.len();
        let committed = self.state.commit(upcoming);

        if committed {
            self.tx.send_replace(LiveSnapshot {
                matches: self.state.current(),
                error: None,
                updated_at: Some(Utc::now()),
                cycle: self.cycle,
            });
        } else {
            self.tx.send_if_modified(|s| s.error.take().is_some());
        }

        if let Some(events) = &self.events {
            let _ = events.log(&RefreshCycleEvent {
                ts: now_iso(),
                event: "REFRESH_CYCLE",
                feed: "upcoming".to_string(),
                upstream: normalized.len(),
                merged: normalized.len(),
                live: count,
                committed,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }
        Ok(committed)
    }

    pub async fn run(&mut self, mut control: watch::Receiver<SchedulerControl>) {
        let mut ticker = interval(self.config.upcoming_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "upcoming scheduler started ({}ms interval)",
            self.config.upcoming_interval.as_millis()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let mode = *control.borrow();
                    match mode {
                        SchedulerControl::Stop => break,
                        SchedulerControl::Pause => continue,
                        SchedulerControl::Run => {}
                    }
                    if let Err(e) = self.refresh().await {
                        debug!("upcoming cycle failed: {:#}", e);
                    }
                }
                changed = control.changed() => {
                    if changed.is_err() || *control.borrow() == SchedulerControl::Stop {
                        break;
                    }
                }
            }
        }
        info!("upcoming scheduler stopped");
    }
}
