use anyhow::{Context, Result};
use chrono::Utc;
use futures_util::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use logger::{
    now_iso, ApiStatusEvent, EventLogger, MatchFinishedEvent, RefreshCycleEvent,
    SnapshotSavedEvent,
};
use match_enricher::MatchEnricher;
use match_merge::{filter_live, merge, FinishedSet, LiveState};
use match_model::{normalize, persist_snapshot, Match, SnapshotStore};
use stats_client::OddsSource;

use crate::config::{SchedulerConfig, SchedulerControl};
use crate::LiveSnapshot;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub upstream: usize,
    pub merged: usize,
    pub live: usize,
    pub committed: bool,
    pub dropped: Vec<String>,
    pub newly_finished: Vec<String>,
}

pub struct LiveScheduler {
    odds: Arc<dyn OddsSource>,
    enricher: Arc<MatchEnricher>,
    config: SchedulerConfig,
    /// Merged set before the live filter.
    baseline: Vec<Match>,
    missed: HashMap<String, u32>,
    state: LiveState,
    finished: FinishedSet,
    tx: watch::Sender<LiveSnapshot>,
    store: Option<Arc<dyn SnapshotStore>>,
    events: Option<EventLogger>,
    cycle: u64,
    warmed_up: bool,
}

impl LiveScheduler {
    pub fn new(
        odds: Arc<dyn OddsSource>,
        enricher: Arc<MatchEnricher>,
        config: SchedulerConfig,
    ) -> Self {
        let (tx, _) = watch::channel(LiveSnapshot::default());
        Self {
            odds,
            enricher,
            config,
            baseline: Vec::new(),
            missed: HashMap::new(),
            state: LiveState::new(),
            finished: FinishedSet::new(),
            tx,
            store: None,
            events: None,
            cycle: 0,
            warmed_up: false,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
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

    pub fn baseline(&self) -> &[Match] {
        &self.baseline
    }

    pub fn finished(&self) -> &FinishedSet {
        &self.finished
    }

    /// Jediný způsob, jak vrátit ukončené zápasy do live view.
    pub fn clear_finished(&mut self) {
        info!("clearing {} finished matches", self.finished.len());
        self.finished.clear();
    }

    // ── Cycles ───────────────────────────────────────────────────────────────

    /// Full enrichment of every match in the current batch.
    pub async fn cold_start(&mut self) -> Result<CycleReport> {
        let started = Instant::now();
        let batch = self.fetch_batch().await?;

        let enricher = &self.enricher;
        let enriched = join_all(batch.iter().map(|m| enricher.enrich_initial(m))).await;

        self.baseline = merge(&[], &enriched);
        self.missed.clear();
        self.warmed_up = true;

        let report = self.commit_cycle(batch.len(), Vec::new(), started).await;
        info!(
            "cold start: {} upstream, {} live",
            report.upstream, report.live
        );
        Ok(report)
    }

    /// One realtime cycle. Falls back to `cold_start` until it has succeeded.
    pub async fn refresh(&mut self) -> Result<CycleReport> {
        if !self.warmed_up {
            return self.cold_start().await;
        }
        let started = Instant::now();
        let batch = self.fetch_batch().await?;

        let known: HashSet<&str> = self.baseline.iter().map(|m| m.event_id.as_str()).collect();
        let enricher = &self.enricher;
        let finished = &self.finished;
        let enriched = join_all(batch.iter().map(|m| {
            let first_sight = !known.contains(m.event_id.as_str());
            async move {
                if finished.contains(&m.event_id) {
                    // bez upstream volání, merge si nechá enrichment z baseline
                    m.clone()
                } else if first_sight {
                    debug!("first sight of {}, full enrichment", m.event_id);
                    enricher.enrich_initial(m).await
                } else {
                    enricher.enrich_realtime(m).await
                }
            }
        }))
        .await;

        let merged = merge(&self.baseline, &enriched);
        let (kept, dropped) = self.prune_absent(merged, &batch);
        self.baseline = kept;

        Ok(self.commit_cycle(batch.len(), dropped, started).await)
    }

    pub async fn run(&mut self, mut control: watch::Receiver<SchedulerControl>) {
        let mut ticker = interval(self.config.live_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "live scheduler started ({}ms interval)",
            self.config.live_interval.as_millis()
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
                        debug!("live cycle {} failed: {:#}", self.cycle, e);
                    }
                }
                changed = control.changed() => {
                    if changed.is_err() || *control.borrow() == SchedulerControl::Stop {
                        break;
                    }
                }
            }
        }
        info!("live scheduler stopped after {} cycles", self.cycle);
    }

    // ── Internals ────────────────────────────────────────────────────────────

    async fn fetch_batch(&self) -> Result<Vec<Match>> {
        match self.odds.fetch_live().await.context("odds feed (live)") {
            Ok(raw) => Ok(normalize(&raw)),
            Err(e) => {
                self.publish_error(&e);
                Err(e)
            }
        }
    }

    /// Present ids reset their miss counter; absent ones are kept until they
    /// have been missing for more than `max_missed_cycles` cycles.
    fn prune_absent(&mut self, merged: Vec<Match>, incoming: &[Match]) -> (Vec<Match>, Vec<String>) {
        let seen: HashSet<&str> = incoming.iter().map(|m| m.event_id.as_str()).collect();
        self.missed.retain(|id, _| !seen.contains(id.as_str()));

        let mut kept = Vec::with_capacity(merged.len());
        let mut dropped = Vec::new();
        for m in merged {
            if seen.contains(m.event_id.as_str()) {
                kept.push(m);
                continue;
            }
            let misses = self.missed.entry(m.event_id.clone()).or_insert(0);
            *misses += 1;
            if *misses > self.config.max_missed_cycles {
                self.missed.remove(&m.event_id);
                debug!("{} absent from upstream, dropped", m.event_id);
                dropped.push(m.event_id);
            } else {
                kept.push(m);
            }
        }
        (kept, dropped)
    }

    async fn commit_cycle(
        &mut self,
        upstream: usize,
        dropped: Vec<String>,
        started: Instant,
    ) -> CycleReport {
        self.cycle += 1;

        let newly: Vec<String> = self
            .finished
            .observe(&self.baseline)
            .into_iter()
            .map(|m| {
                if let Some(events) = &self.events {
                    let _ = events.log(&MatchFinishedEvent {
                        ts: now_iso(),
                        event: "MATCH_FINISHED",
                        event_id: m.event_id.clone(),
                        home: m.home_team_name.clone(),
                        away: m.away_team_name.clone(),
                        score: m.set_score.clone(),
                    });
                }
                m.event_id.clone()
            })
            .collect();

        let live = filter_live(&self.baseline, &self.finished);
        let live_count = live.len();
        let committed = self.state.commit(live);

        if committed {
            let matches = self.state.current();
            self.persist(matches.clone()).await;
            self.tx.send_replace(LiveSnapshot {
                matches,
                error: None,
                updated_at: Some(Utc::now()),
                cycle: self.cycle,
            });
        } else {
            // feed je zpátky, data beze změny, jen shodit error
            self.tx.send_if_modified(|s| s.error.take().is_some());
        }

        let report = CycleReport {
            upstream,
            merged: self.baseline.len(),
            live: live_count,
            committed,
            dropped,
            newly_finished: newly,
        };

        if let Some(events) = &self.events {
            let _ = events.log(&RefreshCycleEvent {
                ts: now_iso(),
                event: "REFRESH_CYCLE",
                feed: "live".to_string(),
                upstream: report.upstream,
                merged: report.merged,
                live: report.live,
                committed,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }
        debug!(
            "cycle {}: upstream={} merged={} live={} committed={}",
            self.cycle, report.upstream, report.merged, report.live, committed
        );
        report
    }

    /// SQLite je blokující, zápis jde mimo runtime.
    async fn persist(&self, matches: Arc<Vec<Match>>) {
        let Some(store) = self.store.clone() else { return };
        let date = Utc::now().format("%Y-%m-%d").to_string();
        let day = date.clone();
        let ttl = self.config.snapshot_ttl;

        let result = tokio::task::spawn_blocking(move || {
            persist_snapshot(store.as_ref(), &day, &matches, ttl)
        })
        .await;

        match result {
            Ok(Ok(written)) => {
                if let Some(events) = &self.events {
                    let _ = events.log(&SnapshotSavedEvent {
                        ts: now_iso(),
                        event: "SNAPSHOT_SAVED",
                        date,
                        matches: written,
                    });
                }
            }
            Ok(Err(e)) => warn!("snapshot persist failed: {}", e),
            Err(e) => warn!("snapshot writer task failed: {}", e),
        }
    }

    /// Stale-but-present: matches stay, only `error` is set.
    fn publish_error(&self, e: &anyhow::Error) {
        let message = format!("{e:#}");
        warn!("live cycle aborted: {}", message);
        self.tx.send_modify(|s| s.error = Some(message.clone()));

        if let Some(events) = &self.events {
            let _ = events.log(&ApiStatusEvent {
                ts: now_iso(),
                event: "API_STATUS",
                source: "odds_live".to_string(),
                ok: false,
                status_code: None,
                message,
            });
        }
    }
}
