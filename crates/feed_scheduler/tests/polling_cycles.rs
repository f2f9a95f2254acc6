//! Celé polling cykly nad stub odds feedem a stub stats providerem.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use feed_scheduler::{LiveScheduler, SchedulerConfig, SchedulerControl, UpcomingScheduler};
use logger::EventLogger;
use match_enricher::MatchEnricher;
use match_model::{load_snapshot, MemoryStore, SnapshotStore};
use stats_client::{
    Endpoint, FetchError, OddsSource, QueueConfig, RequestQueue, StatsRequest, StatsTransport,
};

/// Odpovídá naskriptovanými payloady; `None` = výpadek feedu.
struct ScriptedOdds {
    live: Mutex<VecDeque<Option<Value>>>,
    upcoming: Mutex<VecDeque<Option<Value>>>,
}

impl ScriptedOdds {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            live: Mutex::new(VecDeque::new()),
            upcoming: Mutex::new(VecDeque::new()),
        })
    }

    fn push_live(&self, payload: Option<Value>) {
        self.live.lock().push_back(payload);
    }

    fn push_upcoming(&self, payload: Option<Value>) {
        self.upcoming.lock().push_back(payload);
    }
}

fn next(queue: &Mutex<VecDeque<Option<Value>>>) -> Result<Value> {
    match queue.lock().pop_front() {
        Some(Some(v)) => Ok(v),
        Some(None) => Err(anyhow!("HTTP 503")),
        None => Err(anyhow!("script exhausted")),
    }
}

#[async_trait]
impl OddsSource for ScriptedOdds {
    async fn fetch_live(&self) -> Result<Value> {
        next(&self.live)
    }

    async fn fetch_upcoming(&self) -> Result<Value> {
        next(&self.upcoming)
    }
}

struct StaticStats;

#[async_trait]
impl StatsTransport for StaticStats {
    async fn fetch(&self, req: &StatsRequest) -> Result<Value, FetchError> {
        Ok(match req.endpoint {
            Endpoint::MatchDetails => json!({ "values": {
                "110":  { "value": { "home": 50, "away": 50 } },
                "1029": { "value": { "home": 5, "away": 4 } },
            }}),
            Endpoint::MatchSituation => json!({ "data": [
                { "time": 10, "home": { "attack": 1, "dangerous": 1 }, "away": { "attack": 1, "dangerous": 0 } }
            ]}),
            _ => json!({ "endpoint": req.endpoint.path() }),
        })
    }
}

/// StaticStats, který počítá volání.
#[derive(Default)]
struct CountingStats {
    calls: AtomicUsize,
}

#[async_trait]
impl StatsTransport for CountingStats {
    async fn fetch(&self, req: &StatsRequest) -> Result<Value, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        StaticStats.fetch(req).await
    }
}

fn event(id: u32, clock: &str, score: &str) -> Value {
    json!({
        "eventId": format!("sr:match:{id}"),
        "homeTeamName": format!("Home {id}"),
        "awayTeamName": format!("Away {id}"),
        "playedSeconds": clock,
        "setScore": score,
    })
}

fn feed(events: Vec<Value>) -> Option<Value> {
    Some(json!({ "data": { "tournaments": [{ "name": "Liga", "events": events }] } }))
}

fn scheduler(odds: Arc<ScriptedOdds>) -> LiveScheduler {
    let queue = RequestQueue::spawn(Arc::new(StaticStats), QueueConfig::default());
    let enricher = Arc::new(MatchEnricher::new(queue, None));
    LiveScheduler::new(odds, enricher, SchedulerConfig::default())
}

fn live_ids(s: &LiveScheduler) -> Vec<String> {
    s.snapshot().matches.iter().map(|m| m.event_id.clone()).collect()
}

#[tokio::test(start_paused = true)]
async fn cold_start_publishes_enriched_live_set() {
    let odds = ScriptedOdds::new();
    odds.push_live(feed(vec![event(1, "10:00", "0:0"), event(2, "20:00", "1:0")]));
    let mut s = scheduler(odds);
    let rx = s.subscribe();

    let report = s.refresh().await.unwrap();
    assert_eq!(report.upstream, 2);
    assert_eq!(report.live, 2);
    assert!(report.committed);

    let snap = rx.borrow().clone();
    assert_eq!(snap.cycle, 1);
    assert!(snap.error.is_none());
    assert!(snap.matches.iter().all(|m| m.enriched_data.is_some()));
}

#[tokio::test(start_paused = true)]
async fn unchanged_cycle_does_not_republish() {
    let odds = ScriptedOdds::new();
    let batch = vec![event(1, "10:00", "0:0")];
    odds.push_live(feed(batch.clone()));
    odds.push_live(feed(batch));
    let mut s = scheduler(odds);

    s.refresh().await.unwrap();
    let before = s.snapshot().matches;
    let rx = s.subscribe();

    let report = s.refresh().await.unwrap();
    assert!(!report.committed);
    assert!(!rx.has_changed().unwrap());
    assert!(Arc::ptr_eq(&before, &s.snapshot().matches));
}

#[tokio::test(start_paused = true)]
async fn feed_outage_keeps_previous_matches() {
    let odds = ScriptedOdds::new();
    odds.push_live(feed(vec![event(1, "10:00", "0:0")]));
    odds.push_live(None);
    odds.push_live(feed(vec![event(1, "10:00", "0:0")]));
    let mut s = scheduler(odds);

    s.refresh().await.unwrap();
    assert!(s.refresh().await.is_err());

    let snap = s.snapshot();
    assert!(snap.error.as_deref().unwrap_or_default().contains("503"));
    assert_eq!(live_ids(&s), vec!["sr:match:1"]);

    // zotavení bez změny dat shodí error
    s.refresh().await.unwrap();
    assert!(s.snapshot().error.is_none());
}

#[tokio::test(start_paused = true)]
async fn finished_match_stays_out_until_cleared() {
    let odds = ScriptedOdds::new();
    odds.push_live(feed(vec![event(1, "89:00", "1:0"), event(2, "30:00", "0:0")]));
    odds.push_live(feed(vec![event(1, "90:05", "2:0"), event(2, "31:00", "0:0")]));
    odds.push_live(feed(vec![event(1, "12:00", "0:0"), event(2, "32:00", "0:0")]));
    odds.push_live(feed(vec![event(1, "12:00", "0:0"), event(2, "33:00", "0:0")]));
    let mut s = scheduler(odds);

    s.refresh().await.unwrap();
    assert_eq!(live_ids(&s), vec!["sr:match:1", "sr:match:2"]);

    let report = s.refresh().await.unwrap();
    assert_eq!(report.newly_finished, vec!["sr:match:1"]);
    assert_eq!(live_ids(&s), vec!["sr:match:2"]);

    // hodiny spadly zpátky, zápas pořád venku
    s.refresh().await.unwrap();
    assert_eq!(live_ids(&s), vec!["sr:match:2"]);

    s.clear_finished();
    s.refresh().await.unwrap();
    assert_eq!(live_ids(&s), vec!["sr:match:1", "sr:match:2"]);
}

#[tokio::test(start_paused = true)]
async fn finished_match_is_not_enriched_again() {
    let odds = ScriptedOdds::new();
    odds.push_live(feed(vec![event(1, "89:00", "1:0"), event(2, "30:00", "0:0")]));
    odds.push_live(feed(vec![event(1, "90:05", "2:0"), event(2, "31:00", "0:0")]));
    odds.push_live(feed(vec![event(1, "90:40", "2:1"), event(2, "32:00", "0:0")]));
    let stats = Arc::new(CountingStats::default());
    let queue = RequestQueue::spawn(stats.clone(), QueueConfig::default());
    let enricher = Arc::new(MatchEnricher::new(queue, None));
    let mut s = LiveScheduler::new(odds, enricher, SchedulerConfig::default());

    s.refresh().await.unwrap();
    let report = s.refresh().await.unwrap();
    assert_eq!(report.newly_finished, vec!["sr:match:1"]);

    let before = stats.calls.load(Ordering::SeqCst);
    s.refresh().await.unwrap();
    // jen realtime pro zápas 2
    assert_eq!(stats.calls.load(Ordering::SeqCst) - before, 4);

    let done = s.baseline().iter().find(|m| m.event_id == "sr:match:1").unwrap();
    assert_eq!(done.set_score.as_deref(), Some("2:1"));
    assert!(done.enriched_data.as_ref().unwrap().missing_sections().is_empty());
    assert_eq!(live_ids(&s), vec!["sr:match:2"]);
}

#[tokio::test(start_paused = true)]
async fn absent_match_survives_one_cycle_then_drops() {
    let odds = ScriptedOdds::new();
    odds.push_live(feed(vec![event(1, "10:00", "0:0"), event(2, "10:00", "0:0")]));
    odds.push_live(feed(vec![event(2, "11:00", "0:0")]));
    odds.push_live(feed(vec![event(2, "12:00", "0:0")]));
    let mut s = scheduler(odds);

    s.refresh().await.unwrap();
    let report = s.refresh().await.unwrap();
    assert!(report.dropped.is_empty());
    assert_eq!(report.merged, 2);

    let report = s.refresh().await.unwrap();
    assert_eq!(report.dropped, vec!["sr:match:1"]);
    assert_eq!(live_ids(&s), vec!["sr:match:2"]);
}

#[tokio::test(start_paused = true)]
async fn late_match_gets_full_enrichment() {
    let odds = ScriptedOdds::new();
    odds.push_live(feed(vec![event(1, "10:00", "0:0")]));
    odds.push_live(feed(vec![event(1, "11:00", "0:0"), event(3, "01:00", "0:0")]));
    let mut s = scheduler(odds);

    s.refresh().await.unwrap();
    s.refresh().await.unwrap();

    let late = s
        .baseline()
        .iter()
        .find(|m| m.event_id == "sr:match:3")
        .cloned()
        .unwrap();
    assert!(late.enriched_data.unwrap().missing_sections().is_empty());
    assert_eq!(live_ids(&s), vec!["sr:match:1", "sr:match:3"]);
}

#[tokio::test(start_paused = true)]
async fn committed_cycles_are_persisted_and_logged() {
    let odds = ScriptedOdds::new();
    odds.push_live(feed(vec![event(1, "10:00", "0:0")]));
    let store = Arc::new(MemoryStore::new());
    let logs = tempfile::tempdir().unwrap();

    let shared: Arc<dyn SnapshotStore> = store.clone();
    let mut s = scheduler(odds)
        .with_store(shared)
        .with_event_logger(EventLogger::new(logs.path()));
    s.refresh().await.unwrap();

    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let saved = load_snapshot(store.as_ref(), &today).unwrap();
    assert_eq!(saved.len(), 1);

    let log = std::fs::read_to_string(logs.path().join(format!("{today}.jsonl"))).unwrap();
    assert!(log.contains("\"REFRESH_CYCLE\""));
    assert!(log.contains("\"SNAPSHOT_SAVED\""));
}

#[tokio::test(start_paused = true)]
async fn upcoming_cycle_filters_without_enrichment() {
    let odds = ScriptedOdds::new();
    odds.push_upcoming(Some(json!({ "data": [
        { "name": "Liga", "events": [event(7, "", ""), { "eventId": "sr:match:8", "homeTeamName": "SRL United", "awayTeamName": "B" }] },
        { "name": "Broken" },
    ]})));
    let mut s = UpcomingScheduler::new(odds, SchedulerConfig::default());

    assert!(s.refresh().await.unwrap());
    let snap = s.snapshot();
    assert_eq!(snap.matches.len(), 1);
    assert_eq!(snap.matches[0].event_id, "sr:match:7");
    assert!(snap.matches[0].enriched_data.is_none());
}

#[tokio::test(start_paused = true)]
async fn run_loop_honours_pause_and_stop() {
    let odds = ScriptedOdds::new();
    for _ in 0..3 {
        odds.push_live(feed(vec![event(1, "10:00", "0:0")]));
    }
    let mut s = scheduler(odds.clone());
    let rx = s.subscribe();
    let (control, control_rx) = watch::channel(SchedulerControl::Pause);

    let handle = tokio::spawn(async move {
        s.run(control_rx).await;
        s
    });

    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(rx.borrow().cycle, 0);

    control.send_replace(SchedulerControl::Run);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(rx.borrow().cycle >= 1);

    control.send_replace(SchedulerControl::Stop);
    let s = handle.await.unwrap();
    assert_eq!(s.baseline().len(), 1);
}
