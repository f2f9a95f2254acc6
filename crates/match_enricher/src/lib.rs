//! Match Enricher — doplní zápas o statistiky ze stats providera.
//!
//! Dvě kadence:
//!   `enrich_initial`  — plné obohacení, 3 prioritní fáze přes RequestQueue
//!   `enrich_realtime` — jen timeline/delta/situation/details + analýza
//!
//! Ven nikdy nepropadne chyba ani panic: initial vrací stub,
//! realtime vrací zápas beze změny.

use anyhow::{anyhow, bail, Result};
use futures_util::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

use logger::LogThrottle;
use match_model::store::prematch_key;
use match_model::{
    is_empty_value, value_string, EnrichedData, FeedError, Match, SnapshotStore, TeamForm,
    Timeline, TournamentData,
};
use prediction_engine::PredictionEngine;
use stats_client::{Endpoint, RequestQueue, StatsRequest};

/// Jeden slot dávky: buď se fetchuje, nebo rovnou platí fallback
/// (chybí sekundární id, např. uid týmu).
enum Slot {
    Fetch(StatsRequest),
    Skip(Value),
}

impl Slot {
    fn for_id(endpoint: Endpoint, id: Option<&str>) -> Self {
        match id {
            Some(id) => Slot::Fetch(StatsRequest::new(endpoint, id)),
            None => Slot::Skip(endpoint.fallback()),
        }
    }
}

/// Ids potřebné pro fázi 2 a 3, vytažené z match_info.
#[derive(Debug, Default, Clone, PartialEq)]
struct RelatedIds {
    home_uid: Option<String>,
    away_uid: Option<String>,
    season_id: Option<String>,
}

fn first_string(v: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .find_map(|p| v.pointer(p).and_then(value_string))
}

impl RelatedIds {
    fn from_info(info: &Value, m: &Match) -> Self {
        let extra = |key: &str| m.extra.get(key).and_then(value_string);
        Self {
            home_uid: first_string(info, &["/match/teams/home/uid", "/match/teams/home/_id"])
                .or_else(|| extra("homeTeamId")),
            away_uid: first_string(info, &["/match/teams/away/uid", "/match/teams/away/_id"])
                .or_else(|| extra("awayTeamId")),
            season_id: first_string(info, &["/match/_seasonid", "/season/_id"])
                .or_else(|| extra("seasonId")),
        }
    }
}

fn take<const N: usize>(values: Vec<Value>, phase: &str) -> Result<[Value; N]> {
    values
        .try_into()
        .map_err(|v: Vec<Value>| anyhow!("{phase}: expected {N} results, got {}", v.len()))
}

pub struct MatchEnricher {
    queue: RequestQueue,
    store: Option<Arc<dyn SnapshotStore>>,
    prematch_cache: Mutex<HashMap<String, Option<Value>>>,
    engine: PredictionEngine,
    throttle: LogThrottle,
}

impl MatchEnricher {
    pub fn new(queue: RequestQueue, store: Option<Arc<dyn SnapshotStore>>) -> Self {
        Self {
            queue,
            store,
            prematch_cache: Mutex::new(HashMap::new()),
            engine: PredictionEngine::new(),
            throttle: LogThrottle::default(),
        }
    }

    pub fn with_engine(mut self, engine: PredictionEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Full enrichment. On any failure the match comes back with the
    /// all-empty stub attached.
    pub async fn enrich_initial(&self, m: &Match) -> Match {
        match AssertUnwindSafe(self.try_enrich_initial(m)).catch_unwind().await {
            Ok(Ok(enriched)) => enriched,
            Ok(Err(e)) => {
                if self.throttle.allow(&format!("initial:{}", m.event_id)) {
                    warn!("enrich_initial {} failed: {:#}", m.event_id, e);
                }
                with_stub(m)
            }
            Err(_) => {
                error!("enrich_initial {} panicked, using stub", m.event_id);
                with_stub(m)
            }
        }
    }

    /// Light refresh of the fast sections. On failure returns `m` unchanged.
    pub async fn enrich_realtime(&self, m: &Match) -> Match {
        match AssertUnwindSafe(self.try_enrich_realtime(m)).catch_unwind().await {
            Ok(Ok(enriched)) => enriched,
            Ok(Err(e)) => {
                if self.throttle.allow(&format!("realtime:{}", m.event_id)) {
                    warn!("enrich_realtime {} failed: {:#}", m.event_id, e);
                }
                m.clone()
            }
            Err(_) => {
                error!("enrich_realtime {} panicked, keeping previous", m.event_id);
                m.clone()
            }
        }
    }

    pub fn clear_prematch_cache(&self) {
        self.prematch_cache.lock().clear();
    }

    pub fn prematch_cache_len(&self) -> usize {
        self.prematch_cache.lock().len()
    }

    // ── Initial ──────────────────────────────────────────────────────────────

    async fn try_enrich_initial(&self, m: &Match) -> Result<Match> {
        let id = m.numeric_id();
        if id.is_empty() {
            bail!("match {:?} has no numeric id", m.event_id);
        }

        // Fáze 1: základ, prematch z cache/store souběžně
        let (phase1, prematch) = tokio::join!(
            self.fetch_slots(vec![
                Slot::for_id(Endpoint::MatchInfo, Some(id)),
                Slot::for_id(Endpoint::MatchDetails, Some(id)),
                Slot::for_id(Endpoint::MatchTimeline, Some(id)),
            ]),
            self.prematch(id),
        );
        let [info, details, timeline] = take(phase1, "phase 1")?;
        let related = RelatedIds::from_info(&info, m);
        debug!("{} related ids: {:?}", m.event_id, related);

        // Fáze 2 až po dokončení fáze 1
        let h2h = match (&related.home_uid, &related.away_uid) {
            (Some(h), Some(a)) => {
                Slot::Fetch(StatsRequest::new(Endpoint::HeadToHead, h.as_str()).with_secondary(a.as_str()))
            }
            _ => Slot::Skip(Endpoint::HeadToHead.fallback()),
        };
        let phase2 = self
            .fetch_slots(vec![
                Slot::for_id(Endpoint::MatchSituation, Some(id)),
                Slot::for_id(Endpoint::MatchTimelineDelta, Some(id)),
                Slot::for_id(Endpoint::TeamForm, related.home_uid.as_deref()),
                Slot::for_id(Endpoint::TeamForm, related.away_uid.as_deref()),
                h2h,
            ])
            .await;
        let [situation, delta, form_home, form_away, h2h] = take(phase2, "phase 2")?;

        // Fáze 3, nejnižší priorita
        let phase3 = self
            .fetch_slots(vec![
                Slot::for_id(Endpoint::MatchSquads, Some(id)),
                Slot::for_id(Endpoint::MatchOdds, Some(id)),
                Slot::for_id(Endpoint::MatchPhrases, Some(id)),
                Slot::for_id(Endpoint::SeasonMeta, related.season_id.as_deref()),
                Slot::for_id(Endpoint::SeasonTable, related.season_id.as_deref()),
            ])
            .await;
        let [squads, odds, phrases, season_meta, table] = take(phase3, "phase 3")?;

        let mut enriched = EnrichedData {
            match_info: Some(info),
            squads: Some(squads),
            odds: Some(odds),
            timeline: Some(Timeline {
                complete: timeline,
                delta,
            }),
            form: Some(TeamForm {
                home: form_home,
                away: form_away,
            }),
            h2h: Some(h2h),
            tournament: Some(TournamentData { season_meta, table }),
            situation: Some(situation),
            details: Some(details),
            phrases: Some(phrases),
            prematch_market_data: prematch,
            analysis: None,
        };
        enriched.analysis = Some(self.engine.analyze(&enriched));

        let mut out = m.clone();
        out.enriched_data = Some(enriched);
        out.refresh_stable_key();
        Ok(out)
    }

    // ── Realtime ─────────────────────────────────────────────────────────────

    async fn try_enrich_realtime(&self, m: &Match) -> Result<Match> {
        let id = m.numeric_id();
        if id.is_empty() {
            bail!("match {:?} has no numeric id", m.event_id);
        }

        let (timelines, live, prematch) = tokio::join!(
            self.fetch_slots(vec![
                Slot::for_id(Endpoint::MatchTimeline, Some(id)),
                Slot::for_id(Endpoint::MatchTimelineDelta, Some(id)),
            ]),
            self.fetch_slots(vec![
                Slot::for_id(Endpoint::MatchSituation, Some(id)),
                Slot::for_id(Endpoint::MatchDetails, Some(id)),
            ]),
            self.prematch(id),
        );
        let [complete, delta] = take(timelines, "realtime timeline")?;
        let [situation, details] = take(live, "realtime situation")?;

        let mut enriched = m.enriched_data.clone().unwrap_or_default();
        enriched.timeline = Some(Timeline { complete, delta });
        enriched.situation = Some(situation);
        // fallback z neúspěšného volání nesmí vynulovat statistiky
        if !is_empty_value(&details) || enriched.details.is_none() {
            enriched.details = Some(details);
        }
        if prematch.is_some() {
            enriched.prematch_market_data = prematch;
        }
        enriched.analysis = Some(self.engine.analyze(&enriched));

        let mut out = m.clone();
        out.enriched_data = Some(enriched);
        out.refresh_stable_key();
        Ok(out)
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    async fn fetch_slots(&self, slots: Vec<Slot>) -> Vec<Value> {
        let requests: Vec<StatsRequest> = slots
            .iter()
            .filter_map(|s| match s {
                Slot::Fetch(req) => Some(req.clone()),
                Slot::Skip(_) => None,
            })
            .collect();
        let mut fetched = self.queue.enqueue(requests).await.into_iter();

        slots
            .into_iter()
            .map(|s| match s {
                Slot::Fetch(req) => fetched.next().unwrap_or(req.fallback),
                Slot::Skip(fallback) => fallback,
            })
            .collect()
    }

    /// Prematch snapshot ze store, cachovaný per match id (i "nic").
    async fn prematch(&self, numeric_id: &str) -> Option<Value> {
        if let Some(cached) = self.prematch_cache.lock().get(numeric_id) {
            return cached.clone();
        }
        let store = self.store.clone()?;
        let key = prematch_key(numeric_id);
        let lookup = tokio::task::spawn_blocking(move || store.get(&key))
            .await
            .map_err(|e| FeedError::Store(e.to_string()))
            .and_then(|r| r);

        match lookup {
            Ok(value) => {
                self.prematch_cache
                    .lock()
                    .insert(numeric_id.to_string(), value.clone());
                value
            }
            Err(e) => {
                if self.throttle.allow("prematch") {
                    warn!("prematch lookup {} failed: {}", numeric_id, e);
                }
                None
            }
        }
    }
}

fn with_stub(m: &Match) -> Match {
    let mut out = m.clone();
    out.enriched_data = Some(EnrichedData::stub());
    out.refresh_stable_key();
    out
}
