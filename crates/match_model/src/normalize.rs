//! Upstream payload → `Match`.
//!
//! Odds feed vrací dva tvary:
//!   a) `{ data: [ {name, events: [...]}, ... ] }`
//!   b) `{ data: { tournaments: [ {name, events: [...]}, ... ] } }`
//! Push kanál má vlastní tvar (`coreData.teams`, `matchInfo.tournament`, ...).
//! Obojí končí jako `Match`, dál se s raw JSON nepracuje.

use chrono::{TimeZone, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::types::{value_string, EnrichedData, Market, Match, PlayedTime};

pub const UNKNOWN_TOURNAMENT: &str = "Unknown Tournament";

/// Case-insensitive marker of simulated leagues.
///
/// Known false positive: any real tournament or team whose name contains
/// these letters is dropped too.
pub const SIMULATED_LEAGUE_MARKER: &str = "srl";

const KNOWN_EVENT_FIELDS: &[&str] = &[
    "eventId",
    "id",
    "tournamentName",
    "homeTeamName",
    "awayTeamName",
    "setScore",
    "playedSeconds",
    "matchStatus",
    "period",
    "estimateStartTime",
    "markets",
    "isSimulated",
    "enrichedData",
    "_stableKey",
];

/// Top-level shape of an odds feed response, resolved once.
#[derive(Debug, Clone, Copy)]
pub enum RawFeed<'a> {
    /// Bare list of tournaments.
    TournamentList(&'a [Value]),
    /// Object carrying a `tournaments` list.
    Keyed(&'a [Value]),
    Unrecognized,
}

impl<'a> RawFeed<'a> {
    pub fn classify(raw: &'a Value) -> Self {
        let body = raw.get("data").unwrap_or(raw);
        match body {
            Value::Array(list) => RawFeed::TournamentList(list),
            Value::Object(obj) => match obj.get("tournaments") {
                Some(Value::Array(list)) => RawFeed::Keyed(list),
                _ => RawFeed::Unrecognized,
            },
            _ => RawFeed::Unrecognized,
        }
    }

    pub fn tournaments(&self) -> &'a [Value] {
        match self {
            RawFeed::TournamentList(list) | RawFeed::Keyed(list) => list,
            RawFeed::Unrecognized => &[],
        }
    }
}

/// Flatten an odds feed response into matches. Never fails; malformed
/// tournaments just contribute nothing.
pub fn normalize(raw: &Value) -> Vec<Match> {
    let feed = RawFeed::classify(raw);
    if let RawFeed::Unrecognized = feed {
        debug!("normalize: unrecognized odds feed shape");
    }

    let mut out = Vec::new();
    for tournament in feed.tournaments() {
        let name = tournament
            .get("name")
            .and_then(value_string)
            .unwrap_or_else(|| UNKNOWN_TOURNAMENT.to_string());

        let events = match tournament.get("events").and_then(Value::as_array) {
            Some(events) => events,
            None => continue,
        };

        for event in events {
            match from_raw_event(&name, event) {
                Some(m) => out.push(m),
                None => debug!("normalize: event without id in '{}' skipped", name),
            }
        }
    }
    out
}

/// Spread one polling-source event into a `Match` under `tournament_name`.
pub fn from_raw_event(tournament_name: &str, event: &Value) -> Option<Match> {
    let obj = event.as_object()?;
    let event_id = obj
        .get("eventId")
        .and_then(value_string)
        .or_else(|| obj.get("id").and_then(value_string))?;

    let text = |key: &str| obj.get(key).and_then(value_string);

    let mut m = Match::new(
        event_id,
        tournament_name,
        text("homeTeamName").unwrap_or_default(),
        text("awayTeamName").unwrap_or_default(),
    );
    m.set_score = text("setScore");
    m.played_seconds = obj.get("playedSeconds").and_then(played_time);
    m.match_status = text("matchStatus");
    m.period = text("period");
    m.estimate_start_time = obj.get("estimateStartTime").and_then(start_time);
    m.markets = obj.get("markets").map(markets).unwrap_or_default();
    m.is_simulated = obj
        .get("isSimulated")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    m.enriched_data = obj.get("enrichedData").and_then(enriched);
    m.extra = obj
        .iter()
        .filter(|(k, _)| !KNOWN_EVENT_FIELDS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect::<Map<String, Value>>();
    m.refresh_stable_key();
    Some(m)
}

/// Map one live-feed push payload. Returns `None` for payloads without a
/// stable id, without team names, or from simulated leagues.
pub fn from_push_payload(raw: &Value) -> Option<Match> {
    let event_id = raw
        .get("eventId")
        .and_then(value_string)
        .or_else(|| raw.get("id").and_then(value_string))
        .or_else(|| raw.pointer("/coreData/eventId").and_then(value_string))
        .or_else(|| raw.pointer("/coreData/id").and_then(value_string))?;

    let team = |side: &str| {
        raw.pointer(&format!("/coreData/teams/{side}/name"))
            .or_else(|| raw.pointer(&format!("/coreData/teams/{side}")))
            .and_then(value_string)
            .unwrap_or_default()
    };
    let home = team("home");
    let away = team("away");
    if home.trim().is_empty() || away.trim().is_empty() {
        return None;
    }

    let tournament = raw
        .pointer("/matchInfo/tournament/name")
        .or_else(|| raw.pointer("/matchInfo/tournament"))
        .and_then(value_string)
        .unwrap_or_else(|| UNKNOWN_TOURNAMENT.to_string());

    let mut m = Match::new(event_id, tournament, home, away);

    m.set_score = match raw.pointer("/statistics/score") {
        Some(Value::Object(score)) => {
            let h = score.get("home").and_then(value_string);
            let a = score.get("away").and_then(value_string);
            match (h, a) {
                (Some(h), Some(a)) => Some(format!("{h}:{a}")),
                _ => None,
            }
        }
        Some(other) => value_string(other),
        None => None,
    };
    m.played_seconds = raw
        .pointer("/timeline/matchTime/seconds")
        .and_then(Value::as_f64)
        .map(|s| PlayedTime::clock_from_seconds(s.max(0.0) as u64));
    m.match_status = raw
        .pointer("/coreData/status")
        .or_else(|| raw.pointer("/matchInfo/status"))
        .and_then(value_string);
    m.period = raw
        .pointer("/timeline/period")
        .or_else(|| raw.pointer("/coreData/period"))
        .and_then(value_string);
    m.estimate_start_time = raw
        .pointer("/coreData/startTime")
        .or_else(|| raw.pointer("/matchInfo/startTime"))
        .and_then(start_time);
    m.markets = raw.get("markets").map(markets).unwrap_or_default();
    m.is_simulated = raw
        .get("isSimulated")
        .or_else(|| raw.pointer("/coreData/isSimulated"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    m.enriched_data = raw.get("enrichedData").and_then(enriched);

    if looks_simulated(&m) {
        return None;
    }
    m.refresh_stable_key();
    Some(m)
}

/// Simulated flag set, or tournament/team names carrying the marker.
pub fn looks_simulated(m: &Match) -> bool {
    if m.is_simulated {
        return true;
    }
    [&m.tournament_name, &m.home_team_name, &m.away_team_name]
        .iter()
        .any(|name| name.to_lowercase().contains(SIMULATED_LEAGUE_MARKER))
}

fn played_time(v: &Value) -> Option<PlayedTime> {
    match v {
        Value::Number(n) => n.as_f64().map(PlayedTime::Seconds),
        Value::String(s) if !s.trim().is_empty() => Some(PlayedTime::Clock(s.clone())),
        _ => None,
    }
}

/// ISO-8601 passes through; epoch millis get converted.
fn start_time(v: &Value) -> Option<String> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .map(|dt| dt.to_rfc3339()),
        other => value_string(other),
    }
}

fn markets(v: &Value) -> Vec<Market> {
    serde_json::from_value(v.clone()).unwrap_or_default()
}

fn enriched(v: &Value) -> Option<EnrichedData> {
    if v.is_null() {
        return None;
    }
    serde_json::from_value(v.clone()).ok()
}
