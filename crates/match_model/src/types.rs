use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Zápas po 90. minutě považujeme za ukončený.
pub const FINISHED_AFTER_MINUTES: f64 = 90.0;

// ── Lenient value helpers ─────────────────────────────────────────────────────
// Upstream posílá čísla jednou jako number, jindy jako string ("1.85", "55%").

pub fn value_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

pub fn value_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Upstream ids look like `sr:match:12345`; stats endpoints want `12345`.
pub fn strip_provider_prefix(id: &str) -> &str {
    id.rsplit(':').next().unwrap_or(id)
}

/// True for `null`, `""` and containers holding only empty values, so the
/// endpoint fallbacks (`{"values":{}}`, `{"matches":[]}`) count as empty too.
pub fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Object(o) => o.values().all(is_empty_value),
        Value::Array(a) => a.iter().all(is_empty_value),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

pub(crate) mod lenient {
    use super::{value_f64, value_string};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(value_f64(&v).unwrap_or(0.0))
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(value_string(&v).unwrap_or_default())
    }
}

// ── Markets ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub desc: String,
    #[serde(default, deserialize_with = "lenient::f64")]
    pub odds: f64,
    /// 0.0–1.0
    #[serde(default, deserialize_with = "lenient::f64")]
    pub probability: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Market {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, alias = "desc", deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
}

// ── Clock ────────────────────────────────────────────────────────────────────

/// Played time as delivered upstream: `"67:12"` or plain seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlayedTime {
    Seconds(f64),
    Clock(String),
}

impl PlayedTime {
    pub fn total_seconds(&self) -> Option<f64> {
        match self {
            PlayedTime::Seconds(s) => Some(*s),
            PlayedTime::Clock(c) => parse_clock(c),
        }
    }

    pub fn minutes(&self) -> Option<f64> {
        self.total_seconds().map(|s| s / 60.0)
    }

    /// `MM:SS` rendering used by the push mapping.
    pub fn clock_from_seconds(seconds: u64) -> Self {
        PlayedTime::Clock(format!("{:02}:{:02}", seconds / 60, seconds % 60))
    }
}

fn parse_clock(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    match raw.split_once(':') {
        Some((m, s)) => {
            let m: f64 = m.trim().parse().ok()?;
            let s: f64 = s.trim().parse().ok()?;
            Some(m * 60.0 + s)
        }
        None => raw.parse().ok(),
    }
}

// ── Enrichment ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SidePair<T> {
    pub home: T,
    pub away: T,
}

impl<T> SidePair<T> {
    pub fn new(home: T, away: T) -> Self {
        Self { home, away }
    }
}

pub type GoalProbability = SidePair<f64>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub complete: Value,
    #[serde(default)]
    pub delta: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamForm {
    #[serde(default)]
    pub home: Value,
    #[serde(default)]
    pub away: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentData {
    #[serde(default)]
    pub season_meta: Value,
    #[serde(default)]
    pub table: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shots {
    pub on_target: SidePair<u32>,
    pub off_target: SidePair<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cards {
    pub yellow: SidePair<u32>,
    pub red: SidePair<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchStats {
    pub attacks: SidePair<u32>,
    pub dangerous: SidePair<u32>,
    /// Percent, 0–100 per side.
    pub possession: SidePair<u32>,
    pub shots: Shots,
    pub corners: SidePair<u32>,
    pub cards: Cards,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub minute: u32,
    pub home: f64,
    pub away: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Momentum {
    pub recent: SidePair<f64>,
    pub trend: Vec<TrendPoint>,
    #[serde(default)]
    pub timeline: Value,
    pub possession: SidePair<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationType {
    HomeGoal,
    AwayGoal,
    NoGoal,
    NoPrediction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationType,
    /// 0–100
    pub confidence: u32,
    pub reasons: Vec<String>,
}

impl Recommendation {
    pub fn unavailable() -> Self {
        Self {
            kind: RecommendationType::NoPrediction,
            confidence: 0,
            reasons: vec!["Data unavailable".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    #[serde(default)]
    pub momentum: Option<Momentum>,
    #[serde(default)]
    pub stats: Option<MatchStats>,
    #[serde(default)]
    pub goal_probability: Option<GoalProbability>,
    pub recommendation: Recommendation,
}

impl Analysis {
    /// All-zero analysis attached to the enrichment stub.
    pub fn zeroed() -> Self {
        Self {
            momentum: Some(Momentum::default()),
            stats: Some(MatchStats::default()),
            goal_probability: Some(GoalProbability::default()),
            recommendation: Recommendation::unavailable(),
        }
    }
}

/// Everything fetched around a match. `None` = never fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedData {
    #[serde(default)]
    pub match_info: Option<Value>,
    #[serde(default)]
    pub squads: Option<Value>,
    #[serde(default)]
    pub odds: Option<Value>,
    #[serde(default)]
    pub timeline: Option<Timeline>,
    #[serde(default)]
    pub form: Option<TeamForm>,
    #[serde(default)]
    pub h2h: Option<Value>,
    #[serde(default)]
    pub tournament: Option<TournamentData>,
    #[serde(default)]
    pub situation: Option<Value>,
    #[serde(default)]
    pub details: Option<Value>,
    #[serde(default)]
    pub phrases: Option<Value>,
    #[serde(default)]
    pub prematch_market_data: Option<Value>,
    #[serde(default)]
    pub analysis: Option<Analysis>,
}

impl EnrichedData {
    /// Result of an enrichment that blew up: every section present but empty.
    pub fn stub() -> Self {
        Self {
            match_info: Some(json!({})),
            squads: Some(json!({})),
            odds: Some(json!({})),
            timeline: Some(Timeline {
                complete: json!([]),
                delta: json!([]),
            }),
            form: Some(TeamForm {
                home: json!({}),
                away: json!({}),
            }),
            h2h: Some(json!({})),
            tournament: Some(TournamentData {
                season_meta: json!({}),
                table: json!({}),
            }),
            situation: Some(json!([])),
            details: Some(json!({ "values": {} })),
            phrases: Some(json!([])),
            prematch_market_data: None,
            analysis: Some(Analysis::zeroed()),
        }
    }

    /// Sections the live view insists on, in a fixed order.
    pub fn missing_sections(&self) -> Vec<&'static str> {
        let present = [
            ("h2h", self.h2h.is_some()),
            ("form", self.form.is_some()),
            ("tournament", self.tournament.is_some()),
            ("details", self.details.is_some()),
            ("phrases", self.phrases.is_some()),
            ("situation", self.situation.is_some()),
            ("timeline", self.timeline.is_some()),
            ("matchInfo", self.match_info.is_some()),
            ("odds", self.odds.is_some()),
            ("squads", self.squads.is_some()),
        ];
        present
            .iter()
            .filter(|(_, ok)| !ok)
            .map(|(name, _)| *name)
            .collect()
    }
}

// ── Match ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub event_id: String,
    #[serde(default)]
    pub tournament_name: String,
    #[serde(default)]
    pub home_team_name: String,
    #[serde(default)]
    pub away_team_name: String,
    /// `"H:A"`
    #[serde(default)]
    pub set_score: Option<String>,
    #[serde(default)]
    pub played_seconds: Option<PlayedTime>,
    #[serde(default)]
    pub match_status: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub estimate_start_time: Option<String>,
    #[serde(default)]
    pub markets: Vec<Market>,
    #[serde(default)]
    pub is_simulated: bool,
    #[serde(default)]
    pub enriched_data: Option<EnrichedData>,
    #[serde(default, rename = "_stableKey")]
    pub stable_key: String,
    /// Remaining upstream event fields, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Match {
    pub fn new(
        event_id: impl Into<String>,
        tournament_name: impl Into<String>,
        home_team_name: impl Into<String>,
        away_team_name: impl Into<String>,
    ) -> Self {
        let mut m = Self {
            event_id: event_id.into(),
            tournament_name: tournament_name.into(),
            home_team_name: home_team_name.into(),
            away_team_name: away_team_name.into(),
            set_score: None,
            played_seconds: None,
            match_status: None,
            period: None,
            estimate_start_time: None,
            markets: Vec::new(),
            is_simulated: false,
            enriched_data: None,
            stable_key: String::new(),
            extra: Map::new(),
        };
        m.refresh_stable_key();
        m
    }

    pub fn numeric_id(&self) -> &str {
        strip_provider_prefix(&self.event_id)
    }

    pub fn played_minutes(&self) -> Option<f64> {
        self.played_seconds.as_ref().and_then(PlayedTime::minutes)
    }

    pub fn is_finished(&self) -> bool {
        self.played_minutes()
            .map_or(false, |m| m >= FINISHED_AFTER_MINUTES)
    }

    pub fn analysis(&self) -> Option<&Analysis> {
        self.enriched_data.as_ref().and_then(|e| e.analysis.as_ref())
    }

    pub fn refresh_stable_key(&mut self) {
        self.stable_key = stable_key(self);
    }
}

/// Change-detection fingerprint: id, score, clock, status, stats and trend.
pub fn stable_key(m: &Match) -> String {
    let analysis = m.analysis();
    json!({
        "id": m.event_id,
        "score": m.set_score,
        "time": m.played_seconds,
        "status": m.match_status,
        "stats": analysis.and_then(|a| a.stats.as_ref()),
        "trend": analysis.and_then(|a| a.momentum.as_ref()).map(|mo| &mo.trend),
    })
    .to_string()
}
