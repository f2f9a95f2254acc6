//! Prediction Engine — odvozená analytika živého zápasu
//! Heuristika místo AI/ML: statistiky z details, momentum ze situace,
//! vážená pravděpodobnost gólu a doporučení s důvody.
//!
//! Všechno je čisté a deterministické, žádné I/O.

use match_model::{
    value_f64, Analysis, Cards, EnrichedData, GoalProbability, MatchStats, Momentum,
    Recommendation, RecommendationType, Shots, SidePair, TrendPoint,
};
use serde_json::Value;

/// Číselné kódy v `details.values`.
pub mod codes {
    pub const POSSESSION: &str = "110";
    pub const ATTACKS: &str = "1126";
    pub const DANGEROUS: &str = "1029";
    pub const SHOTS_ON: &str = "125";
    pub const SHOTS_OFF: &str = "126";
    pub const CORNERS: &str = "124";
    pub const YELLOW: &str = "40";
    pub const RED: &str = "50";
}

/// Momentum bere posledních N záznamů situace.
pub const MOMENTUM_WINDOW: usize = 5;
pub const DEFAULT_THRESHOLD: f64 = 65.0;

// Váhy pravděpodobnosti gólu
const W_MOMENTUM: f64 = 0.30;
const W_ATTACKS: f64 = 0.20;
const W_DANGEROUS: f64 = 0.25;
const W_POSSESSION: f64 = 0.15;
const W_SHOTS: f64 = 0.10;

// ── Stats ────────────────────────────────────────────────────────────────────

fn values_map(details: &Value) -> Option<&serde_json::Map<String, Value>> {
    details.get("values").and_then(Value::as_object)
}

fn side_value(values: &serde_json::Map<String, Value>, code: &str, side: &str) -> Option<f64> {
    values.get(code)?.get("value")?.get(side).and_then(value_f64)
}

fn count(v: Option<f64>) -> u32 {
    v.map_or(0, |x| x.max(0.0).round() as u32)
}

fn pair(values: &serde_json::Map<String, Value>, code: &str) -> SidePair<u32> {
    SidePair::new(
        count(side_value(values, code, "home")),
        count(side_value(values, code, "away")),
    )
}

/// Possession bez dat = 50/50, ne 0/0.
fn possession(details: &Value) -> SidePair<u32> {
    let Some(values) = values_map(details) else {
        return SidePair::new(50, 50);
    };
    match (
        side_value(values, codes::POSSESSION, "home"),
        side_value(values, codes::POSSESSION, "away"),
    ) {
        (None, None) => SidePair::new(50, 50),
        (h, a) => SidePair::new(count(h), count(a)),
    }
}

/// Extract home/away counters from a `details` payload. Missing codes read as 0.
pub fn extract_stats(details: &Value) -> MatchStats {
    let empty = serde_json::Map::new();
    let values = values_map(details).unwrap_or(&empty);

    MatchStats {
        attacks: pair(values, codes::ATTACKS),
        dangerous: pair(values, codes::DANGEROUS),
        possession: possession(details),
        shots: Shots {
            on_target: pair(values, codes::SHOTS_ON),
            off_target: pair(values, codes::SHOTS_OFF),
        },
        corners: pair(values, codes::CORNERS),
        cards: Cards {
            yellow: pair(values, codes::YELLOW),
            red: pair(values, codes::RED),
        },
    }
}

// ── Momentum ─────────────────────────────────────────────────────────────────

/// Situation přichází buď jako pole, nebo jako `{"data": [...]}`.
fn situation_entries(situation: &Value) -> &[Value] {
    match situation {
        Value::Array(a) => a,
        other => other
            .get("data")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
    }
}

fn intensity(entry: &Value, side: &str) -> f64 {
    let field = |name: &str| {
        entry
            .get(side)
            .and_then(|s| s.get(name))
            .and_then(value_f64)
            .unwrap_or(0.0)
    };
    field("dangerous") * 2.0 + field("attack")
}

pub fn compute_momentum(situation: &Value, timeline: &Value, details: &Value) -> Momentum {
    let entries = situation_entries(situation);

    let trend: Vec<TrendPoint> = entries
        .iter()
        .map(|e| TrendPoint {
            minute: count(e.get("time").and_then(value_f64)),
            home: intensity(e, "home"),
            away: intensity(e, "away"),
        })
        .collect();

    let recent = trend
        .iter()
        .skip(trend.len().saturating_sub(MOMENTUM_WINDOW))
        .fold(SidePair::new(0.0, 0.0), |acc, p| {
            SidePair::new(acc.home + p.home, acc.away + p.away)
        });

    Momentum {
        recent,
        trend,
        timeline: timeline.clone(),
        possession: possession(details),
    }
}

// ── Goal probability ─────────────────────────────────────────────────────────

fn side_probability(
    momentum: f64,
    attacks: u32,
    dangerous: u32,
    possession: u32,
    on_target: u32,
    off_target: u32,
) -> f64 {
    let shots = (on_target as f64 * 2.0 + off_target as f64) / 3.0;
    let raw = momentum * W_MOMENTUM
        + (attacks as f64 / 2.0) * W_ATTACKS
        + dangerous as f64 * W_DANGEROUS
        + possession as f64 * W_POSSESSION
        + shots * W_SHOTS;
    raw.clamp(0.0, 100.0)
}

/// Home and away are computed independently; they need not sum to 100.
pub fn goal_probability(momentum: &Momentum, stats: &MatchStats) -> GoalProbability {
    SidePair::new(
        side_probability(
            momentum.recent.home,
            stats.attacks.home,
            stats.dangerous.home,
            stats.possession.home,
            stats.shots.on_target.home,
            stats.shots.off_target.home,
        ),
        side_probability(
            momentum.recent.away,
            stats.attacks.away,
            stats.dangerous.away,
            stats.possession.away,
            stats.shots.on_target.away,
            stats.shots.off_target.away,
        ),
    )
}

// ── Recommendation ───────────────────────────────────────────────────────────

fn attacking_reasons(
    side: &str,
    own: impl Fn(&SidePair<u32>) -> u32,
    other: impl Fn(&SidePair<u32>) -> u32,
    stats: &MatchStats,
    momentum: Option<(f64, f64)>,
) -> Vec<String> {
    let mut reasons = Vec::new();
    if own(&stats.dangerous) as f64 > other(&stats.dangerous) as f64 * 1.5 {
        reasons.push(format!("{side} team dominating dangerous attacks"));
    }
    if own(&stats.possession) > 60 {
        reasons.push(format!("{side} team controlling possession"));
    }
    if own(&stats.shots.on_target) as f64 > other(&stats.shots.on_target) as f64 * 2.0 {
        reasons.push(format!("{side} team has more shots on target"));
    }
    if let Some((mine, theirs)) = momentum {
        if mine > theirs {
            reasons.push(format!("{side} team has stronger recent momentum"));
        }
    }
    reasons
}

fn quiet_reasons(stats: &MatchStats) -> Vec<String> {
    let mut reasons = Vec::new();
    if stats.dangerous.home + stats.dangerous.away < 20 {
        reasons.push("Low attacking intensity".to_string());
    }
    if stats.possession.home.abs_diff(stats.possession.away) <= 10 {
        reasons.push("Balanced possession".to_string());
    }
    if stats.shots.on_target.home + stats.shots.on_target.away < 3 {
        reasons.push("Few shots on target".to_string());
    }
    reasons
}

pub struct PredictionEngine {
    threshold: f64,
}

impl Default for PredictionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionEngine {
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_threshold(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn recommend(
        &self,
        probability: Option<&GoalProbability>,
        stats: Option<&MatchStats>,
        momentum: Option<&Momentum>,
    ) -> Recommendation {
        let (Some(p), Some(stats)) = (probability, stats) else {
            return Recommendation::unavailable();
        };

        if p.home > self.threshold {
            return Recommendation {
                kind: RecommendationType::HomeGoal,
                confidence: p.home.round() as u32,
                reasons: attacking_reasons(
                    "Home",
                    |s| s.home,
                    |s| s.away,
                    stats,
                    momentum.map(|m| (m.recent.home, m.recent.away)),
                ),
            };
        }
        if p.away > self.threshold {
            return Recommendation {
                kind: RecommendationType::AwayGoal,
                confidence: p.away.round() as u32,
                reasons: attacking_reasons(
                    "Away",
                    |s| s.away,
                    |s| s.home,
                    stats,
                    momentum.map(|m| (m.recent.away, m.recent.home)),
                ),
            };
        }

        let top = p.home.max(p.away);
        Recommendation {
            kind: RecommendationType::NoGoal,
            confidence: ((100.0 - top) * 0.8).round().max(0.0) as u32,
            reasons: quiet_reasons(stats),
        }
    }

    /// Analysis z posledních details/situation/timeline. Chybějící details
    /// nebo situation = žádná predikce.
    pub fn analyze(&self, enriched: &EnrichedData) -> Analysis {
        let timeline = enriched
            .timeline
            .as_ref()
            .map(|t| t.complete.clone())
            .unwrap_or(Value::Null);

        let stats = enriched.details.as_ref().map(extract_stats);
        let momentum = match (&enriched.situation, &enriched.details) {
            (Some(situation), details) => Some(compute_momentum(
                situation,
                &timeline,
                details.as_ref().unwrap_or(&Value::Null),
            )),
            (None, _) => None,
        };
        let goal_probability = match (&momentum, &stats) {
            (Some(m), Some(s)) => Some(goal_probability(m, s)),
            _ => None,
        };
        let recommendation =
            self.recommend(goal_probability.as_ref(), stats.as_ref(), momentum.as_ref());

        Analysis {
            momentum,
            stats,
            goal_probability,
            recommendation,
        }
    }
}
