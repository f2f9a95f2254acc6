use std::collections::HashMap;

use match_model::{is_empty_value, EnrichedData, Match, TeamForm, TournamentData};
use serde_json::Value;

// Pomalá pole: nový prázdný výsledek (fallback) nesmí přepsat to, co už máme.

fn slow_value(prev: &Option<Value>, incoming: &Option<Value>) -> Option<Value> {
    match incoming {
        Some(v) if !is_empty_value(v) => Some(v.clone()),
        _ => prev.clone().or_else(|| incoming.clone()),
    }
}

fn form_is_empty(f: &TeamForm) -> bool {
    is_empty_value(&f.home) && is_empty_value(&f.away)
}

fn tournament_is_empty(t: &TournamentData) -> bool {
    is_empty_value(&t.season_meta) && is_empty_value(&t.table)
}

fn slow_section<T: Clone>(
    prev: &Option<T>,
    incoming: &Option<T>,
    is_empty: impl Fn(&T) -> bool,
) -> Option<T> {
    match incoming {
        Some(v) if !is_empty(v) => Some(v.clone()),
        _ => prev.clone().or_else(|| incoming.clone()),
    }
}

/// Field-wise merge: incoming wins where present, slow fields fall back to
/// `prev` when incoming is absent or empty, fast fields only when absent.
pub fn merge_enriched(prev: &EnrichedData, incoming: &EnrichedData) -> EnrichedData {
    EnrichedData {
        // slow
        match_info: slow_value(&prev.match_info, &incoming.match_info),
        squads: slow_value(&prev.squads, &incoming.squads),
        odds: slow_value(&prev.odds, &incoming.odds),
        h2h: slow_value(&prev.h2h, &incoming.h2h),
        details: slow_value(&prev.details, &incoming.details),
        phrases: slow_value(&prev.phrases, &incoming.phrases),
        form: slow_section(&prev.form, &incoming.form, form_is_empty),
        tournament: slow_section(&prev.tournament, &incoming.tournament, tournament_is_empty),
        prematch_market_data: slow_value(&prev.prematch_market_data, &incoming.prematch_market_data),
        // fast
        timeline: incoming.timeline.clone().or_else(|| prev.timeline.clone()),
        situation: incoming.situation.clone().or_else(|| prev.situation.clone()),
        analysis: incoming.analysis.clone().or_else(|| prev.analysis.clone()),
    }
}

fn merge_one(prev: &Match, incoming: &Match) -> Match {
    let mut out = incoming.clone();
    out.enriched_data = match (&prev.enriched_data, &incoming.enriched_data) {
        (Some(p), Some(i)) => Some(merge_enriched(p, i)),
        (Some(p), None) => Some(p.clone()),
        (None, i) => i.clone(),
    };
    out.refresh_stable_key();
    out
}

/// Additive merge by `event_id`. Previous order is kept, unseen ids are
/// appended in incoming order, nothing is removed.
pub fn merge(previous: &[Match], incoming: &[Match]) -> Vec<Match> {
    let mut out: Vec<Match> = previous.to_vec();
    let mut index: HashMap<String, usize> = out
        .iter()
        .enumerate()
        .map(|(i, m)| (m.event_id.clone(), i))
        .collect();

    for m in incoming {
        match index.get(&m.event_id) {
            Some(&i) => {
                let merged = merge_one(&out[i], m);
                out[i] = merged;
            }
            None => {
                let mut fresh = m.clone();
                fresh.refresh_stable_key();
                index.insert(fresh.event_id.clone(), out.len());
                out.push(fresh);
            }
        }
    }
    out
}

/// Same ids, same order, same `_stableKey` per id.
pub fn same_fingerprints(a: &[Match], b: &[Match]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.stable_key == y.stable_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_enriched(id: &str, e: EnrichedData) -> Match {
        let mut m = Match::new(id, "Liga", "A", "B");
        m.enriched_data = Some(e);
        m.refresh_stable_key();
        m
    }

    #[test]
    fn empty_fallback_does_not_wipe_slow_field() {
        let prev = EnrichedData {
            h2h: Some(json!({ "matches": [1, 2] })),
            form: Some(TeamForm { home: json!([1]), away: json!([2]) }),
            ..EnrichedData::default()
        };
        let incoming = EnrichedData {
            h2h: Some(json!({})),
            form: Some(TeamForm::default()),
            situation: Some(json!([])),
            ..EnrichedData::default()
        };
        let merged = merge_enriched(&prev, &incoming);
        assert_eq!(merged.h2h, Some(json!({ "matches": [1, 2] })));
        assert_eq!(merged.form, prev.form);
        // rychlé pole bere i prázdnou hodnotu
        assert_eq!(merged.situation, Some(json!([])));
    }

    #[test]
    fn endpoint_fallbacks_do_not_wipe_fetched_data() {
        let details = json!({ "values": { "1029": { "value": { "home": 14, "away": 9 } } } });
        let table = json!({ "tables": [{ "name": "Liga" }] });
        let prev = vec![with_enriched(
            "1",
            EnrichedData {
                details: Some(details.clone()),
                h2h: Some(json!({ "matches": [1] })),
                form: Some(TeamForm { home: json!({ "matches": ["W"] }), away: json!({ "matches": ["L"] }) }),
                tournament: Some(TournamentData { season_meta: json!({ "id": 77 }), table: table.clone() }),
                ..EnrichedData::default()
            },
        )];
        let incoming = with_enriched(
            "1",
            EnrichedData {
                details: Some(json!({ "values": {} })),
                h2h: Some(json!({ "matches": [] })),
                form: Some(TeamForm { home: json!({ "matches": [] }), away: json!({ "matches": [] }) }),
                tournament: Some(TournamentData { season_meta: json!({}), table: json!({ "tables": [] }) }),
                ..EnrichedData::default()
            },
        );

        let merged = merge(&prev, &[incoming]);
        let got = merged[0].enriched_data.as_ref().unwrap();
        assert_eq!(got.details, Some(details));
        assert_eq!(got.h2h, Some(json!({ "matches": [1] })));
        assert_eq!(got.form, prev[0].enriched_data.as_ref().unwrap().form);
        assert_eq!(got.tournament.as_ref().unwrap().table, table);
        assert_eq!(merged[0].stable_key, prev[0].stable_key);
    }

    #[test]
    fn empty_incoming_kept_when_nothing_before() {
        let merged = merge_enriched(
            &EnrichedData::default(),
            &EnrichedData { odds: Some(json!({})), ..EnrichedData::default() },
        );
        assert_eq!(merged.odds, Some(json!({})));
    }

    #[test]
    fn order_is_previous_then_new() {
        let prev = vec![Match::new("1", "L", "A", "B"), Match::new("2", "L", "C", "D")];
        let incoming = vec![Match::new("3", "L", "E", "F"), Match::new("1", "L", "A", "B")];
        let ids: Vec<String> = merge(&prev, &incoming).into_iter().map(|m| m.event_id).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn incoming_without_enrichment_keeps_previous() {
        let prev = vec![with_enriched("1", EnrichedData::stub())];
        let mut update = Match::new("1", "L", "A", "B");
        update.set_score = Some("1:0".into());

        let merged = merge(&prev, &[update]);
        assert_eq!(merged[0].set_score.as_deref(), Some("1:0"));
        assert_eq!(merged[0].enriched_data, Some(EnrichedData::stub()));
        assert_ne!(merged[0].stable_key, prev[0].stable_key);
    }

    #[test]
    fn fingerprints_depend_on_order() {
        let a = vec![Match::new("1", "L", "A", "B"), Match::new("2", "L", "C", "D")];
        let mut b = a.clone();
        assert!(same_fingerprints(&a, &b));
        b.reverse();
        assert!(!same_fingerprints(&a, &b));
        assert!(!same_fingerprints(&a, &a[..1]));
    }
}
