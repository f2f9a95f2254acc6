//! Live-set filter.
//!
//! Simulované ligy poznáváme podle podřetězce v názvu; heuristika může
//! chytit i legitimní soutěž, která ten podřetězec obsahuje.

use match_model::{looks_simulated, Match};

use crate::finished::FinishedSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Simulated,
    NoTournament,
    NotEnriched,
    MissingSections(Vec<&'static str>),
    Finished,
}

/// Why `m` is kept out of the live view, or `None` if it belongs there.
pub fn live_rejection(m: &Match, finished: &FinishedSet) -> Option<Rejection> {
    if looks_simulated(m) {
        return Some(Rejection::Simulated);
    }
    if m.tournament_name.trim().is_empty() {
        return Some(Rejection::NoTournament);
    }
    let Some(enriched) = &m.enriched_data else {
        return Some(Rejection::NotEnriched);
    };
    let missing = enriched.missing_sections();
    if !missing.is_empty() {
        return Some(Rejection::MissingSections(missing));
    }
    if finished.contains(&m.event_id) {
        return Some(Rejection::Finished);
    }
    None
}

pub fn is_live_eligible(m: &Match, finished: &FinishedSet) -> bool {
    live_rejection(m, finished).is_none()
}

pub fn filter_live(matches: &[Match], finished: &FinishedSet) -> Vec<Match> {
    matches
        .iter()
        .filter(|m| is_live_eligible(m, finished))
        .cloned()
        .collect()
}

/// Upcoming nemají enrichment, filtruje se jen simulace a chybějící turnaj.
pub fn filter_upcoming(matches: &[Match]) -> Vec<Match> {
    matches
        .iter()
        .filter(|m| !looks_simulated(m) && !m.tournament_name.trim().is_empty())
        .cloned()
        .collect()
}
