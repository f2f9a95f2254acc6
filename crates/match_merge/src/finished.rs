use std::collections::HashSet;

use match_model::Match;
use tracing::info;

/// Ids zápasů, které dosáhly 90. minuty. Maže se jen explicitně.
#[derive(Debug, Default, Clone)]
pub struct FinishedSet {
    ids: HashSet<String>,
}

impl FinishedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every finished match; returns the ones seen finished for the
    /// first time.
    pub fn observe<'a>(&mut self, matches: &'a [Match]) -> Vec<&'a Match> {
        let mut newly = Vec::new();
        for m in matches.iter().filter(|m| m.is_finished()) {
            if self.ids.insert(m.event_id.clone()) {
                info!(
                    "finished: {} {} vs {} ({})",
                    m.event_id,
                    m.home_team_name,
                    m.away_team_name,
                    m.set_score.as_deref().unwrap_or("-")
                );
                newly.push(m);
            }
        }
        newly
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.ids.contains(event_id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
