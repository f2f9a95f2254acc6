use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::FetchError;

/// Stats-provider endpoints used by the enricher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    MatchInfo,
    MatchDetails,
    MatchTimeline,
    MatchTimelineDelta,
    MatchSituation,
    TeamForm,
    HeadToHead,
    MatchSquads,
    MatchOdds,
    MatchPhrases,
    SeasonMeta,
    SeasonTable,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::MatchInfo => "match_info",
            Endpoint::MatchDetails => "match_detailsextended",
            Endpoint::MatchTimeline => "match_timeline",
            Endpoint::MatchTimelineDelta => "match_timelinedelta",
            Endpoint::MatchSituation => "stats_match_situation",
            Endpoint::TeamForm => "stats_team_lastx",
            Endpoint::HeadToHead => "stats_team_versus",
            Endpoint::MatchSquads => "match_squads",
            Endpoint::MatchOdds => "match_bookmakerodds",
            Endpoint::MatchPhrases => "match_phrases",
            Endpoint::SeasonMeta => "stats_season_meta",
            Endpoint::SeasonTable => "stats_season_tables",
        }
    }

    /// Value substituted when the call fails or times out. Shapes mirror an
    /// empty upstream answer so downstream readers need no special case.
    pub fn fallback(&self) -> Value {
        match self {
            Endpoint::MatchDetails => json!({ "values": {} }),
            Endpoint::MatchTimeline | Endpoint::MatchTimelineDelta => json!({ "events": [] }),
            Endpoint::MatchSituation => json!({ "data": [] }),
            Endpoint::TeamForm | Endpoint::HeadToHead => json!({ "matches": [] }),
            Endpoint::MatchPhrases => json!([]),
            Endpoint::SeasonTable => json!({ "tables": [] }),
            Endpoint::MatchInfo
            | Endpoint::MatchSquads
            | Endpoint::MatchOdds
            | Endpoint::SeasonMeta => json!({}),
        }
    }
}

/// One outbound sub-request: target, params, fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsRequest {
    pub endpoint: Endpoint,
    pub id: String,
    pub secondary: Option<String>,
    pub fallback: Value,
}

impl StatsRequest {
    pub fn new(endpoint: Endpoint, id: impl Into<String>) -> Self {
        Self {
            endpoint,
            id: id.into(),
            secondary: None,
            fallback: endpoint.fallback(),
        }
    }

    pub fn with_secondary(mut self, secondary: impl Into<String>) -> Self {
        self.secondary = Some(secondary.into());
        self
    }

    pub fn with_fallback(mut self, fallback: Value) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn label(&self) -> String {
        match &self.secondary {
            Some(s) => format!("{}/{}/{}", self.endpoint.path(), self.id, s),
            None => format!("{}/{}", self.endpoint.path(), self.id),
        }
    }
}

/// Black-box transport to the stats provider.
#[async_trait]
pub trait StatsTransport: Send + Sync {
    async fn fetch(&self, req: &StatsRequest) -> Result<Value, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_label_and_default_fallback() {
        let req = StatsRequest::new(Endpoint::HeadToHead, "10").with_secondary("20");
        assert_eq!(req.label(), "stats_team_versus/10/20");
        assert_eq!(req.fallback, json!({ "matches": [] }));

        let req = StatsRequest::new(Endpoint::MatchInfo, "1").with_fallback(json!(null));
        assert_eq!(req.fallback, Value::Null);
    }
}
