//! Identifier validation for the outer HTTP surface.
//!
//! Kanonické názvy jsou `matchId` a `teamId`. Starší klienti posílají
//! `id` resp. `uid`; bereme je, ale když se kanonický a starý název
//! rozcházejí, je to 400.

use std::collections::HashMap;

use crate::error::FeedError;
use crate::types::strip_provider_prefix;

pub const MATCH_ID: (&str, &str) = ("matchId", "id");
pub const TEAM_ID: (&str, &str) = ("teamId", "uid");

/// Resolve a numeric identifier from `canonical`, falling back to `legacy`.
pub fn resolve_id(
    params: &HashMap<String, String>,
    (canonical, legacy): (&str, &str),
) -> Result<String, FeedError> {
    let pick = |name: &str| {
        params
            .get(name)
            .map(|v| strip_provider_prefix(v.trim()).to_string())
            .filter(|v| !v.is_empty())
    };

    let value = match (pick(canonical), pick(legacy)) {
        (Some(a), Some(b)) if a != b => {
            return Err(FeedError::bad_request(format!(
                "conflicting {canonical}={a} and {legacy}={b}"
            )))
        }
        (Some(a), _) => a,
        (None, Some(b)) => b,
        (None, None) => {
            return Err(FeedError::bad_request(format!("missing {canonical}")));
        }
    };

    if !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(FeedError::bad_request(format!(
            "{canonical} must be numeric, got '{value}'"
        )));
    }
    Ok(value)
}

pub fn require_match_id(params: &HashMap<String, String>) -> Result<String, FeedError> {
    resolve_id(params, MATCH_ID)
}

pub fn require_team_id(params: &HashMap<String, String>) -> Result<String, FeedError> {
    resolve_id(params, TEAM_ID)
}
