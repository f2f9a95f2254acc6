//! Trvalé client id pro push kanál.
//!
//! Uložené jako JSON `{ "id": "...", "createdAt": "..." }`. Po 24 h (nebo
//! když soubor chybí či je poškozený) se vygeneruje nové.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

pub const CLIENT_ID_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIdentity {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

impl ClientIdentity {
    pub fn generate() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at >= Duration::hours(CLIENT_ID_TTL_HOURS)
    }

    /// Reuse the stored id while it is younger than 24 h, otherwise
    /// generate and store a fresh one.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if let Some(existing) = Self::load(path) {
            if !existing.is_expired_at(Utc::now()) {
                debug!("reusing client id {}", existing.id);
                return Ok(existing);
            }
            info!("client id {} expired, rotating", existing.id);
        }

        let fresh = Self::generate();
        fresh.save(path)?;
        info!("new client id {}", fresh.id);
        Ok(fresh)
    }

    fn load(path: &Path) -> Option<Self> {
        let raw = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&raw).ok()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create {}", dir.display()))?;
        }
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reused_until_expired() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client_id.json");

        let first = ClientIdentity::load_or_create(&path).unwrap();
        let second = ClientIdentity::load_or_create(&path).unwrap();
        assert_eq!(first, second);
        assert!(Uuid::parse_str(&first.id).is_ok());

        let stale = ClientIdentity {
            id: first.id.clone(),
            created_at: Utc::now() - Duration::hours(25),
        };
        stale.save(&path).unwrap();
        let rotated = ClientIdentity::load_or_create(&path).unwrap();
        assert_ne!(rotated.id, first.id);
    }

    #[test]
    fn corrupt_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("client_id.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();

        let id = ClientIdentity::load_or_create(&path).unwrap();
        let stored: ClientIdentity =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored, id);
    }
}
