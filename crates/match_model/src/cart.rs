//! Cart — uživatelem vybrané zápasy, uložené lokálně jako JSON.
//!
//! Položka je snapshot v okamžiku přidání a už se nemění.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::Match;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub event_id: String,
    pub added_at: DateTime<Utc>,
    pub snapshot: Match,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => match serde_json::from_str::<Cart>(&contents) {
                Ok(cart) => cart,
                Err(e) => {
                    tracing::warn!("Failed to parse cart {:?}: {}", path.as_ref(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let json = serde_json::to_string_pretty(&self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Returns false if the match is already in the cart (the stored
    /// snapshot is kept as is).
    pub fn add(&mut self, m: &Match) -> bool {
        if self.contains(&m.event_id) {
            return false;
        }
        self.items.push(CartItem {
            event_id: m.event_id.clone(),
            added_at: Utc::now(),
            snapshot: m.clone(),
        });
        true
    }

    pub fn remove(&mut self, event_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.event_id != event_id);
        self.items.len() != before
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.items.iter().any(|i| i.event_id == event_id)
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
