//! SQLite snapshot store.
//!
//! Jedna `kv` tabulka: klíč → JSON hodnota + `expires_at` (unix ms).
//! Expirované řádky se čtou jako neexistující a mažou se líně (při čtení
//! a při otevření DB).

use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use match_model::{FeedError, SnapshotStore};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn store_err(e: impl std::fmt::Display) -> FeedError {
    FeedError::Store(e.to_string())
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        let db_path = Path::new(path);
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let conn = Connection::open(db_path).context("open sqlite db")?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();

        let store = Self::from_connection(conn)?;
        let purged = store.purge_expired()?;
        info!("feed db {} ready ({} expired rows purged)", path, purged);
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory().context("open in-memory db")?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn purge_expired(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let n = conn
            .execute("DELETE FROM kv WHERE expires_at <= ?1", params![now_ms()])
            .context("purge expired")?;
        Ok(n)
    }

    // live-observer počty nepotřebuje
    #[allow(dead_code)]
    pub fn live_rows(&self) -> Result<i64> {
        let conn = self.conn.lock();
        let n = conn
            .query_row(
                "SELECT COUNT(1) FROM kv WHERE expires_at > ?1",
                params![now_ms()],
                |r| r.get(0),
            )
            .context("count rows")?;
        Ok(n)
    }
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            expires_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_kv_expires ON kv(expires_at);
        "#,
    )
    .context("init schema")?;

    Ok(())
}

impl SnapshotStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Value>, FeedError> {
        let conn = self.conn.lock();
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT value_json, expires_at FROM kv WHERE key = ?1",
                params![key],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()
            .map_err(store_err)?;

        let Some((json, expires_at)) = row else {
            return Ok(None);
        };
        if expires_at <= now_ms() {
            debug!("{} expired, purging", key);
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key])
                .map_err(store_err)?;
            return Ok(None);
        }
        serde_json::from_str(&json).map(Some).map_err(store_err)
    }

    fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), FeedError> {
        let json = serde_json::to_string(value).map_err(store_err)?;
        upsert(&self.conn.lock(), key, &json, expires_at(ttl)).map(|_| ()).map_err(store_err)
    }

    /// Celý snapshot v jedné transakci.
    fn set_many(&self, entries: &[(String, Value)], ttl: Duration) -> Result<(), FeedError> {
        let expires = expires_at(ttl);
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(store_err)?;
        for (key, value) in entries {
            let json = serde_json::to_string(value).map_err(store_err)?;
            upsert(&tx, key, &json, expires).map_err(store_err)?;
        }
        tx.commit().map_err(store_err)?;
        debug!("{} rows upserted in one transaction", entries.len());
        Ok(())
    }
}

fn expires_at(ttl: Duration) -> i64 {
    now_ms().saturating_add(ttl.as_millis() as i64)
}

fn upsert(conn: &Connection, key: &str, json: &str, expires_at: i64) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
        INSERT INTO kv(key, value_json, updated_at, expires_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(key) DO UPDATE SET
            value_json=excluded.value_json,
            updated_at=excluded.updated_at,
            expires_at=excluded.expires_at
        "#,
        params![key, json, Utc::now().to_rfc3339(), expires_at],
    )
}
