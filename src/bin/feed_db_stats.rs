use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

fn main() -> Result<()> {
    let db_path = std::env::var("FEED_DB_PATH").unwrap_or_else(|_| "data/feed.db".to_string());
    let conn = Connection::open(&db_path).with_context(|| format!("open db at {db_path}"))?;
    let now_ms = chrono::Utc::now().timestamp_millis();

    println!("db_path={db_path}");
    for (label, prefix) in [("matches", "match:%"), ("day_indexes", "date:%"), ("prematch", "prematch:%")] {
        let (live, expired): (i64, i64) = conn
            .query_row(
                "SELECT COALESCE(SUM(expires_at > ?2), 0), COALESCE(SUM(expires_at <= ?2), 0) FROM kv WHERE key LIKE ?1",
                rusqlite::params![prefix, now_ms],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .with_context(|| format!("count {label}"))?;
        println!("{label}: {live} (expired, not yet purged: {expired})");
    }

    let days: Vec<String> = conn
        .prepare("SELECT substr(key, 6) FROM kv WHERE key LIKE 'date:%' AND expires_at > ?1 ORDER BY key")?
        .query_map([now_ms], |r| r.get(0))?
        .collect::<rusqlite::Result<_>>()
        .context("list days")?;
    println!("days: {}", if days.is_empty() { "<none>".to_string() } else { days.join(", ") });

    let last_write: Option<(String, String)> = conn
        .query_row(
            "SELECT key, updated_at FROM kv ORDER BY updated_at DESC LIMIT 1",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
        .context("read last write")?;

    if let Some((key, ts)) = last_write {
        println!("last_write: ts={ts} key={key}");
    } else {
        println!("last_write: <none>");
    }

    Ok(())
}
