/// Live Match Feed — polling observer
///
/// Co dělá:
///   1. Každou sekundu stáhne live zápasy z odds feedu, normalizuje je
///   2. Obohatí je stats daty přes bounded queue (3 requesty v okně)
///   3. Merge s předchozím stavem, detekce ukončených zápasů, live filtr
///   4. Publikuje jen když se set opravdu změnil, snapshot jde do SQLite
///   5. Jednou za minutu upcoming zápasy (bez enrichmentu)
///
/// Spuštění:
///   cargo run --bin live-observer

use anyhow::{Context, Result};
use dotenv::dotenv;
use std::env;
use std::fs::File;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use feed_scheduler::{LiveScheduler, SchedulerControl, UpcomingScheduler};
use logger::EventLogger;
use match_enricher::MatchEnricher;
use match_model::{Cart, SnapshotStore};
use stats_client::{HttpOddsSource, HttpStatsClient, RequestQueue};

mod config;
mod feed_db;

use config::AppConfig;
use feed_db::SqliteStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cfg = AppConfig::from_env();

    info!("=== Live Match Feed — observer ===");
    info!("Odds feed: {}", cfg.odds_feed_url);
    info!("Stats: {}", cfg.stats_base_url);
    info!("Logs: ./logs/");

    // Single instance lock
    let lock_file_path = env::temp_dir().join("live_match_feed_observer.lock");
    let lock_file = match File::create(&lock_file_path) {
        Ok(f) => f,
        Err(e) => {
            warn!("Failed to create lock file at {:?}: {}", lock_file_path, e);
            return Ok(());
        }
    };

    let mut lock = fd_lock::RwLock::new(lock_file);
    let _write_guard = match lock.try_write() {
        Ok(guard) => {
            info!("Acquired single-instance lock.");
            guard
        }
        Err(_) => {
            warn!("Another instance of live-observer is already running! Exiting.");
            return Ok(());
        }
    };

    let store = Arc::new(SqliteStore::open(&cfg.db_path)?);
    let shared_store: Arc<dyn SnapshotStore> = store.clone();

    let stats = Arc::new(HttpStatsClient::new(cfg.stats_base_url.clone())?);
    let queue = RequestQueue::spawn(stats, cfg.queue_config());
    let enricher = Arc::new(MatchEnricher::new(queue, Some(shared_store.clone())));

    let odds = Arc::new(
        HttpOddsSource::new(cfg.odds_feed_url.clone(), cfg.upcoming_feed_url.clone())
            .context("odds feed client")?,
    );

    let mut live = LiveScheduler::new(odds.clone(), enricher, cfg.scheduler_config())
        .with_store(shared_store)
        .with_event_logger(EventLogger::new("logs"));
    let mut upcoming = UpcomingScheduler::new(odds, cfg.scheduler_config())
        .with_event_logger(EventLogger::new("logs"));

    let cart = Cart::load_from(&cfg.cart_path);
    info!("Cart: {} saved matches", cart.len());

    // Summary: loguje jen když se live set změnil
    {
        let mut rx = live.subscribe();
        let cart_path = cfg.cart_path.clone();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snap = rx.borrow_and_update().clone();
                if let Some(err) = &snap.error {
                    warn!("live feed stale ({} matches kept): {}", snap.matches.len(), err);
                    continue;
                }
                // zápasy v košíku, které jsou zrovna live
                let cart = Cart::load_from(&cart_path);
                let watched = snap
                    .matches
                    .iter()
                    .filter(|m| cart.contains(&m.event_id))
                    .count();
                info!(
                    "LIVE cycle {}: {} matches ({} in cart)",
                    snap.cycle,
                    snap.matches.len(),
                    watched
                );
            }
        });
    }

    let (control, control_rx) = watch::channel(SchedulerControl::Run);

    let live_task = {
        let rx = control_rx.clone();
        tokio::spawn(async move { live.run(rx).await })
    };
    let upcoming_task = tokio::spawn(async move { upcoming.run(control_rx).await });

    info!("🚀 READY: live {}ms / upcoming {}ms", cfg.live_poll_interval_ms, cfg.upcoming_poll_interval_ms);

    tokio::signal::ctrl_c().await.context("ctrl-c handler")?;
    info!("Ctrl-C, stopping schedulers…");
    control.send_replace(SchedulerControl::Stop);

    for task in [live_task, upcoming_task] {
        if let Err(e) = task.await {
            warn!("scheduler task ended abnormally: {}", e);
        }
    }

    match store.purge_expired() {
        Ok(n) if n > 0 => info!("purged {} expired snapshot rows", n),
        Ok(_) => {}
        Err(e) => warn!("purge failed: {:#}", e),
    }
    Ok(())
}
