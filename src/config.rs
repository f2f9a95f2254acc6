//! Konfigurace binárek z env (po `dotenv().ok()`), každá hodnota má default.
//! Sdílené oběma binárkami, ne každá používá všechno.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use feed_scheduler::SchedulerConfig;
use live_feed::LiveFeedConfig;
use stats_client::QueueConfig;

// Pole čtou jen buildery a binárka, která je potřebuje.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub odds_feed_url: String,
    pub upcoming_feed_url: String,
    pub stats_base_url: String,

    pub live_poll_interval_ms: u64,
    pub upcoming_poll_interval_ms: u64,

    pub queue_window_size: usize,
    pub queue_timeout_ms: u64,
    pub queue_pause_ms: u64,

    pub live_feed_url: String,
    pub live_feed_heartbeat_ms: u64,
    pub live_feed_client_timeout_ms: u64,
    pub live_feed_max_backoff_ms: u64,
    pub live_feed_max_attempts: u32,

    pub db_path: String,
    pub http_bind: String,
    pub client_id_path: PathBuf,
    pub cart_path: PathBuf,
    pub snapshot_ttl_secs: u64,
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_num<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            odds_feed_url: env_string("ODDS_FEED_URL", "http://127.0.0.1:3000/api/live"),
            upcoming_feed_url: env_string("UPCOMING_FEED_URL", "http://127.0.0.1:3000/api/upcoming"),
            stats_base_url: env_string("STATS_BASE_URL", "http://127.0.0.1:3000/stats"),

            live_poll_interval_ms: env_num("LIVE_POLL_INTERVAL_MS", 1000),
            upcoming_poll_interval_ms: env_num("UPCOMING_POLL_INTERVAL_MS", 60_000),

            queue_window_size: env_num("QUEUE_WINDOW_SIZE", 3),
            queue_timeout_ms: env_num("QUEUE_TIMEOUT_MS", 3000),
            queue_pause_ms: env_num("QUEUE_PAUSE_MS", 100),

            live_feed_url: env_string("LIVE_FEED_URL", "ws://127.0.0.1:3000/live"),
            live_feed_heartbeat_ms: env_num("LIVE_FEED_HEARTBEAT_MS", 5000),
            live_feed_client_timeout_ms: env_num("LIVE_FEED_CLIENT_TIMEOUT_MS", 45_000),
            live_feed_max_backoff_ms: env_num("LIVE_FEED_MAX_BACKOFF_MS", 30_000),
            live_feed_max_attempts: env_num("LIVE_FEED_MAX_ATTEMPTS", 10),

            db_path: env_string("FEED_DB_PATH", "data/feed.db"),
            http_bind: env_string("FEED_HTTP_BIND", "127.0.0.1:8081"),
            client_id_path: PathBuf::from(env_string("CLIENT_ID_PATH", "data/client_id.json")),
            cart_path: PathBuf::from(env_string("CART_PATH", "data/cart.json")),
            snapshot_ttl_secs: env_num("SNAPSHOT_TTL_SECS", 48 * 3600),
        }
    }

    // jen live-observer
    #[allow(dead_code)]
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            window_size: self.queue_window_size.max(1),
            request_timeout: Duration::from_millis(self.queue_timeout_ms),
            window_pause: Duration::from_millis(self.queue_pause_ms),
        }
    }

    #[allow(dead_code)]
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            live_interval: Duration::from_millis(self.live_poll_interval_ms.max(1)),
            upcoming_interval: Duration::from_millis(self.upcoming_poll_interval_ms.max(1)),
            snapshot_ttl: self.snapshot_ttl(),
            ..SchedulerConfig::default()
        }
    }

    // jen feed-hub
    #[allow(dead_code)]
    pub fn live_feed_config(&self) -> LiveFeedConfig {
        let mut config = LiveFeedConfig::new(self.live_feed_url.clone());
        config.heartbeat_interval = Duration::from_millis(self.live_feed_heartbeat_ms.max(1));
        config.client_timeout = Duration::from_millis(self.live_feed_client_timeout_ms);
        config.max_backoff = Duration::from_millis(self.live_feed_max_backoff_ms);
        config.max_attempts = self.live_feed_max_attempts;
        config
    }

    pub fn snapshot_ttl(&self) -> Duration {
        Duration::from_secs(self.snapshot_ttl_secs)
    }
}
