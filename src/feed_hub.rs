//! feed-hub — live set z push kanálu + read-only HTTP nad ním
//!
//! Cíl: držet WS spojení na live feed (subscribe, heartbeat, reconnect) a
//! vystavit aktuální stav, on-demand stats a uložené snapshoty přes HTTP.
//!
//! Spuštění:
//!   $env:LIVE_FEED_URL="ws://10.0.0.5:3000/live"; cargo run --bin feed-hub
//!
//! HTTP (FEED_HTTP_BIND, default 127.0.0.1:8081):
//!   GET    /health
//!   GET    /live
//!   GET    /stats?matchId=12345
//!   GET    /snapshot?date=2024-05-01
//!   GET    /cart
//!   POST   /cart?matchId=12345     (jen zápas, který je právě live)
//!   DELETE /cart?matchId=12345

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use dotenv::dotenv;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use live_feed::{ClientIdentity, ConnectionState, LiveFeedClient};
use logger::{now_iso, ApiStatusEvent, EventLogger};
use match_model::params::require_match_id;
use match_model::{load_snapshot, Cart, FeedError, Match};
use stats_client::{fetch_with_retry, Endpoint, FetchOutcome, HttpStatsClient, RetryConfig, StatsRequest};

mod config;
mod feed_db;

use config::AppConfig;
use feed_db::SqliteStore;

#[derive(Clone)]
struct FeedHubState {
    client_id: String,
    started: DateTime<Utc>,
    feed_state: watch::Receiver<ConnectionState>,
    live: watch::Receiver<Arc<Vec<Match>>>,
    stats: Arc<HttpStatsClient>,
    store: Arc<SqliteStore>,
    cart: Arc<Mutex<Cart>>,
    cart_path: PathBuf,
    logger: Arc<EventLogger>,
}

#[derive(Serialize, Debug)]
struct HealthSnapshot {
    status: &'static str,
    client_id: String,
    feed: ConnectionState,
    live_matches: usize,
    cart_items: usize,
    uptime_secs: i64,
}

struct HttpResponse {
    status: u16,
    body: String,
}

impl HttpResponse {
    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        let body = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
        Self { status, body }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, &json!({ "error": message.into() }))
    }

    fn from_feed_error(e: &FeedError) -> Self {
        Self::error(e.status(), e.to_string())
    }

    fn status_line(&self) -> &'static str {
        match self.status {
            200 => "HTTP/1.1 200 OK",
            201 => "HTTP/1.1 201 Created",
            304 => "HTTP/1.1 304 Not Modified",
            400 => "HTTP/1.1 400 Bad Request",
            404 => "HTTP/1.1 404 Not Found",
            405 => "HTTP/1.1 405 Method Not Allowed",
            502 => "HTTP/1.1 502 Bad Gateway",
            _ => "HTTP/1.1 500 Internal Server Error",
        }
    }
}

// ── Request parsing ──────────────────────────────────────────────────────────

/// `a=1&b=2` → map; bez percent-decodingu, id a data ho nepotřebují.
fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

fn split_target(target: &str) -> (&str, HashMap<String, String>) {
    match target.split_once('?') {
        Some((path, query)) => (path, parse_query(query)),
        None => (target, HashMap::new()),
    }
}

fn parse_date(params: &HashMap<String, String>) -> Result<String, FeedError> {
    let raw = params
        .get("date")
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .ok_or_else(|| FeedError::bad_request("missing date"))?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| FeedError::bad_request(format!("date must be YYYY-MM-DD, got '{raw}'")))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

fn health(state: &FeedHubState) -> HttpResponse {
    HttpResponse::json(
        200,
        &HealthSnapshot {
            status: "ok",
            client_id: state.client_id.clone(),
            feed: *state.feed_state.borrow(),
            live_matches: state.live.borrow().len(),
            cart_items: state.cart.lock().len(),
            uptime_secs: (Utc::now() - state.started).num_seconds(),
        },
    )
}

async fn stats(state: &FeedHubState, params: &HashMap<String, String>) -> HttpResponse {
    let id = match require_match_id(params) {
        Ok(id) => id,
        Err(e) => return HttpResponse::from_feed_error(&e),
    };

    let req = StatsRequest::new(Endpoint::MatchDetails, id.clone());
    let client: &HttpStatsClient = &state.stats;
    let req_ref = &req;
    let result = fetch_with_retry(&format!("stats {}", req.label()), &RetryConfig::stats(), move || {
        client.fetch_conditional(req_ref)
    })
    .await;

    match result {
        Ok(FetchOutcome::Fresh(body)) => HttpResponse::json(200, &body),
        Ok(FetchOutcome::Unchanged) => HttpResponse {
            status: 304,
            body: String::new(),
        },
        Err(e) => {
            let _ = state.logger.log(&ApiStatusEvent {
                ts: now_iso(),
                event: "API_STATUS",
                source: format!("stats:{}", Endpoint::MatchDetails.path()),
                ok: false,
                status_code: None,
                message: e.to_string(),
            });
            HttpResponse::from_feed_error(&FeedError::Upstream(e.to_string()))
        }
    }
}

fn snapshot(state: &FeedHubState, params: &HashMap<String, String>) -> HttpResponse {
    let date = match parse_date(params) {
        Ok(d) => d,
        Err(e) => return HttpResponse::from_feed_error(&e),
    };
    match load_snapshot(state.store.as_ref(), &date) {
        Ok(matches) => HttpResponse::json(200, &json!({ "date": date, "matches": matches })),
        Err(e) => HttpResponse::from_feed_error(&e),
    }
}

fn cart_add(state: &FeedHubState, params: &HashMap<String, String>) -> HttpResponse {
    let id = match require_match_id(params) {
        Ok(id) => id,
        Err(e) => return HttpResponse::from_feed_error(&e),
    };
    let live = state.live.borrow().clone();
    let Some(m) = live.iter().find(|m| m.numeric_id() == id) else {
        return HttpResponse::error(404, format!("match {id} is not live"));
    };

    let mut cart = state.cart.lock();
    let added = cart.add(m);
    if added {
        if let Err(e) = cart.save_to(&state.cart_path) {
            warn!("cart save failed: {:#}", e);
        }
    }
    HttpResponse::json(if added { 201 } else { 200 }, &json!({ "added": added, "items": cart.len() }))
}

fn cart_remove(state: &FeedHubState, params: &HashMap<String, String>) -> HttpResponse {
    let id = match require_match_id(params) {
        Ok(id) => id,
        Err(e) => return HttpResponse::from_feed_error(&e),
    };
    let mut cart = state.cart.lock();
    let event_id = cart
        .items()
        .iter()
        .find(|i| i.snapshot.numeric_id() == id)
        .map(|i| i.event_id.clone());
    let removed = event_id.map(|eid| cart.remove(&eid)).unwrap_or(false);
    if removed {
        if let Err(e) = cart.save_to(&state.cart_path) {
            warn!("cart save failed: {:#}", e);
        }
    }
    HttpResponse::json(200, &json!({ "removed": removed, "items": cart.len() }))
}

async fn route(state: &FeedHubState, method: &str, target: &str) -> HttpResponse {
    let (path, params) = split_target(target);
    match (method, path) {
        ("GET", "/health") => health(state),
        ("GET", "/live") => {
            let live = state.live.borrow().clone();
            HttpResponse::json(200, live.as_ref())
        }
        ("GET", "/stats") => stats(state, &params).await,
        ("GET", "/snapshot") => snapshot(state, &params),
        ("GET", "/cart") => {
            let items = state.cart.lock().items().to_vec();
            HttpResponse::json(200, &items)
        }
        ("POST", "/cart") => cart_add(state, &params),
        ("DELETE", "/cart") => cart_remove(state, &params),
        (_, "/health" | "/live" | "/stats" | "/snapshot" | "/cart") => {
            HttpResponse::error(405, "method not allowed")
        }
        _ => HttpResponse::error(404, "not found"),
    }
}

// ── HTTP server ──────────────────────────────────────────────────────────────

async fn start_http_server(state: FeedHubState, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr).await.context("http bind failed")?;
    info!("feed-hub HTTP on http://{}/live", addr);

    loop {
        let (stream, peer) = listener.accept().await.context("http accept")?;
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_http_connection(stream, state).await {
                debug!("http handler err {}: {}", peer, e);
            }
        });
    }
}

async fn handle_http_connection(mut stream: TcpStream, state: FeedHubState) -> Result<()> {
    let mut buf = vec![0u8; 8192];
    let n = stream.read(&mut buf).await.context("http read")?;
    if n == 0 {
        return Ok(());
    }

    let req = String::from_utf8_lossy(&buf[..n]);
    let first_line = req.lines().next().unwrap_or_default();
    let mut parts = first_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("");

    let response = route(&state, method, target).await;
    debug!("{} {} → {}", method, target, response.status);

    let content_type = "application/json; charset=utf-8";
    let resp = format!(
        "{}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status_line(),
        response.body.len(),
        response.body
    );
    stream.write_all(resp.as_bytes()).await.context("http write")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = AppConfig::from_env();
    let identity = ClientIdentity::load_or_create(&cfg.client_id_path).context("client id")?;
    info!("feed-hub client id {} (since {})", identity.id, identity.created_at);

    let feed = LiveFeedClient::new(cfg.live_feed_config(), identity.id.clone())
        .with_event_logger(EventLogger::new("logs"))
        .spawn();

    let db_path = cfg.db_path.clone();
    info!("feed-hub DB: {}", db_path);

    let state = FeedHubState {
        client_id: identity.id,
        started: Utc::now(),
        feed_state: feed.subscribe_state(),
        live: feed.subscribe_matches(),
        stats: Arc::new(HttpStatsClient::new(cfg.stats_base_url.clone())?),
        store: Arc::new(SqliteStore::open(&db_path)?),
        cart: Arc::new(Mutex::new(Cart::load_from(&cfg.cart_path))),
        cart_path: cfg.cart_path.clone(),
        logger: Arc::new(EventLogger::new("logs")),
    };

    {
        let http_addr: SocketAddr = cfg.http_bind.parse().context("Invalid FEED_HTTP_BIND")?;
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = start_http_server(state, http_addr).await {
                warn!("http server stopped: {e}");
            }
        });
    }

    // Heartbeat summary
    {
        let state = state.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(10)).await;
                let feed_state = *state.feed_state.borrow();
                let live_items = state.live.borrow().len();
                let cart_items = state.cart.lock().len();
                let db_rows = state.store.live_rows().unwrap_or(-1);
                info!(
                    "HB: feed={}, live={}, cart={}, db_rows={}",
                    feed_state.as_str(),
                    live_items,
                    cart_items,
                    db_rows
                );
            }
        });
    }

    tokio::signal::ctrl_c().await.context("ctrl-c handler")?;
    info!("Ctrl-C, unsubscribing…");
    feed.stop().await;
    Ok(())
}
