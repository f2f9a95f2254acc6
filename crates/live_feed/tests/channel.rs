//! Push kanál proti mock serveru na 127.0.0.1:0.

mod common;

use serde_json::{json, Value};
use std::time::Duration;

use common::{wait_until, MockFeedServer, Script};
use live_feed::{ConnectionState, LiveFeedClient, LiveFeedConfig};
use logger::EventLogger;

fn fast_config(url: String) -> LiveFeedConfig {
    let mut config = LiveFeedConfig::new(url);
    config.heartbeat_interval = Duration::from_millis(50);
    config.client_timeout = Duration::from_millis(400);
    config.backoff_base = Duration::from_millis(10);
    config.max_backoff = Duration::from_millis(100);
    config
}

fn push(id: &str, home_goals: u32) -> Value {
    json!({
        "eventId": id,
        "coreData": { "teams": { "home": { "name": "Sparta" }, "away": { "name": "Slavia" } } },
        "matchInfo": { "tournament": { "name": "Fortuna Liga" } },
        "statistics": { "score": { "home": home_goals, "away": 0 } },
    })
}

#[tokio::test]
async fn subscribes_and_publishes_pushed_matches() {
    let server = MockFeedServer::start(Script {
        on_subscribe: vec![vec![
            json!({ "type": "subscribed", "clientId": "client-1" }),
            json!({ "type": "matches", "payload": [push("sr:match:1", 0), push("sr:match:2", 0)] }),
            json!({ "type": "matches", "payload": { "matches": [push("sr:match:1", 1)] } }),
        ]],
        ack_heartbeats: true,
    })
    .await;
    let logs = tempfile::tempdir().unwrap();

    let handle = LiveFeedClient::new(fast_config(server.ws_url()), "client-1")
        .with_event_logger(EventLogger::new(logs.path()))
        .spawn();

    wait_until("two matches with updated score", || {
        let m = handle.matches();
        m.len() == 2 && m[0].set_score.as_deref() == Some("1:0")
    })
    .await;
    assert_eq!(handle.state(), ConnectionState::Connected);

    let subs = server.received_of("subscribe");
    assert_eq!(subs, vec![json!({ "type": "subscribe", "clientId": "client-1" })]);

    handle.stop().await;
    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let log = std::fs::read_to_string(logs.path().join(format!("{today}.jsonl"))).unwrap();
    assert!(log.contains("\"FEED_CONNECTION\""));
    assert!(log.contains("\"connected\""));
}

#[tokio::test]
async fn acknowledged_heartbeats_keep_the_connection() {
    let server = MockFeedServer::start(Script {
        ack_heartbeats: true,
        ..Script::default()
    })
    .await;
    let handle = LiveFeedClient::new(fast_config(server.ws_url()), "hb").spawn();

    wait_until("connected", || handle.state() == ConnectionState::Connected).await;
    tokio::time::sleep(Duration::from_millis(900)).await;

    assert_eq!(server.connections(), 1);
    assert!(server.received_of("heartbeat").len() >= 5);
    assert!(server.received_of("heartbeat").iter().all(|m| m["clientId"] == "hb"));
    assert_eq!(handle.state(), ConnectionState::Connected);
    handle.stop().await;
}

#[tokio::test]
async fn missing_heartbeat_ack_forces_reconnect() {
    let server = MockFeedServer::start(Script::default()).await;
    let handle = LiveFeedClient::new(fast_config(server.ws_url()), "silent").spawn();

    wait_until("second subscribe", || server.received_of("subscribe").len() >= 2).await;
    assert!(server.received_of("heartbeatAck").is_empty());
    handle.stop().await;
}

#[tokio::test]
async fn force_reconnect_message_reconnects() {
    let server = MockFeedServer::start(Script {
        on_subscribe: vec![vec![json!({ "type": "forceReconnect", "reason": "rebalance" })]],
        ack_heartbeats: true,
    })
    .await;
    let handle = LiveFeedClient::new(fast_config(server.ws_url()), "fr").spawn();

    wait_until("reconnected", || {
        server.connections() == 2 && handle.state() == ConnectionState::Connected
    })
    .await;
    handle.stop().await;
}

#[tokio::test]
async fn pause_unsubscribes_and_resume_reconnects() {
    let server = MockFeedServer::start(Script {
        ack_heartbeats: true,
        ..Script::default()
    })
    .await;
    let handle = LiveFeedClient::new(fast_config(server.ws_url()), "pausable").spawn();
    wait_until("connected", || handle.state() == ConnectionState::Connected).await;

    handle.pause();
    wait_until("unsubscribe", || !server.received_of("unsubscribe").is_empty()).await;
    wait_until("disconnected", || handle.state() == ConnectionState::Disconnected).await;

    // žádný auto-reconnect během pauzy
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.connections(), 1);

    handle.resume();
    wait_until("resumed", || {
        server.connections() == 2 && handle.state() == ConnectionState::Connected
    })
    .await;
    handle.stop().await;
}

#[tokio::test]
async fn unreachable_server_gives_up_after_max_attempts() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let mut config = fast_config(format!("ws://{addr}"));
    config.max_attempts = 2;
    let logs = tempfile::tempdir().unwrap();
    let log_path = logs
        .path()
        .join(format!("{}.jsonl", chrono::Utc::now().format("%Y-%m-%d")));

    let handle = LiveFeedClient::new(config, "nobody")
        .with_event_logger(EventLogger::new(logs.path()))
        .spawn();

    wait_until("give up", || {
        std::fs::read_to_string(&log_path)
            .map(|log| log.contains("gave up"))
            .unwrap_or(false)
    })
    .await;
    assert_eq!(handle.state(), ConnectionState::Disconnected);

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("\"reconnecting\""));
    handle.stop().await;
}
