//! Mock push server pro integrační testy live_feed.

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::time::{sleep, Instant};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Clone, Default)]
pub struct Script {
    /// Messages sent after `subscribe`, per connection index.
    pub on_subscribe: Vec<Vec<Value>>,
    pub ack_heartbeats: bool,
}

pub struct MockFeedServer {
    pub addr: SocketAddr,
    pub received: Arc<Mutex<Vec<Value>>>,
    connections: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
}

impl MockFeedServer {
    pub async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(Notify::new());

        let (rx, conns, stop) = (received.clone(), connections.clone(), shutdown.clone());
        let script = Arc::new(script);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { break };
                        let (rx, conns, stop, script) =
                            (rx.clone(), conns.clone(), stop.clone(), script.clone());
                        tokio::spawn(async move {
                            handle_connection(stream, script, rx, conns, stop).await;
                        });
                    }
                    _ = stop.notified() => break,
                }
            }
        });

        Self {
            addr,
            received,
            connections,
            shutdown,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn received_of(&self, kind: &str) -> Vec<Value> {
        self.received
            .lock()
            .iter()
            .filter(|m| m["type"] == kind)
            .cloned()
            .collect()
    }
}

impl Drop for MockFeedServer {
    fn drop(&mut self) {
        self.shutdown.notify_waiters();
    }
}

async fn handle_connection(
    stream: TcpStream,
    script: Arc<Script>,
    received: Arc<Mutex<Vec<Value>>>,
    connections: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
) {
    let Ok(ws) = accept_async(stream).await else { return };
    let index = connections.fetch_add(1, Ordering::SeqCst);
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                let Some(Ok(msg)) = msg else { break };
                if msg.is_close() {
                    break;
                }
                let Ok(text) = msg.to_text() else { continue };
                let Ok(value) = serde_json::from_str::<Value>(text) else { continue };
                received.lock().push(value.clone());

                let replies: Vec<Value> = match value["type"].as_str() {
                    Some("subscribe") => script.on_subscribe.get(index).cloned().unwrap_or_default(),
                    Some("heartbeat") if script.ack_heartbeats => {
                        vec![serde_json::json!({ "type": "heartbeatAck", "ts": value["ts"] })]
                    }
                    _ => Vec::new(),
                };
                for reply in replies {
                    if write.send(Message::Text(reply.to_string().into())).await.is_err() {
                        return;
                    }
                }
            }
            _ = shutdown.notified() => break,
        }
    }
}

pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        sleep(Duration::from_millis(10)).await;
    }
}
