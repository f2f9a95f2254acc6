//! Push-channel client.
//!
//! Jeden task drží spojení: subscribe → heartbeat každých 5 s → zpracování
//! `matches` pushů. Výpadek, `forceReconnect` nebo chybějící heartbeat ack
//! vedou na reconnect s exponenciálním backoffem. Pause pošle best-effort
//! unsubscribe a vypne auto-reconnect, resume ho zase zapne.

use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use logger::{now_iso, EventLogger, FeedConnectionEvent};
use match_model::Match;

use crate::backoff::ReconnectBackoff;
use crate::error::LiveFeedError;
use crate::heartbeat::HeartbeatMonitor;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::ConnectionState;
use crate::store::LiveMatchStore;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct LiveFeedConfig {
    pub url: String,
    pub heartbeat_interval: Duration,
    pub client_timeout: Duration,
    pub backoff_base: Duration,
    pub max_backoff: Duration,
    pub max_attempts: u32,
    pub connect_timeout: Duration,
}

impl LiveFeedConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            heartbeat_interval: Duration::from_millis(5000),
            client_timeout: Duration::from_millis(45_000),
            backoff_base: Duration::from_millis(1000),
            max_backoff: Duration::from_millis(30_000),
            max_attempts: 10,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedControl {
    Run,
    Pause,
    Stop,
}

/// Why a connected session ended.
#[derive(Debug)]
enum SessionEnd {
    Lost(String),
    Paused,
    Stopped,
}

pub struct LiveFeedClient {
    config: LiveFeedConfig,
    client_id: String,
    backoff: ReconnectBackoff,
    store: LiveMatchStore,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    matches_tx: watch::Sender<Arc<Vec<Match>>>,
    events: Option<EventLogger>,
}

/// Handle to a spawned client task.
pub struct LiveFeedHandle {
    control: watch::Sender<FeedControl>,
    state: watch::Receiver<ConnectionState>,
    matches: watch::Receiver<Arc<Vec<Match>>>,
    task: JoinHandle<()>,
}

impl LiveFeedHandle {
    /// Best-effort unsubscribe, then no reconnects until `resume`.
    pub fn pause(&self) {
        self.control.send_replace(FeedControl::Pause);
    }

    pub fn resume(&self) {
        self.control.send_replace(FeedControl::Run);
    }

    pub async fn stop(self) {
        self.control.send_replace(FeedControl::Stop);
        if let Err(e) = self.task.await {
            warn!("live feed task ended abnormally: {}", e);
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn subscribe_matches(&self) -> watch::Receiver<Arc<Vec<Match>>> {
        self.matches.clone()
    }

    pub fn matches(&self) -> Arc<Vec<Match>> {
        self.matches.borrow().clone()
    }
}

impl LiveFeedClient {
    pub fn new(config: LiveFeedConfig, client_id: impl Into<String>) -> Self {
        let backoff =
            ReconnectBackoff::new(config.backoff_base, config.max_backoff, config.max_attempts);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (matches_tx, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            config,
            client_id: client_id.into(),
            backoff,
            store: LiveMatchStore::new(),
            state: ConnectionState::Disconnected,
            state_tx,
            matches_tx,
            events: None,
        }
    }

    pub fn with_event_logger(mut self, events: EventLogger) -> Self {
        self.events = Some(events);
        self
    }

    pub fn spawn(self) -> LiveFeedHandle {
        let (control, control_rx) = watch::channel(FeedControl::Run);
        let state = self.state_tx.subscribe();
        let matches = self.matches_tx.subscribe();
        let task = tokio::spawn(self.run(control_rx));
        LiveFeedHandle {
            control,
            state,
            matches,
            task,
        }
    }

    // ── Main loop ────────────────────────────────────────────────────────────

    async fn run(mut self, mut control: watch::Receiver<FeedControl>) {
        info!("live feed client {} → {}", self.client_id, self.config.url);

        loop {
            let mode = *control.borrow_and_update();
            match mode {
                FeedControl::Stop => break,
                FeedControl::Pause => {
                    self.set_state(ConnectionState::Disconnected, "paused");
                    if control.changed().await.is_err() {
                        break;
                    }
                    self.backoff.reset();
                    continue;
                }
                FeedControl::Run => {}
            }

            let next = if self.state == ConnectionState::Disconnected {
                ConnectionState::Connecting
            } else {
                ConnectionState::Reconnecting
            };
            self.set_state(next, "dialing");

            match self.connect().await {
                Ok(ws) => {
                    self.backoff.reset();
                    self.set_state(ConnectionState::Connected, "subscribed");
                    match self.session(ws, &mut control).await {
                        SessionEnd::Stopped => break,
                        SessionEnd::Paused => continue,
                        SessionEnd::Lost(reason) => {
                            warn!("live feed connection lost: {}", reason);
                            self.set_state(ConnectionState::Reconnecting, &reason);
                        }
                    }
                }
                Err(e) => {
                    debug!("live feed connect failed: {}", e);
                    if self.state == ConnectionState::Connecting {
                        self.set_state(ConnectionState::Reconnecting, &e.to_string());
                    }
                }
            }

            let Some(delay) = self.backoff.next_delay() else {
                error!(
                    "live feed gave up after {} attempts, waiting for resume",
                    self.config.max_attempts
                );
                self.set_state(ConnectionState::Disconnected, "gave up");
                if control.changed().await.is_err() {
                    break;
                }
                self.backoff.reset();
                continue;
            };
            debug!(
                "reconnect attempt {} in {}ms",
                self.backoff.attempt(),
                delay.as_millis()
            );

            tokio::select! {
                _ = sleep(delay) => {}
                changed = control.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    // Pause/Stop se vyhodnotí na začátku smyčky
                    if *control.borrow() != FeedControl::Run {
                        self.set_state(ConnectionState::Disconnected, "control");
                    }
                }
            }
        }

        self.set_state(ConnectionState::Disconnected, "stopped");
        info!("live feed client stopped");
    }

    async fn connect(&self) -> Result<WsStream, LiveFeedError> {
        match timeout(self.config.connect_timeout, connect_async(self.config.url.as_str())).await {
            Ok(Ok((ws, _))) => Ok(ws),
            Ok(Err(e)) => Err(LiveFeedError::Connect(e.to_string())),
            Err(_) => Err(LiveFeedError::Connect(format!(
                "timeout after {}ms",
                self.config.connect_timeout.as_millis()
            ))),
        }
    }

    // ── Session ──────────────────────────────────────────────────────────────

    async fn session(&mut self, ws: WsStream, control: &mut watch::Receiver<FeedControl>) -> SessionEnd {
        let (mut write, mut read) = ws.split();

        let subscribe = ClientMessage::Subscribe {
            client_id: self.client_id.clone(),
        };
        if let Err(e) = write.send(Message::Text(subscribe.to_json().into())).await {
            return SessionEnd::Lost(format!("subscribe send: {e}"));
        }

        let period = self.config.heartbeat_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut monitor = HeartbeatMonitor::new(self.config.client_timeout);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if monitor.is_expired() {
                        let (sent, acked) = monitor.counts();
                        return SessionEnd::Lost(format!(
                            "no heartbeat ack for {}ms ({sent} sent, {acked} acked)",
                            monitor.since_ack().as_millis()
                        ));
                    }
                    let hb = ClientMessage::Heartbeat {
                        client_id: self.client_id.clone(),
                        ts: chrono::Utc::now().timestamp_millis(),
                    };
                    if let Err(e) = write.send(Message::Text(hb.to_json().into())).await {
                        return SessionEnd::Lost(format!("heartbeat send: {e}"));
                    }
                    monitor.record_sent();
                }

                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reason) = self.handle_text(text.as_str(), &mut monitor) {
                            return SessionEnd::Lost(reason);
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return SessionEnd::Lost("closed by server".to_string());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return SessionEnd::Lost(format!("read: {e}")),
                },

                changed = control.changed() => {
                    let mode = if changed.is_err() { FeedControl::Stop } else { *control.borrow() };
                    if mode != FeedControl::Run {
                        return self.leave(&mut write, mode).await;
                    }
                }
            }
        }
    }

    /// Best-effort unsubscribe + close, bounded to one second.
    async fn leave<S>(&mut self, write: &mut S, mode: FeedControl) -> SessionEnd
    where
        S: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        let bye = ClientMessage::Unsubscribe {
            client_id: self.client_id.clone(),
        };
        let goodbye = async {
            write.send(Message::Text(bye.to_json().into())).await?;
            write.close().await
        };
        if let Err(e) = timeout(Duration::from_secs(1), goodbye).await.unwrap_or(Ok(())) {
            debug!("unsubscribe not delivered: {}", e);
        }

        self.set_state(ConnectionState::Disconnected, "paused");
        if mode == FeedControl::Stop {
            SessionEnd::Stopped
        } else {
            SessionEnd::Paused
        }
    }

    /// Returns `Some(reason)` when the server asks us to reconnect.
    fn handle_text(&mut self, text: &str, monitor: &mut HeartbeatMonitor) -> Option<String> {
        match ServerMessage::parse(text) {
            Ok(ServerMessage::Matches { payload }) => {
                let accepted = self.store.apply(&payload);
                debug!("push: {} matches accepted, {} total", accepted, self.store.len());
                if accepted > 0 {
                    self.matches_tx.send_replace(self.store.snapshot());
                }
            }
            Ok(ServerMessage::HeartbeatAck { .. }) => monitor.record_ack(),
            Ok(ServerMessage::Subscribed { .. }) => debug!("subscription confirmed"),
            Ok(ServerMessage::ForceReconnect { reason }) => {
                return Some(format!(
                    "server requested reconnect ({})",
                    reason.unwrap_or_else(|| "no reason".to_string())
                ));
            }
            Err(e) => debug!("ignoring push message: {}", e),
        }
        None
    }

    fn set_state(&mut self, next: ConnectionState, note: &str) {
        if next == self.state && next != ConnectionState::Reconnecting {
            return;
        }
        match self.state.transition(next) {
            Ok(s) => self.state = s,
            Err(e) => {
                warn!("{}", e);
                return;
            }
        }
        self.state_tx.send_replace(next);
        info!("live feed {} ({})", next.as_str(), note);

        if let Some(events) = &self.events {
            let _ = events.log(&FeedConnectionEvent {
                ts: now_iso(),
                event: "FEED_CONNECTION",
                state: next.as_str().to_string(),
                attempt: self.backoff.attempt(),
                note: note.to_string(),
            });
        }
    }
}
