//! Live feed — push kanál jako alternativa k pollingu.
//!
//! - `client`    — WS klient: subscribe, heartbeat, reconnect, pause/resume
//! - `state`     — connection state machine
//! - `backoff`   — exponenciální backoff s limitem pokusů
//! - `heartbeat` — watchdog na heartbeat ack (mrtvé spojení)
//! - `identity`  — trvalé client id (UUID, expirace 24 h)
//! - `protocol`  — JSON zprávy kanálu
//! - `store`     — běžící set zápasů (last-write-wins per id)

pub mod backoff;
pub mod client;
pub mod error;
pub mod heartbeat;
pub mod identity;
pub mod protocol;
pub mod state;
pub mod store;

pub use backoff::ReconnectBackoff;
pub use client::{FeedControl, LiveFeedClient, LiveFeedConfig, LiveFeedHandle};
pub use error::LiveFeedError;
pub use heartbeat::HeartbeatMonitor;
pub use identity::ClientIdentity;
pub use protocol::{ClientMessage, ServerMessage};
pub use state::ConnectionState;
pub use store::LiveMatchStore;
