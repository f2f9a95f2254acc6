//! JSON zprávy push kanálu, tagované polem `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Subscribe {
        #[serde(rename = "clientId")]
        client_id: String,
    },
    Heartbeat {
        #[serde(rename = "clientId")]
        client_id: String,
        ts: i64,
    },
    Unsubscribe {
        #[serde(rename = "clientId")]
        client_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Batch of match payloads; `payload` is an array or `{ "matches": [...] }`.
    Matches { payload: Value },
    HeartbeatAck {
        #[serde(default)]
        ts: Option<i64>,
    },
    ForceReconnect {
        #[serde(default)]
        reason: Option<String>,
    },
    Subscribed {
        #[serde(default, rename = "clientId")]
        client_id: Option<String>,
    },
}

impl ClientMessage {
    pub fn to_json(&self) -> String {
        // serializace enumu se stringy a čísly neselže
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl ServerMessage {
    pub fn parse(text: &str) -> Result<Self, crate::LiveFeedError> {
        serde_json::from_str(text).map_err(|e| crate::LiveFeedError::Protocol(e.to_string()))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Items of a `matches` payload.
pub fn payload_items(payload: &Value) -> &[Value] {
    match payload {
        Value::Array(items) => items,
        Value::Object(o) => o
            .get("matches")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}
