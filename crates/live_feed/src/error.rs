use thiserror::Error;

use crate::state::ConnectionState;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LiveFeedError {
    #[error("invalid state transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("protocol: {0}")]
    Protocol(String),
}
