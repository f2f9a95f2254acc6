use thiserror::Error;

/// Failures that may cross the core boundary.
///
/// Upstream hiccups never show up here; they are absorbed into fallbacks
/// long before. `Validation` is the only variant a caller is expected to
/// translate into a response status.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("validation failed ({status}): {message}")]
    Validation { status: u16, message: String },

    #[error("upstream unavailable: {0}")]
    Upstream(String),

    #[error("store error: {0}")]
    Store(String),
}

impl FeedError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        FeedError::Validation {
            status: 400,
            message: message.into(),
        }
    }

    /// HTTP-style status for the outer surface.
    pub fn status(&self) -> u16 {
        match self {
            FeedError::Validation { status, .. } => *status,
            FeedError::Upstream(_) => 502,
            FeedError::Store(_) => 500,
        }
    }
}
