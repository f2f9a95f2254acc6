//! Stats-provider + odds-feed adaptéry.
//!
//! - `queue`   — bounded request queue (okna po 3, timeout, fallback)
//! - `retry`   — fetch-with-retry pro jednotlivé dražší cally
//! - `http`    — reqwest implementace stats transportu (doc[0].data, ETag/304)
//! - `odds`    — odds feed (live / upcoming)

pub mod endpoints;
pub mod error;
pub mod http;
pub mod odds;
pub mod queue;
pub mod retry;

pub use endpoints::{Endpoint, StatsRequest, StatsTransport};
pub use error::FetchError;
pub use http::HttpStatsClient;
pub use odds::{HttpOddsSource, OddsSource};
pub use queue::{QueueConfig, RequestQueue};
pub use retry::{fetch_with_retry, FetchOutcome, RetryConfig};
