//! Merge & Dedup — spojení nového batche s předchozím stavem,
//! fingerprinty, ukončené zápasy a filtr live setu.

pub mod filter;
pub mod finished;
pub mod merge;
pub mod state;

pub use filter::{filter_live, filter_upcoming, is_live_eligible, live_rejection, Rejection};
pub use finished::FinishedSet;
pub use merge::{merge, merge_enriched, same_fingerprints};
pub use state::LiveState;
