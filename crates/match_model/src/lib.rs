//! Match model — kanonický tvar zápasu, normalizace upstream payloadů,
//! snapshot store kontrakt a validace identifikátorů.
//!
//! Všechny ostatní crates pracují jen s `Match`; syrové tvary z odds feedu
//! a z push kanálu se řeší jednou, tady v `normalize`.

pub mod cart;
pub mod error;
pub mod normalize;
pub mod params;
pub mod store;
pub mod types;

pub use cart::{Cart, CartItem};
pub use error::FeedError;
pub use normalize::{from_push_payload, looks_simulated, normalize, RawFeed};
pub use store::{load_snapshot, persist_snapshot, MemoryStore, SnapshotStore, SNAPSHOT_TTL};
pub use types::*;
