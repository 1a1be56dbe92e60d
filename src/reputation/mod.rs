//! Online reputation learning: EMA updates, time decay, hysteresis, and the
//! hot-key cache that fronts the durable pattern store (§4.4).

pub mod cache;
pub mod engine;
pub mod model;

pub use cache::{ReputationCache, ReputationEvent};
pub use model::{compute_pattern_id, PatternReputation, PatternState, PatternType};
