//! External bot/IP list ingestion and durable pattern persistence.

pub mod fetcher;
pub mod store;

pub use fetcher::{EmbeddedListSource, ListCoordinator, ListKind, ListSource};
pub use store::{LearnedSignature, PatternStore, PatternStoreStats, SignatureAction};

#[cfg(feature = "sqlite")]
pub use store::SqlitePatternStore;
