//! botshield-core — an in-process bot-detection decision engine.
//!
//! Embeds as a library inside an HTTP server or gateway: hand it an
//! [`request::HttpRequestContext`] and a named [`policy::DetectionPolicy`],
//! get back a [`pipeline::Verdict`]. Two cooperating stages do the work:
//!
//! 1. **Fast path** (`pipeline::fast_path`) — a UA-pattern-and-reputation
//!    check that resolves the overwhelming majority of traffic without
//!    running a single contributor.
//! 2. **Slow path** (`pipeline::slow_path`) — a wave-ordered contributor
//!    catalog (`contributors::catalog`) writing to a shared blackboard,
//!    aggregated into a confidence score and reconciled against a
//!    declarative policy (`policy`).
//!
//! Reputation learned from slow-path verdicts feeds back into the fast path
//! through a hysteretic, confidence-weighted online learner
//! (`reputation::engine`) backed by a hot-key-aware cache
//! (`reputation::cache`) with write-behind persistence.

pub mod bus;
pub mod cache;
pub mod contributors;
pub mod core;
pub mod listsource;
pub mod pipeline;
pub mod policy;
pub mod reputation;
pub mod request;
pub mod telemetry;

#[cfg(feature = "cli")]
pub mod cli;

pub mod prelude;
