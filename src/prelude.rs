//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use botshield_core::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{BotShieldError, Result};
pub use crate::core::model::{BotType, DetectionContribution, DetectionResult, EarlyExitVerdict, SignalValue};

// Request contract
pub use crate::request::{HeaderMap, HttpRequestContext, ProtocolVersion};

// Contributors
pub use crate::contributors::blackboard::RequestBlackboard;
pub use crate::contributors::{Contributor, OrchestrationOutcome};

// Policy
pub use crate::policy::{DetectionPolicy, PolicyAction, PolicyEngine, PolicyRegistry};

// Reputation
pub use crate::reputation::{compute_pattern_id, PatternReputation, PatternState, PatternType, ReputationCache};

// Pipeline
pub use crate::pipeline::{FastPathDecider, FastPathMode, Pipeline, PipelineOutcome, SlowPathPipeline, Verdict};

// Learning bus
pub use crate::bus::{BusEvent, BusEventType, DriftTracker, LearningBus};

// Telemetry
pub use crate::telemetry::{NullTelemetrySink, RingBufferSink, TelemetryEvent, TelemetrySink};
