//! Pluggable observability hook for the decision engine (§3 supplemented
//! feature): a small observer-pattern trait so a caller can tap pipeline
//! events without the engine owning any particular metrics backend.
//!
//! The default implementation is a no-op. [`RingBufferSink`] is a bounded,
//! lock-protected sink for tests and local inspection, in the same spirit as
//! the ancestor's rolling calibration window in `monitor::guardrails`: fixed
//! capacity, oldest-evicted-first, no unbounded growth.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::core::config::TelemetryConfig;

/// One observable moment in a request's trip through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    /// The fast path resolved a request alone, without running the slow path.
    FastPathResolved {
        request_id: String,
        mode: &'static str,
        reason: &'static str,
    },
    /// The slow path finished running the full contributor catalog.
    SlowPathCompleted {
        request_id: String,
        confidence_score: f64,
        is_bot: bool,
        processing_time_ms: u64,
    },
    /// A contributor panicked and was recorded as a failed, non-optional
    /// detector (see `contributors::framework::run_one`).
    ContributorFailed {
        request_id: String,
        contributor: &'static str,
    },
    /// A reputation entry crossed a hysteresis boundary.
    ReputationStateChanged {
        pattern_id: String,
        from: &'static str,
        to: &'static str,
    },
    /// The policy engine followed a `go_to_policy` switch.
    PolicySwitched {
        request_id: String,
        from: String,
        to: String,
    },
}

/// Observer for [`TelemetryEvent`]s. Implementors decide where events end up
/// (metrics registry, log sink, in-memory ring for tests); the engine only
/// ever calls `record`.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: TelemetryEvent);
}

/// Discards every event. The engine's default when a caller wires no sink.
#[derive(Debug, Default)]
pub struct NullTelemetrySink;

impl TelemetrySink for NullTelemetrySink {
    fn record(&self, _event: TelemetryEvent) {}
}

/// Bounded in-memory sink: keeps the most recent `capacity` events, oldest
/// dropped first. Intended for tests and local `bsctl` inspection, not as a
/// production metrics store.
pub struct RingBufferSink {
    capacity: usize,
    events: Mutex<VecDeque<TelemetryEvent>>,
}

impl RingBufferSink {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::new()),
        }
    }

    #[must_use]
    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self::new(config.ring_buffer_capacity)
    }

    /// Snapshot of currently retained events, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TelemetryEvent> {
        self.events.lock().iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TelemetrySink for RingBufferSink {
    fn record(&self, event: TelemetryEvent) {
        let mut events = self.events.lock();
        events.push_back(event);
        while events.len() > self.capacity {
            events.pop_front();
        }
    }
}
