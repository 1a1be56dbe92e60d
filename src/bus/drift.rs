//! Per-pattern occurrence counting and fast/slow verdict drift detection
//! (§5 bus).

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::bus::{BusEvent, BusEventType};
use crate::core::config::{BusConfig, ReputationConfig};

struct Counter {
    occurrences: u64,
    confirmations: u64,
}

/// Tracks how often each pattern has been seen at high confidence and
/// whether the fast path and slow path agree on it, feeding
/// `SignatureFeedback` and `FastPathDriftDetected` events.
pub struct DriftTracker {
    counters: Mutex<HashMap<String, Counter>>,
    feedback_min_occurrences: u64,
    drift_window: usize,
    recent: Mutex<Vec<String>>,
}

impl DriftTracker {
    #[must_use]
    pub fn new(reputation_config: &ReputationConfig, bus_config: &BusConfig) -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            feedback_min_occurrences: reputation_config.feedback_min_occurrences,
            drift_window: bus_config.drift_window,
            recent: Mutex::new(Vec::new()),
        }
    }

    /// Record one high-confidence observation of `pattern_id`. Once it has
    /// been confirmed `feedback_min_occurrences` times, returns the
    /// `SignatureFeedback` event to publish (only once, at the crossing
    /// point — repeat observations beyond the threshold are silent).
    pub fn observe_high_confidence(&self, pattern_id: &str, label: &str) -> Option<BusEvent> {
        let mut counters = self.counters.lock();
        let counter = counters.entry(pattern_id.to_string()).or_insert(Counter { occurrences: 0, confirmations: 0 });
        counter.occurrences += 1;
        counter.confirmations += 1;

        self.track_window(pattern_id);

        if counter.confirmations == self.feedback_min_occurrences {
            return Some(
                BusEvent::new(BusEventType::SignatureFeedback, "drift_tracker", 1.0)
                    .with_pattern(pattern_id)
                    .with_label(label),
            );
        }
        None
    }

    /// Record a fast-path/slow-path disagreement for `pattern_id`. Always
    /// returns a `FastPathDriftDetected` event — every disagreement is
    /// reported, not just the first.
    pub fn observe_drift(&self, pattern_id: &str, fast_verdict: &str, slow_verdict: &str) -> BusEvent {
        self.track_window(pattern_id);
        BusEvent::new(BusEventType::FastPathDriftDetected, "drift_tracker", 0.0)
            .with_pattern(pattern_id)
            .with_metadata("fast_verdict", fast_verdict)
            .with_metadata("slow_verdict", slow_verdict)
    }

    fn track_window(&self, pattern_id: &str) {
        let mut recent = self.recent.lock();
        recent.push(pattern_id.to_string());
        if recent.len() > self.drift_window {
            let overflow = recent.len() - self.drift_window;
            recent.drain(0..overflow);
        }
    }

    #[must_use]
    pub fn occurrences(&self, pattern_id: &str) -> u64 {
        self.counters.lock().get(pattern_id).map_or(0, |c| c.occurrences)
    }
}
