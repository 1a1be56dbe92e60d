//! In-process learning bus: a bounded MPMC channel carrying detection events
//! from the pipeline to the drift handler and any downstream learning
//! consumer (§5 bus, §7).

pub mod drift;

pub use drift::DriftTracker;

use std::collections::HashMap;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

use crate::core::config::BusConfig;

/// The six event shapes the bus carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum BusEventType {
    /// Published by the fast path for every request it resolved alone.
    MinimalDetection,
    /// Published by the slow path for every request it fully classified.
    FullDetection,
    /// Published by the slow path when a verdict clears the high-confidence
    /// bar — the learning trigger that eventually promotes a pattern.
    HighConfidenceDetection,
    /// Published when a fast-path/slow-path disagreement calls for a deeper
    /// look than either path alone performed.
    FullAnalysisRequest,
    /// A pattern has been observed enough times at high confidence to be
    /// promoted into the durable signature store.
    SignatureFeedback,
    /// The fast path's shortcut verdict disagreed with what the slow path
    /// would have said, on a sampled request that ran both.
    FastPathDriftDetected,
}

/// One event flowing across the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    pub event_type: BusEventType,
    pub source: String,
    pub pattern: Option<String>,
    pub confidence: f64,
    pub label: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl BusEvent {
    #[must_use]
    pub fn new(event_type: BusEventType, source: impl Into<String>, confidence: f64) -> Self {
        Self {
            event_type,
            source: source.into(),
            pattern: None,
            confidence,
            label: None,
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Bounded multi-producer multi-consumer event channel. Publishing never
/// blocks the request path — a full channel drops the event and logs at
/// warn, trading a lost learning signal for never stalling a live request.
pub struct LearningBus {
    sender: Sender<BusEvent>,
    receiver: Receiver<BusEvent>,
}

impl LearningBus {
    #[must_use]
    pub fn new(config: &BusConfig) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(config.channel_capacity);
        Self { sender, receiver }
    }

    /// Best-effort, non-blocking publish. Returns `false` if the channel was
    /// full and the event was dropped.
    pub fn try_publish(&self, event: BusEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!(event_type = ?event.event_type, "learning bus full, dropping event");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// A cloneable handle consumers can drain independently; `crossbeam`
    /// channels are natively multi-consumer (each event is delivered to
    /// exactly one receiver clone, not broadcast — callers that need
    /// broadcast semantics should fan out from a single consuming loop).
    #[must_use]
    pub fn receiver(&self) -> Receiver<BusEvent> {
        self.receiver.clone()
    }

    /// Drain everything currently queued without blocking.
    pub fn drain(&self) -> Vec<BusEvent> {
        self.receiver.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_and_drain_round_trips() {
        let bus = LearningBus::new(&BusConfig::default());
        assert!(bus.try_publish(BusEvent::new(BusEventType::MinimalDetection, "fast_path", 0.1)));
        let drained = bus.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].event_type, BusEventType::MinimalDetection);
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let config = BusConfig { channel_capacity: 1, drift_window: 10 };
        let bus = LearningBus::new(&config);
        assert!(bus.try_publish(BusEvent::new(BusEventType::FullDetection, "slow_path", 0.5)));
        assert!(!bus.try_publish(BusEvent::new(BusEventType::FullDetection, "slow_path", 0.5)));
    }
}
