//! Per-request shared mutable store: signals, contributions, and the running
//! risk score (§4.5).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::core::model::{DetectionContribution, EarlyExitVerdict, SignalValue};
use crate::request::HttpRequestContext;

/// Per-request scratch space shared by every contributor in a wave-ordered
/// run. Cheap to construct; one instance lives for the duration of a single
/// request's slow-path (or fast-path) evaluation.
pub struct RequestBlackboard {
    pub request: HttpRequestContext,
    signals: RwLock<HashMap<String, SignalValue>>,
    contributions: Mutex<Vec<DetectionContribution>>,
    current_risk_score_bits: AtomicU64,
    completed: Mutex<HashSet<String>>,
    failed: Mutex<HashSet<String>>,
    early_exit: Mutex<Option<EarlyExitVerdict>>,
    started_at: Instant,
}

impl RequestBlackboard {
    #[must_use]
    pub fn new(request: HttpRequestContext) -> Self {
        Self {
            request,
            signals: RwLock::new(HashMap::new()),
            contributions: Mutex::new(Vec::new()),
            current_risk_score_bits: AtomicU64::new(0.0f64.to_bits()),
            completed: Mutex::new(HashSet::new()),
            failed: Mutex::new(HashSet::new()),
            early_exit: Mutex::new(None),
            started_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64() * 1000.0
    }

    pub fn set_signal(&self, key: impl Into<String>, value: impl Into<SignalValue>) {
        self.signals.write().insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get_signal(&self, key: &str) -> Option<SignalValue> {
        self.signals.read().get(key).cloned()
    }

    #[must_use]
    pub fn has_signal(&self, key: &str) -> bool {
        self.signals.read().contains_key(key)
    }

    #[must_use]
    pub fn signals_snapshot(&self) -> HashMap<String, SignalValue> {
        self.signals.read().clone()
    }

    /// Append a contribution, merge its signals, and fold its delta into
    /// `current_risk_score` with `weight` (the aggregation rule lives in
    /// `pipeline::slow_path`; this just records the raw, unweighted delta
    /// alongside the weighted running score for observability).
    pub fn record(&self, contribution: DetectionContribution, weighted_risk_delta: f64) {
        for (key, value) in &contribution.signals {
            self.signals.write().insert(key.clone(), value.clone());
        }
        if let Some(verdict) = contribution.early_exit_verdict {
            *self.early_exit.lock() = Some(verdict);
            if verdict == EarlyExitVerdict::VerifiedGoodBot {
                self.signals.write().insert(crate::core::signals::IS_VERIFIED_BOT.to_string(), SignalValue::Bool(true));
            }
        }
        self.bump_risk(weighted_risk_delta);
        self.contributions.lock().push(contribution);
    }

    fn bump_risk(&self, delta: f64) {
        loop {
            let current_bits = self.current_risk_score_bits.load(Ordering::Acquire);
            let current = f64::from_bits(current_bits);
            let next = (current + delta).clamp(0.0, 1.0);
            let next_bits = next.to_bits();
            if self
                .current_risk_score_bits
                .compare_exchange(current_bits, next_bits, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
        }
    }

    #[must_use]
    pub fn current_risk_score(&self) -> f64 {
        f64::from_bits(self.current_risk_score_bits.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn contributions_snapshot(&self) -> Vec<DetectionContribution> {
        self.contributions.lock().clone()
    }

    #[must_use]
    pub fn early_exit_verdict(&self) -> Option<EarlyExitVerdict> {
        *self.early_exit.lock()
    }

    #[must_use]
    pub fn has_early_exit(&self) -> bool {
        self.early_exit.lock().is_some()
    }

    pub fn mark_completed(&self, name: &str) {
        self.completed.lock().insert(name.to_string());
    }

    pub fn mark_failed(&self, name: &str) {
        self.failed.lock().insert(name.to_string());
    }

    #[must_use]
    pub fn completed_detectors(&self) -> HashSet<String> {
        self.completed.lock().clone()
    }

    #[must_use]
    pub fn failed_detectors(&self) -> HashSet<String> {
        self.failed.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ProtocolVersion;

    fn ctx() -> HttpRequestContext {
        HttpRequestContext::new("r1", "GET", "/", ProtocolVersion::Http1_1)
    }

    #[test]
    fn risk_score_clamps_to_unit_interval() {
        let board = RequestBlackboard::new(ctx());
        board.record(DetectionContribution::neutral("x", "r"), 5.0);
        assert!((board.current_risk_score() - 1.0).abs() < f64::EPSILON);
        board.record(DetectionContribution::neutral("y", "r"), -5.0);
        assert!(board.current_risk_score().abs() < f64::EPSILON);
    }

    #[test]
    fn signals_are_visible_after_record() {
        let board = RequestBlackboard::new(ctx());
        let contribution = DetectionContribution::neutral("x", "r").with_signal("k", "v");
        board.record(contribution, 0.0);
        assert_eq!(board.get_signal("k").and_then(|v| v.as_str().map(str::to_string)), Some("v".to_string()));
    }

    #[test]
    fn verified_good_bot_early_exit_stamps_is_verified_bot_signal() {
        let board = RequestBlackboard::new(ctx());
        let contribution = DetectionContribution::early_exit(
            "ai_scraper",
            "known good crawler",
            -1.0,
            EarlyExitVerdict::VerifiedGoodBot,
            crate::core::model::BotType::GoodBot,
        );
        board.record(contribution, -1.0);
        assert_eq!(board.get_signal(crate::core::signals::IS_VERIFIED_BOT), Some(SignalValue::Bool(true)));
    }

    #[test]
    fn verified_bad_bot_early_exit_does_not_stamp_is_verified_bot_signal() {
        let board = RequestBlackboard::new(ctx());
        let contribution = DetectionContribution::early_exit(
            "security_tool",
            "known malicious signature",
            1.0,
            EarlyExitVerdict::VerifiedBadBot,
            crate::core::model::BotType::MaliciousBot,
        );
        board.record(contribution, 1.0);
        assert!(board.get_signal(crate::core::signals::IS_VERIFIED_BOT).is_none());
    }
}
