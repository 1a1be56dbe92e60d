//! The two-stage detection pipeline (§4.7, §4.8): a fast-path decider that
//! resolves most traffic alone, and a slow-path orchestrator for everything
//! it can't.

pub mod fast_path;
pub mod slow_path;

pub use fast_path::{FastPathDecider, FastPathDecision, FastPathMode};
pub use slow_path::SlowPathPipeline;

use std::sync::Arc;

use crate::bus::{BusEvent, BusEventType, DriftTracker, LearningBus};
use crate::contributors::blackboard::RequestBlackboard;
use crate::core::model::DetectionResult;
use crate::policy::{PolicyAction, PolicyEngine};
use crate::request::HttpRequestContext;
use crate::telemetry::{TelemetryEvent, TelemetrySink};

/// Final disposition returned to the embedding caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Block,
    Challenge,
}

impl From<PolicyAction> for Verdict {
    fn from(action: PolicyAction) -> Self {
        match action {
            PolicyAction::Allow | PolicyAction::Continue => Self::Allow,
            PolicyAction::Block => Self::Block,
            PolicyAction::Challenge => Self::Challenge,
        }
    }
}

/// What the pipeline decided and how much work it did to get there.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub verdict: Verdict,
    pub mode: FastPathMode,
    pub applied_policy: String,
    /// `Some` only when the slow path actually ran (`FullPath` or a sampled
    /// fast-path-allow that was mirrored through the full pipeline).
    pub detection: Option<DetectionResult>,
}

/// Ties the policy engine, fast-path decider, slow-path orchestrator, and
/// learning bus together into one request-handling entry point.
pub struct Pipeline {
    policy_engine: PolicyEngine,
    fast_path: FastPathDecider,
    slow_path: SlowPathPipeline,
    bus: Option<LearningBus>,
    drift: Option<DriftTracker>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        policy_engine: PolicyEngine,
        fast_path: FastPathDecider,
        slow_path: SlowPathPipeline,
        bus: Option<LearningBus>,
        drift: Option<DriftTracker>,
    ) -> Self {
        Self {
            policy_engine,
            fast_path,
            slow_path,
            bus,
            drift,
            telemetry: Arc::new(crate::telemetry::NullTelemetrySink),
        }
    }

    /// Attach a telemetry observer. Replaces the default no-op sink.
    #[must_use]
    pub fn with_telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = sink;
        self
    }

    #[must_use]
    pub fn bus(&self) -> Option<&LearningBus> {
        self.bus.as_ref()
    }

    pub fn handle_request(&self, request: HttpRequestContext) -> PipelineOutcome {
        let policy = self.policy_engine.policy_for_path(request.path_without_query());
        let fast_decision = self.fast_path.decide(&request, &policy);

        match fast_decision.mode {
            FastPathMode::FastPath => {
                self.publish_minimal(&fast_decision);
                self.telemetry.record(TelemetryEvent::FastPathResolved {
                    request_id: request.request_id.clone(),
                    mode: "fast_path",
                    reason: fast_decision.reason,
                });
                PipelineOutcome {
                    verdict: fast_decision.action.map_or(Verdict::Allow, Verdict::from),
                    mode: fast_decision.mode,
                    applied_policy: policy.name.clone(),
                    detection: None,
                }
            }
            FastPathMode::FastPathSampled => {
                self.publish_minimal(&fast_decision);
                let board = RequestBlackboard::new(request);
                let detection = self.slow_path.run(&policy, &board, self.bus.as_ref(), self.drift.as_ref());
                self.telemetry.record(TelemetryEvent::SlowPathCompleted {
                    request_id: board.request.request_id.clone(),
                    confidence_score: detection.confidence_score,
                    is_bot: detection.is_bot,
                    processing_time_ms: detection.processing_time_ms,
                });
                self.report_drift_if_any(&fast_decision, &detection);
                PipelineOutcome {
                    verdict: fast_decision.action.map_or(Verdict::Allow, Verdict::from),
                    mode: fast_decision.mode,
                    applied_policy: policy.name.clone(),
                    detection: Some(detection),
                }
            }
            FastPathMode::FullPath => {
                let board = RequestBlackboard::new(request);
                let detection = self.slow_path.run(&policy, &board, self.bus.as_ref(), self.drift.as_ref());
                self.telemetry.record(TelemetryEvent::SlowPathCompleted {
                    request_id: board.request.request_id.clone(),
                    confidence_score: detection.confidence_score,
                    is_bot: detection.is_bot,
                    processing_time_ms: detection.processing_time_ms,
                });

                let resolution = self
                    .policy_engine
                    .resolve(&policy, detection.confidence_score, &board)
                    .ok();

                let verdict = resolution
                    .as_ref()
                    .and_then(|outcome| outcome.action)
                    .map_or_else(|| if detection.is_bot { Verdict::Block } else { Verdict::Allow }, Verdict::from);

                let applied_policy = resolution.map_or_else(|| policy.name.clone(), |outcome| outcome.final_policy.name.clone());

                PipelineOutcome { verdict, mode: fast_decision.mode, applied_policy, detection: Some(detection) }
            }
        }
    }

    fn publish_minimal(&self, decision: &FastPathDecision) {
        let Some(bus) = &self.bus else { return };
        let confidence = match decision.action {
            Some(PolicyAction::Block) => 1.0,
            Some(PolicyAction::Allow) => 0.0,
            _ => 0.5,
        };
        let mut event = BusEvent::new(BusEventType::MinimalDetection, "fast_path", confidence)
            .with_label(decision.reason);
        if let Some(pattern_id) = &decision.pattern_id {
            event = event.with_pattern(pattern_id.clone());
        }
        bus.try_publish(event);
    }

    fn report_drift_if_any(&self, fast_decision: &FastPathDecision, detection: &DetectionResult) {
        let (Some(bus), Some(drift), Some(pattern_id)) = (&self.bus, &self.drift, &fast_decision.pattern_id) else {
            return;
        };
        let fast_verdict = if fast_decision.action == Some(PolicyAction::Block) { "block" } else { "allow" };
        let slow_verdict = if detection.is_bot { "block" } else { "allow" };
        if fast_verdict != slow_verdict {
            bus.try_publish(drift.observe_drift(pattern_id, fast_verdict, slow_verdict));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::pattern_cache::PatternCache;
    use crate::contributors::catalog::SecurityTool;
    use crate::core::config::{BusConfig, CacheConfig, FastPathConfig, PolicyEngineConfig, ReputationConfig};
    use crate::policy::PolicyRegistry;
    use crate::reputation::ReputationCache;
    use crate::request::ProtocolVersion;
    use std::sync::Arc;

    fn build_pipeline() -> Pipeline {
        let pattern_cache = Arc::new(PatternCache::new(&CacheConfig::default(), crate::contributors::catalog::security_tool::BUILTIN_PATTERNS));
        let reputation = Arc::new(ReputationCache::new(ReputationConfig::default(), None));
        let policy_engine = PolicyEngine::new(PolicyRegistry::with_builtins(&PolicyEngineConfig::default()));
        let fast_path = FastPathDecider::new(Arc::clone(&pattern_cache), reputation, FastPathConfig::default());
        let slow_path = SlowPathPipeline::new(vec![Box::new(SecurityTool::new(pattern_cache))]);
        let bus = LearningBus::new(&BusConfig::default());
        Pipeline::new(policy_engine, fast_path, slow_path, Some(bus), None)
    }

    fn request(ua: &str, path: &str) -> HttpRequestContext {
        let mut ctx = HttpRequestContext::new("r1", "GET", path, ProtocolVersion::Http1_1);
        ctx.headers.insert("User-Agent", ua);
        ctx
    }

    #[test]
    fn known_malicious_ua_is_blocked_via_fast_path() {
        let pipeline = build_pipeline();
        let outcome = pipeline.handle_request(request("sqlmap/1.5", "/api/users"));
        assert_eq!(outcome.verdict, Verdict::Block);
        assert_eq!(outcome.mode, FastPathMode::FastPath);
    }

    #[test]
    fn unknown_ua_runs_the_full_pipeline() {
        let pipeline = build_pipeline();
        let outcome = pipeline.handle_request(request("Mozilla/5.0 Chrome/122.0", "/api/users"));
        assert_eq!(outcome.mode, FastPathMode::FullPath);
        assert!(outcome.detection.is_some());
        assert_eq!(outcome.verdict, Verdict::Allow);
    }

    #[test]
    fn static_asset_path_still_resolves() {
        let pipeline = build_pipeline();
        let outcome = pipeline.handle_request(request("Mozilla/5.0 Chrome/122.0", "/assets/app.js"));
        assert_eq!(outcome.applied_policy, "static");
    }
}
