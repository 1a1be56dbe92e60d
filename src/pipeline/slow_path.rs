//! Slow-path orchestrator (§4.8): runs the full contributor catalog in
//! wave order, aggregates a policy-weighted risk score, and derives the
//! final detection verdict.

use crate::bus::{BusEvent, BusEventType, DriftTracker, LearningBus};
use crate::contributors::blackboard::RequestBlackboard;
use crate::contributors::framework::{run_waves_weighted, Contributor};
use crate::core::model::{BotType, DetectionResult, EarlyExitVerdict, ReasonEntry};
use crate::policy::DetectionPolicy;

/// Aggregate confidence at or above which a verdict is published as a
/// `HighConfidenceDetection` learning trigger.
const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.9;

pub struct SlowPathPipeline {
    contributors: Vec<Box<dyn Contributor>>,
}

impl SlowPathPipeline {
    #[must_use]
    pub fn new(contributors: Vec<Box<dyn Contributor>>) -> Self {
        Self { contributors }
    }

    /// Run every eligible contributor in wave order against `board`, then
    /// aggregate into a final [`DetectionResult`].
    ///
    /// `bus`/`drift` are optional: a caller not wired to a learning bus
    /// still gets a correct detection result, it just doesn't emit events.
    pub fn run(
        &self,
        policy: &DetectionPolicy,
        board: &RequestBlackboard,
        bus: Option<&LearningBus>,
        drift: Option<&DriftTracker>,
    ) -> DetectionResult {
        let weight = |category: &str| policy.effective_weight(category);
        run_waves_weighted(&self.contributors, board, weight);

        let contributions = board.contributions_snapshot();
        let reasons: Vec<ReasonEntry> = contributions
            .iter()
            .map(|c| ReasonEntry {
                category: c.category.clone(),
                detail: c.reason.clone(),
                delta: c.confidence_delta * weight(&c.category),
            })
            .collect();

        let risk_score = board.current_risk_score();
        let early_exit = board.early_exit_verdict();
        let priority_of = |category: &str| {
            self.contributors
                .iter()
                .find(|c| c.name() == category)
                .map_or(i32::MAX, |c| c.priority())
        };

        // §4.8: an early-exit verdict floors the published confidence so a
        // low policy weight on the triggering category can never suppress
        // the `HighConfidenceDetection` publication below.
        let (is_bot, bot_type, confidence_score) = match early_exit {
            Some(EarlyExitVerdict::VerifiedBadBot) => (
                true,
                dominant_bot_type(&contributions, priority_of).or(Some(BotType::BadBot)),
                risk_score.max(0.95),
            ),
            Some(EarlyExitVerdict::VerifiedGoodBot) => (true, Some(BotType::GoodBot), risk_score.max(0.9)),
            None => (risk_score >= 0.5, dominant_bot_type(&contributions, priority_of), risk_score),
        };

        let bot_name = contributions.iter().rev().find_map(|c| c.bot_name.clone());

        let result = DetectionResult {
            is_bot,
            confidence_score,
            bot_type,
            bot_name,
            reasons,
            signals: board.signals_snapshot(),
            processing_time_ms: board.elapsed_ms(),
        };

        self.publish_events(&result, board, bus, drift);
        result
    }

    fn publish_events(
        &self,
        result: &DetectionResult,
        board: &RequestBlackboard,
        bus: Option<&LearningBus>,
        drift: Option<&DriftTracker>,
    ) {
        let Some(bus) = bus else { return };

        let pattern_id = board.get_signal(crate::core::signals::REPUTATION_PATTERN_ID).and_then(|v| v.as_str().map(str::to_string));
        let label = if result.is_bot { "bot" } else { "human" };

        let mut event = BusEvent::new(BusEventType::FullDetection, "slow_path", result.confidence_score).with_label(label);
        if let Some(pattern_id) = &pattern_id {
            event = event.with_pattern(pattern_id.clone());
        }
        bus.try_publish(event);

        if result.confidence_score < HIGH_CONFIDENCE_THRESHOLD {
            return;
        }

        let mut high_confidence = BusEvent::new(BusEventType::HighConfidenceDetection, "slow_path", result.confidence_score)
            .with_label(label);
        if let Some(pattern_id) = &pattern_id {
            high_confidence = high_confidence.with_pattern(pattern_id.clone());
        }
        bus.try_publish(high_confidence);

        if let (Some(drift), Some(pattern_id)) = (drift, &pattern_id) {
            if let Some(feedback) = drift.observe_high_confidence(pattern_id, label) {
                bus.try_publish(feedback);
            }
        }
    }
}

/// The `bot_type` of the contribution with the largest **positive**
/// `confidence_delta` (§4.8) — a strongly human-ward, negative-delta
/// contribution must never win. Ties break toward the lowest contributor
/// priority, then lexicographically by category name.
fn dominant_bot_type(
    contributions: &[crate::core::model::DetectionContribution],
    priority_of: impl Fn(&str) -> i32,
) -> Option<BotType> {
    contributions
        .iter()
        .filter(|c| c.bot_type.is_some() && c.confidence_delta > 0.0)
        .min_by(|a, b| {
            b.confidence_delta
                .total_cmp(&a.confidence_delta)
                .then_with(|| priority_of(&a.category).cmp(&priority_of(&b.category)))
                .then_with(|| a.category.cmp(&b.category))
        })
        .and_then(|c| c.bot_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::pattern_cache::PatternCache;
    use crate::contributors::catalog::{AiScraper, SecurityTool};
    use crate::core::config::CacheConfig;
    use crate::request::{HttpRequestContext, ProtocolVersion};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn policy() -> DetectionPolicy {
        DetectionPolicy {
            name: "default".to_string(),
            description: String::new(),
            fast_path_detectors: Vec::new(),
            slow_path_detectors: Vec::new(),
            use_fast_path: true,
            force_slow_path: false,
            escalate_to_ai: false,
            ai_escalation_threshold: 0.7,
            early_exit_threshold: 0.05,
            immediate_block_threshold: 0.95,
            weight_overrides: HashMap::new(),
            transitions: Vec::new(),
        }
    }

    fn board_with_ua(ua: &str) -> RequestBlackboard {
        let mut ctx = HttpRequestContext::new("r1", "GET", "/", ProtocolVersion::Http1_1);
        ctx.headers.insert("User-Agent", ua);
        RequestBlackboard::new(ctx)
    }

    #[test]
    fn sqlmap_resolves_to_confirmed_bad_bot() {
        let cache = Arc::new(PatternCache::new(&CacheConfig::default(), crate::contributors::catalog::security_tool::BUILTIN_PATTERNS));
        let pipeline = SlowPathPipeline::new(vec![Box::new(SecurityTool::new(cache))]);
        let board = board_with_ua("sqlmap/1.5");
        let result = pipeline.run(&policy(), &board, None, None);
        assert!(result.is_bot);
        assert_eq!(result.bot_type, Some(BotType::MaliciousBot));
        assert_eq!(result.bot_name.as_deref(), Some("Sqlmap"));
    }

    #[test]
    fn normal_browser_resolves_to_human() {
        let security_cache = Arc::new(PatternCache::new(&CacheConfig::default(), crate::contributors::catalog::security_tool::BUILTIN_PATTERNS));
        let ai_cache = Arc::new(PatternCache::new(&CacheConfig::default(), &[]));
        let pipeline = SlowPathPipeline::new(vec![Box::new(SecurityTool::new(security_cache)), Box::new(AiScraper::new(ai_cache))]);
        let board = board_with_ua("Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/122.0.0.0");
        let result = pipeline.run(&policy(), &board, None, None);
        assert!(!result.is_bot);
    }

    /// A policy that halves every category's weight must not be able to pull
    /// a `sqlmap` early-exit's published confidence below 0.95 (§4.8, §8
    /// scenario 1).
    #[test]
    fn verified_bad_bot_confidence_is_floored_regardless_of_policy_weight() {
        let cache = Arc::new(PatternCache::new(&CacheConfig::default(), crate::contributors::catalog::security_tool::BUILTIN_PATTERNS));
        let pipeline = SlowPathPipeline::new(vec![Box::new(SecurityTool::new(cache))]);
        let mut low_weight_policy = policy();
        low_weight_policy
            .weight_overrides
            .insert("SecurityTool".to_string(), 0.1);
        let board = board_with_ua("sqlmap/1.5");
        let result = pipeline.run(&low_weight_policy, &board, None, None);
        assert!(result.is_bot);
        assert!(result.confidence_score >= 0.95, "confidence_score={}", result.confidence_score);
    }

    /// A verified good bot is still a bot (§4.8): `is_bot` must be `true`
    /// with `bot_type = GoodBot`, not the inverse — the earlier regression
    /// this guards fed every verified good bot into learning as `"human"`.
    #[test]
    fn verified_good_bot_is_still_a_bot() {
        let security_cache = Arc::new(PatternCache::new(&CacheConfig::default(), crate::contributors::catalog::security_tool::BUILTIN_PATTERNS));
        let ai_cache = Arc::new(PatternCache::new(&CacheConfig::default(), &[]));
        let pipeline = SlowPathPipeline::new(vec![Box::new(SecurityTool::new(security_cache)), Box::new(AiScraper::new(ai_cache))]);
        let mut req = HttpRequestContext::new("r1", "GET", "/articles/1", ProtocolVersion::Http1_1);
        req.headers.insert(
            "User-Agent",
            "Mozilla/5.0 AppleWebKit/537.36 (compatible; GPTBot/1.2; +https://openai.com/gptbot)",
        );
        req.headers.insert("Signature", "sig1=:abc123:");
        req.headers
            .insert("Signature-Input", "sig1=(\"@authority\");keyid=\"poqkLk5\"");
        let board = RequestBlackboard::new(req);

        let result = pipeline.run(&policy(), &board, None, None);
        assert!(result.is_bot);
        assert_eq!(result.bot_type, Some(BotType::GoodBot));
        assert!(result.confidence_score >= 0.9, "confidence_score={}", result.confidence_score);
    }

    struct NegativeDeltaBotType;
    impl Contributor for NegativeDeltaBotType {
        fn name(&self) -> &'static str {
            "NegativeDeltaBotType"
        }
        fn priority(&self) -> i32 {
            1
        }
        fn run(&self, _board: &RequestBlackboard) -> Vec<crate::core::model::DetectionContribution> {
            vec![crate::core::model::DetectionContribution {
                category: self.name().to_string(),
                reason: "strongly human-ward".to_string(),
                confidence_delta: -0.9,
                bot_name: None,
                bot_type: Some(BotType::BadBot),
                signals: HashMap::new(),
                trigger_early_exit: false,
                early_exit_verdict: None,
            }]
        }
    }

    struct SmallPositiveDeltaBotType;
    impl Contributor for SmallPositiveDeltaBotType {
        fn name(&self) -> &'static str {
            "SmallPositiveDeltaBotType"
        }
        fn priority(&self) -> i32 {
            2
        }
        fn run(&self, _board: &RequestBlackboard) -> Vec<crate::core::model::DetectionContribution> {
            vec![crate::core::model::DetectionContribution {
                category: self.name().to_string(),
                reason: "weak bot-ward".to_string(),
                confidence_delta: 0.2,
                bot_name: None,
                bot_type: Some(BotType::AiBot),
                signals: HashMap::new(),
                trigger_early_exit: false,
                early_exit_verdict: None,
            }]
        }
    }

    /// §4.8: the dominant `bot_type` is the largest **positive**-delta
    /// contribution. A strongly negative-delta contribution (human-ward)
    /// must never win just because its magnitude is larger.
    #[test]
    fn dominant_bot_type_ignores_negative_delta_contributions() {
        let pipeline = SlowPathPipeline::new(vec![
            Box::new(NegativeDeltaBotType),
            Box::new(SmallPositiveDeltaBotType),
        ]);
        let board = board_with_ua("anything");
        let result = pipeline.run(&policy(), &board, None, None);
        assert_eq!(result.bot_type, Some(BotType::AiBot));
    }
}
