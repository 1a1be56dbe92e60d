//! Fast-path decider (§4.7): a UA-pattern-and-reputation-only check that
//! resolves the overwhelming majority of requests without ever running a
//! contributor wave.

use std::sync::Arc;

use crate::cache::pattern_cache::PatternCache;
use crate::core::config::FastPathConfig;
use crate::policy::{DetectionPolicy, PolicyAction};
use crate::reputation::{compute_pattern_id, PatternType, ReputationCache};
use crate::request::HttpRequestContext;

/// Which of the three fast-path outcomes a request landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastPathMode {
    /// Resolved entirely by the fast path; the slow path never runs.
    FastPath,
    /// Resolved by the fast path, but also sampled into the slow path to
    /// keep reputation fresh and catch drift.
    FastPathSampled,
    /// The fast path could not resolve this request with confidence; the
    /// full contributor pipeline must run.
    FullPath,
}

#[derive(Debug, Clone)]
pub struct FastPathDecision {
    pub mode: FastPathMode,
    /// `Some` only when `mode != FullPath`.
    pub action: Option<PolicyAction>,
    pub pattern_id: Option<String>,
    pub reason: &'static str,
}

impl FastPathDecision {
    fn full_path() -> Self {
        Self { mode: FastPathMode::FullPath, action: None, pattern_id: None, reason: "no fast-path signal" }
    }
}

pub struct FastPathDecider {
    cache: Arc<PatternCache>,
    reputation: Arc<ReputationCache>,
    config: FastPathConfig,
}

impl FastPathDecider {
    #[must_use]
    pub fn new(cache: Arc<PatternCache>, reputation: Arc<ReputationCache>, config: FastPathConfig) -> Self {
        Self { cache, reputation, config }
    }

    /// Evaluate the fast path for `request` under `policy`.
    ///
    /// A policy with `force_slow_path` set always escalates, regardless of
    /// how confident the reputation cache is — an explicit policy decision
    /// to run the full pipeline takes precedence over any fast-allow.
    #[must_use]
    pub fn decide(&self, request: &HttpRequestContext, policy: &DetectionPolicy) -> FastPathDecision {
        if policy.force_slow_path || !policy.use_fast_path {
            return FastPathDecision::full_path();
        }

        let Some(ua) = request.user_agent() else {
            return FastPathDecision::full_path();
        };

        let (hit, _) = self.cache.matches_any_pattern(ua);
        if hit {
            return FastPathDecision {
                mode: FastPathMode::FastPath,
                action: Some(PolicyAction::Block),
                pattern_id: None,
                reason: "matched a known malicious UA signature",
            };
        }

        let pattern_id = compute_pattern_id(PatternType::UserAgent, ua);
        let now = chrono::Utc::now();
        let Some(reputation) = self.reputation.get(&pattern_id, now) else {
            return FastPathDecision::full_path();
        };

        if reputation.can_trigger_fast_abort() && reputation.bot_score >= self.config.fast_abort_threshold {
            return FastPathDecision {
                mode: FastPathMode::FastPath,
                action: Some(PolicyAction::Block),
                pattern_id: Some(pattern_id),
                reason: "reputation confirmed bad, above fast-abort threshold",
            };
        }

        if reputation.can_trigger_fast_allow() && reputation.bot_score <= self.config.fast_allow_threshold {
            let sampled = rand::random::<f64>() < self.config.sample_rate;
            return FastPathDecision {
                mode: if sampled { FastPathMode::FastPathSampled } else { FastPathMode::FastPath },
                action: Some(PolicyAction::Allow),
                pattern_id: Some(pattern_id),
                reason: if sampled {
                    "reputation confirmed good, sampled into the full pipeline for freshness"
                } else {
                    "reputation confirmed good, below fast-allow threshold"
                },
            };
        }

        FastPathDecision::full_path()
    }
}
