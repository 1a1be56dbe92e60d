//! Priority 5: seed the aggregate score with this request's historical
//! reputation before any other contributor runs, so later waves are scoring
//! against an already-biased baseline rather than a blank slate.

use std::sync::Arc;

use crate::contributors::blackboard::RequestBlackboard;
use crate::contributors::framework::Contributor;
use crate::core::model::DetectionContribution;
use crate::core::signals;
use crate::reputation::{compute_pattern_id, PatternType, ReputationCache};

pub struct ReputationBias {
    cache: Arc<ReputationCache>,
}

impl ReputationBias {
    #[must_use]
    pub fn new(cache: Arc<ReputationCache>) -> Self {
        Self { cache }
    }
}

impl Contributor for ReputationBias {
    fn name(&self) -> &'static str {
        "ReputationBias"
    }

    fn priority(&self) -> i32 {
        5
    }

    fn run(&self, board: &RequestBlackboard) -> Vec<DetectionContribution> {
        let Some(ua) = board.request.user_agent() else {
            return vec![DetectionContribution::neutral(self.name(), "no user-agent to look up")];
        };

        let pattern_id = compute_pattern_id(PatternType::UserAgent, ua);
        let now = chrono::Utc::now();
        let Some(reputation) = self.cache.get(&pattern_id, now) else {
            return vec![
                DetectionContribution::neutral(self.name(), "no prior reputation for this user-agent")
                    .with_signal(signals::REPUTATION_PATTERN_ID, pattern_id),
            ];
        };

        // Scale the raw bot_score by confidence so a single unlucky
        // observation can't swing the aggregate; only an established
        // history (many samples) earns a meaningful bias.
        let bias = (reputation.bot_score - 0.5) * reputation.confidence();

        vec![DetectionContribution {
            category: self.name().to_string(),
            reason: format!(
                "historical reputation bot_score={:.2} support={:.1} state={:?}",
                reputation.bot_score, reputation.support, reputation.state
            ),
            confidence_delta: bias,
            bot_name: None,
            bot_type: None,
            signals: std::collections::HashMap::new(),
            trigger_early_exit: false,
            early_exit_verdict: None,
        }
        .with_signal(signals::REPUTATION_PATTERN_ID, pattern_id)
        .with_signal(signals::REPUTATION_BOT_SCORE, reputation.bot_score)
        .with_signal(signals::REPUTATION_SUPPORT, reputation.support)
        .with_signal(signals::REPUTATION_STATE, format!("{:?}", reputation.state))]
    }
}
