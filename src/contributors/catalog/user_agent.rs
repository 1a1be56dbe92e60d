//! Priority 10: generic user-agent heuristics — empty/missing UA, bare
//! library UAs (`curl`, `python-requests`, ...), and headless-browser
//! tells — for traffic that didn't already match a named catalog entry.

use crate::contributors::blackboard::RequestBlackboard;
use crate::contributors::framework::Contributor;
use crate::core::model::{BotType, DetectionContribution};
use crate::core::signals;

/// Bare HTTP-library UAs: scripted clients, not malicious by default but
/// worth a moderate nudge.
const LIBRARY_UA_NEEDLES: &[&str] = &[
    "curl/", "python-requests", "go-http-client", "okhttp", "libwww-perl",
    "wget/", "java/", "axios/", "node-fetch",
];

const HEADLESS_NEEDLES: &[&str] = &["headlesschrome", "phantomjs", "puppeteer", "playwright"];

pub struct UserAgent;

impl Contributor for UserAgent {
    fn name(&self) -> &'static str {
        "UserAgent"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn run(&self, board: &RequestBlackboard) -> Vec<DetectionContribution> {
        let Some(ua) = board.request.user_agent() else {
            return vec![DetectionContribution {
                category: self.name().to_string(),
                reason: "missing user-agent header".to_string(),
                confidence_delta: 0.3,
                bot_name: None,
                bot_type: Some(BotType::Unknown),
                signals: std::collections::HashMap::new(),
                trigger_early_exit: false,
                early_exit_verdict: None,
            }
            .with_signal(signals::USER_AGENT_IS_BOT, true)];
        };

        if ua.trim().is_empty() {
            return vec![DetectionContribution {
                category: self.name().to_string(),
                reason: "empty user-agent header".to_string(),
                confidence_delta: 0.3,
                bot_name: None,
                bot_type: Some(BotType::Unknown),
                signals: std::collections::HashMap::new(),
                trigger_early_exit: false,
                early_exit_verdict: None,
            }
            .with_signal(signals::USER_AGENT_IS_BOT, true)];
        }

        let lower = ua.to_ascii_lowercase();

        if let Some(needle) = HEADLESS_NEEDLES.iter().find(|n| lower.contains(**n)) {
            return vec![DetectionContribution {
                category: self.name().to_string(),
                reason: format!("headless-browser signature: {needle}"),
                confidence_delta: 0.5,
                bot_name: None,
                bot_type: Some(BotType::BadBot),
                signals: std::collections::HashMap::new(),
                trigger_early_exit: false,
                early_exit_verdict: None,
            }
            .with_signal(signals::USER_AGENT_IS_BOT, true)
            .with_signal(signals::USER_AGENT_BOT_TYPE, "Headless")];
        }

        if let Some(needle) = LIBRARY_UA_NEEDLES.iter().find(|n| lower.contains(**n)) {
            return vec![DetectionContribution {
                category: self.name().to_string(),
                reason: format!("bare HTTP-library user-agent: {needle}"),
                confidence_delta: 0.2,
                bot_name: None,
                bot_type: Some(BotType::Unknown),
                signals: std::collections::HashMap::new(),
                trigger_early_exit: false,
                early_exit_verdict: None,
            }
            .with_signal(signals::USER_AGENT_IS_BOT, true)
            .with_signal(signals::USER_AGENT_BOT_TYPE, "Library")];
        }

        vec![DetectionContribution::neutral(self.name(), "user-agent looks like a regular browser")
            .with_signal(signals::USER_AGENT_IS_BOT, false)]
    }
}
