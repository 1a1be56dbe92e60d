//! Priority 8: match the UA against known security-tool signatures and, on a
//! hit, force an immediate `VerifiedBadBot` verdict.

use std::sync::Arc;

use crate::cache::pattern_cache::PatternCache;
use crate::contributors::blackboard::RequestBlackboard;
use crate::contributors::framework::Contributor;
use crate::core::model::{BotType, DetectionContribution, EarlyExitVerdict};
use crate::core::signals;

/// Built-in security-tool UA patterns. Names are the tool's canonical
/// product name, matched case-insensitively against the full UA string.
pub const BUILTIN_PATTERNS: &[(&str, &str)] = &[
    ("Sqlmap", r"sqlmap"),
    ("Nikto", r"nikto"),
    ("Nmap", r"nmap(\s|/)"),
    ("Nessus", r"nessus"),
    ("AcunetixScanner", r"acunetix"),
    ("Burp", r"burp\s?suite"),
    ("OwaspZap", r"(owasp )?zap\b"),
    ("Hydra", r"thc-hydra"),
    ("Metasploit", r"metasploit"),
];

pub struct SecurityTool {
    cache: Arc<PatternCache>,
}

impl SecurityTool {
    #[must_use]
    pub fn new(cache: Arc<PatternCache>) -> Self {
        Self { cache }
    }
}

impl Contributor for SecurityTool {
    fn name(&self) -> &'static str {
        "SecurityTool"
    }

    fn priority(&self) -> i32 {
        8
    }

    fn is_optional(&self) -> bool {
        false
    }

    fn run(&self, board: &RequestBlackboard) -> Vec<DetectionContribution> {
        let Some(ua) = board.request.user_agent() else {
            return vec![DetectionContribution::neutral(self.name(), "no user-agent header")];
        };
        let (hit, name) = self.cache.matches_any_pattern(ua);
        if !hit {
            return vec![DetectionContribution::neutral(self.name(), "no security-tool signature match")];
        }
        let tool_name = name.unwrap_or_else(|| "Unknown".to_string());
        vec![DetectionContribution::early_exit(
            self.name(),
            format!("matched security-tool signature: {tool_name}"),
            0.95,
            EarlyExitVerdict::VerifiedBadBot,
            BotType::MaliciousBot,
        )
        .with_bot_name(tool_name.clone())
        .with_signal(signals::IS_SECURITY_TOOL, true)
        .with_signal(signals::SECURITY_TOOL_NAME, tool_name)
        .with_signal(signals::SECURITY_TOOL_CATEGORY, "ScanningTool")]
    }
}
