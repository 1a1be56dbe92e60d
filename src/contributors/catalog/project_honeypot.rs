//! Priority 15 (optional): known scanner-trap path probing. Mirrors the
//! "Project Honeypot" idea of a hidden trap that legitimate traffic never
//! reaches — here realized as a built-in list of well-known sensitive paths
//! that only a scanner fishing for default installs would request.

use crate::contributors::blackboard::RequestBlackboard;
use crate::contributors::framework::Contributor;
use crate::core::model::{BotType, DetectionContribution};
use crate::core::signals;

const TRAP_PATHS: &[&str] = &[
    "/.env",
    "/.git/config",
    "/wp-admin/setup-config.php",
    "/xmlrpc.php",
    "/.aws/credentials",
    "/phpmyadmin",
    "/.well-known/traversal",
    "/config.php.bak",
    "/server-status",
];

pub struct ProjectHoneypot;

impl Contributor for ProjectHoneypot {
    fn name(&self) -> &'static str {
        "ProjectHoneypot"
    }

    fn priority(&self) -> i32 {
        15
    }

    fn run(&self, board: &RequestBlackboard) -> Vec<DetectionContribution> {
        let path = board.request.path_without_query();
        let hit = TRAP_PATHS.iter().any(|trap| path.eq_ignore_ascii_case(trap));

        if !hit {
            return vec![
                DetectionContribution::neutral(self.name(), "no honeypot trap path requested")
                    .with_signal(signals::PROJECT_HONEYPOT_HIT, false),
            ];
        }

        vec![DetectionContribution {
            category: self.name().to_string(),
            reason: format!("requested known scanner-trap path: {path}"),
            confidence_delta: 0.7,
            bot_name: None,
            bot_type: Some(BotType::BadBot),
            signals: std::collections::HashMap::new(),
            trigger_early_exit: false,
            early_exit_verdict: None,
        }
        .with_signal(signals::PROJECT_HONEYPOT_HIT, true)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{HttpRequestContext, ProtocolVersion};

    fn board_at(path: &str) -> RequestBlackboard {
        RequestBlackboard::new(HttpRequestContext::new("r1", "GET", path, ProtocolVersion::Http1_1))
    }

    #[test]
    fn trap_path_is_flagged() {
        let contributions = ProjectHoneypot.run(&board_at("/.env"));
        assert!(contributions[0].confidence_delta > 0.0);
    }

    #[test]
    fn ordinary_path_is_neutral() {
        let contributions = ProjectHoneypot.run(&board_at("/api/users"));
        assert!((contributions[0].confidence_delta).abs() < f64::EPSILON);
    }
}
