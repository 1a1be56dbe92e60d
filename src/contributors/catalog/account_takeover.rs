//! Priority 25: credential-stuffing and account-takeover heuristics on
//! login-shaped endpoints. Several inputs here (failed-login counters,
//! geo-velocity) are computed upstream by the embedding application and
//! published onto the blackboard as signals before the slow path runs —
//! this contributor only reads and combines them.

use crate::contributors::blackboard::RequestBlackboard;
use crate::contributors::framework::Contributor;
use crate::core::model::{BotType, DetectionContribution};
use crate::core::signals;

const LOGIN_PATH_NEEDLES: &[&str] = &["/login", "/signin", "/sign-in", "/auth/login", "/wp-login.php"];

/// Failed-login count at or above which credential stuffing is suspected.
const BRUTE_FORCE_THRESHOLD: i64 = 5;

pub struct AccountTakeover;

impl AccountTakeover {
    fn is_login_path(path: &str) -> bool {
        let lower = path.to_ascii_lowercase();
        LOGIN_PATH_NEEDLES.iter().any(|needle| lower.contains(needle))
    }
}

impl Contributor for AccountTakeover {
    fn name(&self) -> &'static str {
        "AccountTakeover"
    }

    fn priority(&self) -> i32 {
        25
    }

    fn run(&self, board: &RequestBlackboard) -> Vec<DetectionContribution> {
        let path = board.request.path_without_query();
        if board.request.method != "POST" || !Self::is_login_path(path) {
            return vec![DetectionContribution::neutral(self.name(), "not a login submission")];
        }

        let direct_post = board.request.headers.get("referer").is_none();
        let failed_logins = board
            .get_signal(signals::ATO_LOGIN_FAILED_COUNT)
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0) as i64;
        let rapid_credential_change = board
            .get_signal(signals::ATO_RAPID_CREDENTIAL_CHANGE)
            .is_some_and(|v| v.as_truthy());
        let geo_velocity = board
            .get_signal(signals::ATO_GEO_VELOCITY)
            .is_some_and(|v| v.as_truthy());

        let brute_force = failed_logins >= BRUTE_FORCE_THRESHOLD;
        let mut delta = 0.0;
        let mut reasons = Vec::new();
        if brute_force {
            delta += 0.5;
            reasons.push(format!("{failed_logins} failed logins from this identity"));
        }
        if direct_post {
            delta += 0.1;
            reasons.push("login POST with no referer".to_string());
        }
        if rapid_credential_change {
            delta += 0.2;
            reasons.push("rapid credential change".to_string());
        }
        if geo_velocity {
            delta += 0.2;
            reasons.push("geographically implausible login velocity".to_string());
        }

        let detected = delta > 0.0;
        let reason = if detected {
            reasons.join("; ")
        } else {
            "login submission with no anomalous signals".to_string()
        };

        vec![DetectionContribution {
            category: self.name().to_string(),
            reason,
            confidence_delta: delta.clamp(0.0, 1.0),
            bot_name: None,
            bot_type: detected.then_some(BotType::BadBot),
            signals: std::collections::HashMap::new(),
            trigger_early_exit: false,
            early_exit_verdict: None,
        }
        .with_signal(signals::IS_ACCOUNT_TAKEOVER, detected)
        .with_signal(signals::ATO_CREDENTIAL_STUFFING, brute_force)
        .with_signal(signals::ATO_BRUTE_FORCE, brute_force)
        .with_signal(signals::ATO_DIRECT_POST, direct_post)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::SignalValue;
    use crate::request::{HttpRequestContext, ProtocolVersion};

    fn login_board(failed_logins: f64) -> RequestBlackboard {
        let ctx = HttpRequestContext::new("r1", "POST", "/login", ProtocolVersion::Http1_1);
        let board = RequestBlackboard::new(ctx);
        board.set_signal(signals::ATO_LOGIN_FAILED_COUNT, SignalValue::Float(failed_logins));
        board
    }

    #[test]
    fn non_login_path_is_neutral() {
        let board = RequestBlackboard::new(HttpRequestContext::new("r1", "GET", "/api/users", ProtocolVersion::Http1_1));
        let contributions = AccountTakeover.run(&board);
        assert!((contributions[0].confidence_delta).abs() < f64::EPSILON);
    }

    #[test]
    fn repeated_failed_logins_triggers_brute_force_signal() {
        let board = login_board(10.0);
        let contributions = AccountTakeover.run(&board);
        assert!(contributions[0].confidence_delta > 0.0);
        assert_eq!(
            contributions[0].signals.get(signals::ATO_BRUTE_FORCE).map(|v| v.as_truthy()),
            Some(true)
        );
    }

    #[test]
    fn single_clean_login_attempt_is_low_risk() {
        let mut ctx = HttpRequestContext::new("r1", "POST", "/login", ProtocolVersion::Http1_1);
        ctx.headers.insert("Referer", "https://example.com/login");
        let board = RequestBlackboard::new(ctx);
        let contributions = AccountTakeover.run(&board);
        assert!((contributions[0].confidence_delta).abs() < f64::EPSILON);
    }
}
