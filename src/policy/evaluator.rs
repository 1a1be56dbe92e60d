//! Single-policy evaluation: immediate-block check, then ordered transition
//! matching (§4.6).

use crate::contributors::blackboard::RequestBlackboard;
use crate::policy::model::{DetectionPolicy, PolicyAction};

/// Outcome of evaluating one policy against the current blackboard state.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyResolution {
    /// No transition matched; the caller should keep running the remaining
    /// contributor waves under the current policy.
    Continue,
    /// A transition matched `go_to_policy`; re-evaluate under the named
    /// policy.
    SwitchTo(String),
    /// A transition (or the immediate-block check) resolved to a direct
    /// action.
    Resolve(PolicyAction),
}

/// Evaluate `policy` once against `risk_score`/`blackboard`.
///
/// Order: `immediate_block_threshold` short-circuits before any transition
/// is consulted (a sufficiently high risk score always blocks, regardless of
/// what a transition might otherwise say). Transitions are then tried in
/// declaration order; the first whose guard matches wins. A transition with
/// no guard at all (every `when_*` field `None`) is treated as an
/// unconditional match — useful as a catch-all last entry.
#[must_use]
pub fn evaluate_once(
    policy: &DetectionPolicy,
    risk_score: f64,
    blackboard: &RequestBlackboard,
) -> PolicyResolution {
    if risk_score >= policy.immediate_block_threshold {
        return PolicyResolution::Resolve(PolicyAction::Block);
    }

    if policy.use_fast_path && risk_score <= policy.early_exit_threshold {
        return PolicyResolution::Resolve(PolicyAction::Allow);
    }

    for transition in &policy.transitions {
        if !guard_matches(transition, risk_score, blackboard) {
            continue;
        }
        if let Some(target) = &transition.go_to_policy {
            return PolicyResolution::SwitchTo(target.clone());
        }
        if let Some(action) = transition.action {
            return PolicyResolution::Resolve(action);
        }
        // A transition with neither a target nor an action is inert; keep
        // scanning rather than treating it as a silent Continue match.
    }

    PolicyResolution::Continue
}

fn guard_matches(
    transition: &crate::policy::model::PolicyTransition,
    risk_score: f64,
    blackboard: &RequestBlackboard,
) -> bool {
    let mut guarded = false;

    if let Some(signal) = &transition.when_signal {
        guarded = true;
        if !blackboard.get_signal(signal).is_some_and(|v| v.as_truthy()) {
            return false;
        }
    }
    if let Some(threshold) = transition.when_risk_exceeds {
        guarded = true;
        if !(risk_score > threshold) {
            return false;
        }
    }
    if let Some(threshold) = transition.when_risk_below {
        guarded = true;
        if !(risk_score < threshold) {
            return false;
        }
    }

    // An unconditional transition (no guard fields set) always matches.
    guarded || transition.go_to_policy.is_some() || transition.action.is_some()
}
