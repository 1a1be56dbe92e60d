//! Policy data model: `DetectionPolicy`, its transitions, and the direct
//! actions a transition (or the evaluator's own threshold checks) can
//! resolve to (§3, §4.6).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A direct resolution a policy transition (or threshold check) can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PolicyAction {
    Allow,
    Block,
    Challenge,
    Continue,
}

/// One declarative transition rule. Matches on at most one of
/// `when_signal`/`when_risk_exceeds`/`when_risk_below`; resolves to either
/// `go_to_policy` or a direct `action`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyTransition {
    pub when_signal: Option<String>,
    pub when_risk_exceeds: Option<f64>,
    pub when_risk_below: Option<f64>,
    pub go_to_policy: Option<String>,
    pub action: Option<PolicyAction>,
}

impl PolicyTransition {
    #[must_use]
    pub fn on_signal(signal: impl Into<String>, action: PolicyAction) -> Self {
        Self {
            when_signal: Some(signal.into()),
            when_risk_exceeds: None,
            when_risk_below: None,
            go_to_policy: None,
            action: Some(action),
        }
    }

    #[must_use]
    pub fn on_risk_exceeds(threshold: f64, action: PolicyAction) -> Self {
        Self {
            when_signal: None,
            when_risk_exceeds: Some(threshold),
            when_risk_below: None,
            go_to_policy: None,
            action: Some(action),
        }
    }
}

/// A named, immutable set of thresholds, weight overrides, and transition
/// rules parameterizing one classification pass.
///
/// Registering a policy with the same name replaces the record atomically —
/// instances are never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionPolicy {
    pub name: String,
    pub description: String,
    pub fast_path_detectors: Vec<String>,
    pub slow_path_detectors: Vec<String>,
    pub use_fast_path: bool,
    pub force_slow_path: bool,
    pub escalate_to_ai: bool,
    pub ai_escalation_threshold: f64,
    pub early_exit_threshold: f64,
    pub immediate_block_threshold: f64,
    pub weight_overrides: HashMap<String, f64>,
    pub transitions: Vec<PolicyTransition>,
}

impl DetectionPolicy {
    /// Effective weight for `category`: an explicit override, else the
    /// global default table, else `1.0`.
    #[must_use]
    pub fn effective_weight(&self, category: &str) -> f64 {
        if let Some(weight) = self.weight_overrides.get(category) {
            return *weight;
        }
        default_weight_table(category)
    }
}

/// Global default weight table consulted when a policy has no override for a
/// category. `Heuristic` contributions carry extra weight by default since
/// they are lower-precision signals that need amplification to move the
/// aggregate score meaningfully.
fn default_weight_table(category: &str) -> f64 {
    match category {
        "Heuristic" => 2.0,
        _ => 1.0,
    }
}
