//! Declarative, named detection policies: thresholds, weight overrides, and
//! transition rules that parameterize a pipeline run (§4.6).

pub mod evaluator;
pub mod model;
pub mod registry;

pub use evaluator::{evaluate_once, PolicyResolution};
pub use model::{DetectionPolicy, PolicyAction, PolicyTransition};
pub use registry::{PolicyRegistry, DEFAULT_POLICY_NAME};

use std::collections::HashSet;
use std::sync::Arc;

use crate::contributors::blackboard::RequestBlackboard;
use crate::core::errors::{BotShieldError, Result};

/// Resolves a starting policy name to a final action by repeatedly
/// evaluating `go_to_policy` switches against the registry, guarding against
/// a transition cycle.
pub struct PolicyEngine {
    registry: PolicyRegistry,
}

impl PolicyEngine {
    #[must_use]
    pub fn new(registry: PolicyRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// Resolve the policy governing `path`, per the registry's static-asset
    /// and path-pattern rules.
    #[must_use]
    pub fn policy_for_path(&self, path: &str) -> Arc<DetectionPolicy> {
        self.registry.get_policy_for_path(path)
    }

    /// Evaluate starting from `starting_policy`, following `go_to_policy`
    /// switches until a direct action resolves or no transition matches.
    ///
    /// Returns `Ok(None)` when the chain runs dry without ever resolving to
    /// an action (the caller should keep running under the last-visited
    /// policy's own thresholds). Returns `Err(PolicyLoop)` if a policy name
    /// is revisited within one resolution chain.
    pub fn resolve(
        &self,
        starting_policy: &Arc<DetectionPolicy>,
        risk_score: f64,
        blackboard: &RequestBlackboard,
    ) -> Result<PolicyOutcome> {
        let mut visited = HashSet::new();
        let mut current = Arc::clone(starting_policy);

        loop {
            if !visited.insert(current.name.to_ascii_lowercase()) {
                return Err(BotShieldError::PolicyLoop { name: current.name.clone() });
            }

            match evaluate_once(&current, risk_score, blackboard) {
                PolicyResolution::Resolve(action) => {
                    return Ok(PolicyOutcome { final_policy: current, action: Some(action) });
                }
                PolicyResolution::Continue => {
                    return Ok(PolicyOutcome { final_policy: current, action: None });
                }
                PolicyResolution::SwitchTo(name) => {
                    current = self
                        .registry
                        .get(&name)
                        .ok_or_else(|| BotShieldError::UnknownPolicy { name: name.clone() })?;
                }
            }
        }
    }
}

/// Result of a (possibly multi-hop) policy resolution chain.
#[derive(Debug, Clone)]
pub struct PolicyOutcome {
    pub final_policy: Arc<DetectionPolicy>,
    pub action: Option<PolicyAction>,
}
