//! Policy registry: built-in policy registration, case-insensitive lookup,
//! and per-path policy selection (§4.6).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::config::PolicyEngineConfig;
use crate::core::errors::{BotShieldError, Result};
use crate::policy::model::{DetectionPolicy, PolicyAction, PolicyTransition};

/// Name of the policy that can never be removed from the registry.
pub const DEFAULT_POLICY_NAME: &str = "default";

const STATIC_POLICY_NAME: &str = "static";

/// Registered set of named policies. Registering a name that already exists
/// replaces the record atomically via a pointer swap — lookups concurrent
/// with a replacement observe either the old or new record, never a partial
/// one.
pub struct PolicyRegistry {
    policies: RwLock<HashMap<String, Arc<DetectionPolicy>>>,
    path_policies: Vec<(String, String)>,
    use_file_extension_static_detection: bool,
    static_asset_extensions: Vec<String>,
}

impl PolicyRegistry {
    /// Construct a registry with the five built-in policies plus whatever
    /// `config.path_policies`/static-asset settings were configured.
    #[must_use]
    pub fn with_builtins(config: &PolicyEngineConfig) -> Self {
        let registry = Self {
            policies: RwLock::new(HashMap::new()),
            path_policies: config
                .path_policies
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            use_file_extension_static_detection: config.use_file_extension_static_detection,
            static_asset_extensions: config
                .static_asset_extensions
                .iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
        };
        for policy in builtin_policies() {
            registry.register(policy);
        }
        registry
    }

    /// Register (or replace) a policy by name. Lookups are case-insensitive.
    pub fn register(&self, policy: DetectionPolicy) {
        let key = policy.name.to_ascii_lowercase();
        self.policies.write().insert(key, Arc::new(policy));
    }

    /// Remove a custom policy. Removing `default` is rejected.
    pub fn remove(&self, name: &str) -> Result<()> {
        if name.eq_ignore_ascii_case(DEFAULT_POLICY_NAME) {
            return Err(BotShieldError::InvalidConfig {
                details: "the default policy cannot be removed".to_string(),
            });
        }
        self.policies.write().remove(&name.to_ascii_lowercase());
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<DetectionPolicy>> {
        self.policies.read().get(&name.to_ascii_lowercase()).cloned()
    }

    /// Resolve the policy for a request path per §4.6:
    /// 1. static-asset extension short-circuit (if enabled),
    /// 2. most-specific `path_policies` match (exact > `*` > `**`),
    /// 3. `default`.
    #[must_use]
    pub fn get_policy_for_path(&self, path: &str) -> Arc<DetectionPolicy> {
        if self.use_file_extension_static_detection {
            if let Some(ext) = file_extension(path) {
                if self.static_asset_extensions.iter().any(|e| e == &ext) {
                    if let Some(policy) = self.get(STATIC_POLICY_NAME) {
                        return policy;
                    }
                }
            }
        }

        let mut best: Option<(u8, &str)> = None;
        for (pattern, _) in &self.path_policies {
            if let Some(specificity) = match_specificity(pattern, path) {
                let better = match best {
                    Some((best_specificity, best_pattern)) => {
                        specificity > best_specificity
                            || (specificity == best_specificity && pattern.as_str() > best_pattern)
                    }
                    None => true,
                };
                if better {
                    best = Some((specificity, pattern.as_str()));
                }
            }
        }

        if let Some((_, pattern)) = best {
            if let Some(name) = self.path_policies.iter().find(|(p, _)| p == pattern).map(|(_, n)| n.clone()) {
                if let Some(policy) = self.get(&name) {
                    return policy;
                }
            }
        }

        // A configured path pattern naming an unknown policy, or no match at
        // all, silently resolves to `default` — PolicyMiss per §7.
        self.get(DEFAULT_POLICY_NAME)
            .expect("default policy must always be registered")
    }
}

/// Higher is more specific: exact match (2) > single-segment `*` (1) >
/// suffix `**` (0). `None` means no match at all.
fn match_specificity(pattern: &str, path: &str) -> Option<u8> {
    if pattern == path {
        return Some(2);
    }
    let pattern_segments: Vec<&str> = pattern.split('/').collect();
    let path_segments: Vec<&str> = path.split('/').collect();

    if let Some(prefix) = pattern.strip_suffix("/**") {
        let prefix_segments: Vec<&str> = prefix.split('/').collect();
        if path_segments.len() >= prefix_segments.len()
            && prefix_segments
                .iter()
                .zip(&path_segments)
                .all(|(p, s)| *p == "*" || p == s)
        {
            return Some(0);
        }
        return None;
    }

    if pattern_segments.len() == path_segments.len()
        && pattern_segments
            .iter()
            .zip(&path_segments)
            .all(|(p, s)| *p == "*" || p == s)
        && pattern.contains('*')
    {
        return Some(1);
    }

    None
}

fn file_extension(path: &str) -> Option<String> {
    let without_query = path.split('?').next().unwrap_or(path);
    let name = without_query.rsplit('/').next().unwrap_or(without_query);
    name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
}

fn builtin_policies() -> Vec<DetectionPolicy> {
    vec![
        DetectionPolicy {
            name: DEFAULT_POLICY_NAME.to_string(),
            description: "Balanced thresholds suitable for general traffic.".to_string(),
            fast_path_detectors: vec!["UserAgent".to_string()],
            slow_path_detectors: full_catalog(),
            use_fast_path: true,
            force_slow_path: false,
            escalate_to_ai: false,
            ai_escalation_threshold: 0.7,
            early_exit_threshold: 0.05,
            immediate_block_threshold: 0.95,
            weight_overrides: HashMap::new(),
            transitions: Vec::new(),
        },
        DetectionPolicy {
            name: "strict".to_string(),
            description: "Lower thresholds and no fast-path short-circuit; for sensitive paths.".to_string(),
            fast_path_detectors: vec!["UserAgent".to_string()],
            slow_path_detectors: full_catalog(),
            use_fast_path: true,
            force_slow_path: true,
            escalate_to_ai: true,
            ai_escalation_threshold: 0.5,
            early_exit_threshold: 0.02,
            immediate_block_threshold: 0.8,
            weight_overrides: HashMap::from([("Heuristic".to_string(), 3.0)]),
            transitions: Vec::new(),
        },
        DetectionPolicy {
            name: "relaxed".to_string(),
            description: "Higher thresholds for low-risk, high-traffic paths.".to_string(),
            fast_path_detectors: vec!["UserAgent".to_string()],
            slow_path_detectors: full_catalog(),
            use_fast_path: true,
            force_slow_path: false,
            escalate_to_ai: false,
            ai_escalation_threshold: 0.9,
            early_exit_threshold: 0.15,
            immediate_block_threshold: 0.98,
            weight_overrides: HashMap::new(),
            transitions: Vec::new(),
        },
        DetectionPolicy {
            name: "allowVerifiedBots".to_string(),
            description: "Like default, but a verified good bot is always allowed regardless of subsequent score.".to_string(),
            fast_path_detectors: vec!["UserAgent".to_string()],
            slow_path_detectors: full_catalog(),
            use_fast_path: true,
            force_slow_path: false,
            escalate_to_ai: false,
            ai_escalation_threshold: 0.7,
            early_exit_threshold: 0.05,
            immediate_block_threshold: 0.95,
            weight_overrides: HashMap::new(),
            transitions: vec![PolicyTransition::on_signal(
                crate::core::signals::IS_VERIFIED_BOT,
                PolicyAction::Allow,
            )],
        },
        DetectionPolicy {
            name: STATIC_POLICY_NAME.to_string(),
            description: "Static assets: no contributor pipeline, always allowed.".to_string(),
            fast_path_detectors: Vec::new(),
            slow_path_detectors: Vec::new(),
            use_fast_path: true,
            force_slow_path: false,
            escalate_to_ai: false,
            ai_escalation_threshold: 1.0,
            early_exit_threshold: 1.0,
            immediate_block_threshold: 1.0,
            weight_overrides: HashMap::new(),
            transitions: Vec::new(),
        },
    ]
}

fn full_catalog() -> Vec<String> {
    [
        "SecurityTool",
        "AiScraper",
        "UserAgent",
        "Http2Fingerprint",
        "TransportProtocol",
        "Http3Fingerprint",
        "ProjectHoneypot",
        "AccountTakeover",
        "ReputationBias",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_registered_and_cannot_be_removed() {
        let registry = PolicyRegistry::with_builtins(&PolicyEngineConfig::default());
        assert!(registry.get("default").is_some());
        assert!(registry.get("DEFAULT").is_some());
        assert!(registry.remove("default").is_err());
    }

    #[test]
    fn static_extension_routes_to_static_policy() {
        let registry = PolicyRegistry::with_builtins(&PolicyEngineConfig::default());
        let policy = registry.get_policy_for_path("/assets/app.js?v=2");
        assert_eq!(policy.name, "static");
    }

    #[test]
    fn unmatched_path_falls_back_to_default() {
        let registry = PolicyRegistry::with_builtins(&PolicyEngineConfig::default());
        let policy = registry.get_policy_for_path("/api/users");
        assert_eq!(policy.name, "default");
    }

    #[test]
    fn exact_path_beats_wildcard() {
        let mut config = PolicyEngineConfig::default();
        config.use_file_extension_static_detection = false;
        config.path_policies.insert("/login".to_string(), "strict".to_string());
        config.path_policies.insert("/*".to_string(), "relaxed".to_string());
        let registry = PolicyRegistry::with_builtins(&config);
        assert_eq!(registry.get_policy_for_path("/login").name, "strict");
        assert_eq!(registry.get_policy_for_path("/other").name, "relaxed");
    }

    #[test]
    fn suffix_wildcard_matches_any_depth() {
        let mut config = PolicyEngineConfig::default();
        config.use_file_extension_static_detection = false;
        config.path_policies.insert("/admin/**".to_string(), "strict".to_string());
        let registry = PolicyRegistry::with_builtins(&config);
        assert_eq!(registry.get_policy_for_path("/admin/users/42").name, "strict");
    }

    #[test]
    fn replacing_a_policy_is_atomic_by_name() {
        let registry = PolicyRegistry::with_builtins(&PolicyEngineConfig::default());
        let mut custom = (*registry.get("strict").unwrap()).clone();
        custom.description = "replaced".to_string();
        registry.register(custom);
        assert_eq!(registry.get("strict").unwrap().description, "replaced");
    }
}
