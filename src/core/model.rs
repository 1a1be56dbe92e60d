//! Shared data model: signal values, contributions, and the aggregated
//! detection result.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Typed value stored in the request blackboard's signal map.
///
/// A Rust implementation cannot leave a blackboard value arbitrary the way a
/// dynamically-typed host would; this is the closed set contributors and the
/// policy evaluator actually need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    Bool(bool),
    Float(f64),
    Int(i64),
    Str(String),
    StrList(Vec<String>),
}

impl SignalValue {
    /// Interpret the value as a boolean, matching the policy evaluator's
    /// "present and, if boolean, equals true" rule from the transition
    /// matcher.
    #[must_use]
    pub fn as_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Float(f) => *f != 0.0,
            Self::Int(i) => *i != 0,
            Self::Str(s) => !s.is_empty(),
            Self::StrList(list) => !list.is_empty(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl From<bool> for SignalValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for SignalValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for SignalValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<f64> for SignalValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Coarse classification of a detected non-human actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum BotType {
    GoodBot,
    BadBot,
    AiBot,
    MaliciousBot,
    Unknown,
}

/// What an early-exit contribution forces the final verdict to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EarlyExitVerdict {
    VerifiedBadBot,
    VerifiedGoodBot,
}

/// One contributor's output against the blackboard.
///
/// A contribution with `confidence_delta == 0.0` and a reason like "no
/// signals" is a positive affirmation that the contributor ran and found
/// nothing — not the absence of a contribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionContribution {
    pub category: String,
    pub reason: String,
    /// In `[-1, 1]`; positive pushes the verdict bot-ward.
    pub confidence_delta: f64,
    pub bot_name: Option<String>,
    pub bot_type: Option<BotType>,
    pub signals: HashMap<String, SignalValue>,
    pub trigger_early_exit: bool,
    pub early_exit_verdict: Option<EarlyExitVerdict>,
}

impl DetectionContribution {
    /// A "ran, found nothing" contribution — zero delta, positive affirmation.
    #[must_use]
    pub fn neutral(category: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            reason: reason.into(),
            confidence_delta: 0.0,
            bot_name: None,
            bot_type: None,
            signals: HashMap::new(),
            trigger_early_exit: false,
            early_exit_verdict: None,
        }
    }

    /// A contribution that forces the orchestrator to stop running waves.
    #[must_use]
    pub fn early_exit(
        category: impl Into<String>,
        reason: impl Into<String>,
        confidence_delta: f64,
        verdict: EarlyExitVerdict,
        bot_type: BotType,
    ) -> Self {
        Self {
            category: category.into(),
            reason: reason.into(),
            confidence_delta: confidence_delta.clamp(-1.0, 1.0),
            bot_name: None,
            bot_type: Some(bot_type),
            signals: HashMap::new(),
            trigger_early_exit: true,
            early_exit_verdict: Some(verdict),
        }
    }

    #[must_use]
    pub fn with_signal(mut self, key: impl Into<String>, value: impl Into<SignalValue>) -> Self {
        self.signals.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_bot_name(mut self, name: impl Into<String>) -> Self {
        self.bot_name = Some(name.into());
        self
    }
}

/// Fast-path UA classifier output — cheap, first-pass only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorResult {
    pub confidence: f64,
    pub bot_type: Option<BotType>,
    pub bot_name: Option<String>,
    pub reasons: Vec<String>,
}

impl DetectorResult {
    #[must_use]
    pub fn human(reason: impl Into<String>) -> Self {
        Self {
            confidence: 0.0,
            bot_type: None,
            bot_name: None,
            reasons: vec![reason.into()],
        }
    }
}

/// One line of the final result's ordered reason trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonEntry {
    pub category: String,
    pub detail: String,
    pub delta: f64,
}

/// Final aggregated output of a slow-path run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub is_bot: bool,
    pub confidence_score: f64,
    pub bot_type: Option<BotType>,
    pub bot_name: Option<String>,
    pub reasons: Vec<ReasonEntry>,
    pub signals: HashMap<String, SignalValue>,
    pub processing_time_ms: f64,
}
