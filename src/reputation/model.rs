//! Reputation data model: `PatternReputation`, its state machine, and the
//! type/state enums it's built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// What kind of observation a pattern represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PatternType {
    UserAgent,
    Ip,
    Fingerprint,
    Behavior,
    HeaderMix,
}

impl PatternType {
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::UserAgent => "ua",
            Self::Ip => "ip",
            Self::Fingerprint => "fp",
            Self::Behavior => "bh",
            Self::HeaderMix => "hm",
        }
    }
}

/// Hysteretic state of a learned pattern's reputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PatternState {
    Neutral,
    Suspect,
    ConfirmedBad,
    ConfirmedGood,
    ManuallyBlocked,
    ManuallyAllowed,
}

impl PatternState {
    #[must_use]
    pub fn is_manual(self) -> bool {
        matches!(self, Self::ManuallyBlocked | Self::ManuallyAllowed)
    }
}

/// Stable `{prefix}:{sha256-hex-prefix}` identifier for a raw observed
/// value (a UA string, an IP literal, a fingerprint blob). Hashing keeps the
/// cache/store keyspace a fixed width regardless of input length and avoids
/// storing raw UAs as primary keys.
#[must_use]
pub fn compute_pattern_id(pattern_type: PatternType, raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(16).map(|b| format!("{b:02x}")).collect();
    format!("{}:{}", pattern_type.prefix(), hex)
}

/// Per-pattern online belief: `(bot_score, support, state)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternReputation {
    /// Stable `{type}:{hash-or-cidr}` identifier.
    pub pattern_id: String,
    pub pattern_type: PatternType,
    pub pattern: String,
    /// 0 ⇒ human, 1 ⇒ bot, 0.5 ⇒ neutral.
    pub bot_score: f64,
    /// Non-negative effective sample count, capped at `max_support`.
    pub support: f64,
    pub state: PatternState,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub state_changed_at: DateTime<Utc>,
    pub is_manual: bool,
    pub notes: Option<String>,
}

impl PatternReputation {
    #[must_use]
    pub fn new(pattern_id: impl Into<String>, pattern_type: PatternType, pattern: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            pattern_id: pattern_id.into(),
            pattern_type,
            pattern: pattern.into(),
            bot_score: 0.5,
            support: 0.0,
            state: PatternState::Neutral,
            first_seen: now,
            last_seen: now,
            state_changed_at: now,
            is_manual: false,
            notes: None,
        }
    }

    /// `min(1, support/100)`.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        (self.support / 100.0).min(1.0)
    }

    #[must_use]
    pub fn can_trigger_fast_abort(&self) -> bool {
        matches!(self.state, PatternState::ConfirmedBad | PatternState::ManuallyBlocked)
    }

    #[must_use]
    pub fn can_trigger_fast_allow(&self) -> bool {
        matches!(self.state, PatternState::ConfirmedGood | PatternState::ManuallyAllowed)
    }

    /// Weight fed into the fast-path decider, per the state table in §4.4.
    #[must_use]
    pub fn fast_path_weight(&self) -> f64 {
        match self.state {
            PatternState::ConfirmedBad => (self.bot_score * 0.6).min(0.5),
            PatternState::Suspect => (self.bot_score * 0.3).min(0.25),
            PatternState::Neutral => self.bot_score * 0.05,
            PatternState::ConfirmedGood => -0.2,
            PatternState::ManuallyBlocked => 1.0,
            PatternState::ManuallyAllowed => -1.0,
        }
    }
}
