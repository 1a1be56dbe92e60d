//! BS-prefixed error types with structured error codes.

#![allow(missing_docs)]

use thiserror::Error;

/// Shared `Result` alias for the crate.
pub type Result<T> = std::result::Result<T, BotShieldError>;

/// Top-level error type for the bot-detection decision engine.
///
/// Per spec, contributor failures, invalid patterns, and transient fetch
/// failures never reach the caller as `Err` — they are absorbed into audit
/// contributions or fallback behavior (see `core::errors` taxonomy in
/// SPEC_FULL.md §6). This enum exists for the genuinely exceptional cases:
/// bad configuration, store corruption, admin-action validation.
#[derive(Debug, Error)]
pub enum BotShieldError {
    #[error("[BS-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[BS-1002] missing configuration file: {path}")]
    MissingConfig { path: String },

    #[error("[BS-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[BS-2001] unknown policy: {name}")]
    UnknownPolicy { name: String },

    #[error("[BS-2002] policy transition loop detected starting at: {name}")]
    PolicyLoop { name: String },

    #[error("[BS-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[BS-2102] SQL failure in {context}: {details}")]
    Sql {
        context: &'static str,
        details: String,
    },

    #[error("[BS-2103] pattern store row missing expected column: {column}")]
    StoreSchema { column: &'static str },

    #[error("[BS-3001] invalid regex pattern {pattern:?}: {details}")]
    InvalidPattern { pattern: String, details: String },

    #[error("[BS-3002] invalid CIDR literal {cidr:?}: {details}")]
    InvalidCidr { cidr: String, details: String },

    #[error("[BS-3900] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[BS-3901] runtime failure: {details}")]
    Runtime { details: String },
}

impl BotShieldError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "BS-1001",
            Self::MissingConfig { .. } => "BS-1002",
            Self::ConfigParse { .. } => "BS-1003",
            Self::UnknownPolicy { .. } => "BS-2001",
            Self::PolicyLoop { .. } => "BS-2002",
            Self::Serialization { .. } => "BS-2101",
            Self::Sql { .. } => "BS-2102",
            Self::StoreSchema { .. } => "BS-2103",
            Self::InvalidPattern { .. } => "BS-3001",
            Self::InvalidCidr { .. } => "BS-3002",
            Self::ChannelClosed { .. } => "BS-3900",
            Self::Runtime { .. } => "BS-3901",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Sql { .. } | Self::ChannelClosed { .. } | Self::Runtime { .. })
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for BotShieldError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for BotShieldError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for BotShieldError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<regex::Error> for BotShieldError {
    fn from(value: regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: String::new(),
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_have_bs_prefix() {
        let errors: Vec<BotShieldError> = vec![
            BotShieldError::InvalidConfig { details: String::new() },
            BotShieldError::Runtime { details: String::new() },
            BotShieldError::UnknownPolicy { name: "x".into() },
        ];
        for err in &errors {
            assert!(err.code().starts_with("BS-"), "code {} must start with BS-", err.code());
        }
    }

    #[test]
    fn display_includes_code_and_details() {
        let err = BotShieldError::InvalidConfig { details: "bad value".to_string() };
        let msg = err.to_string();
        assert!(msg.contains("BS-1001"));
        assert!(msg.contains("bad value"));
    }

    #[test]
    fn retryable_classification() {
        assert!(BotShieldError::ChannelClosed { component: "bus" }.is_retryable());
        assert!(!BotShieldError::InvalidConfig { details: String::new() }.is_retryable());
        assert!(!BotShieldError::UnknownPolicy { name: String::new() }.is_retryable());
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: BotShieldError = json_err.into();
        assert_eq!(err.code(), "BS-2101");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: BotShieldError = toml_err.into();
        assert_eq!(err.code(), "BS-1003");
    }
}
