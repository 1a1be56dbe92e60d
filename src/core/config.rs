//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{BotShieldError, Result};

/// Full engine configuration model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub reputation: ReputationConfig,
    pub fast_path: FastPathConfig,
    pub list_source: ListSourceConfig,
    pub policy: PolicyEngineConfig,
    pub bus: BusConfig,
    pub telemetry: TelemetryConfig,
    pub paths: PathsConfig,
}

/// Compiled pattern-cache tuning (UA regex + CIDR tables).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of compiled UA patterns retained in memory.
    pub max_patterns: usize,
    /// Reject any pattern whose literal source exceeds this length.
    pub max_pattern_len: usize,
    /// Upper bound on a single pattern's compiled program size, used as a
    /// coarse guard against catastrophic-backtracking patterns.
    pub max_compiled_size_bytes: usize,
    /// Maximum CIDR entries retained per list.
    pub max_cidr_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_patterns: 20_000,
            max_pattern_len: 512,
            max_compiled_size_bytes: 1 << 20,
            max_cidr_entries: 200_000,
        }
    }
}

/// Reputation learning-engine knobs (EMA, decay, hysteresis, GC).
///
/// Field names and defaults follow the hysteresis table and decay formulas
/// directly, so the engine's own code can read `config.promote_bad` etc.
/// without a separate internal renaming pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReputationConfig {
    /// Base learning rate fed into the EMA update, before evidence weighting.
    pub learning_rate: f64,
    /// Maximum effective support a pattern's evidence can accumulate to.
    pub max_support: f64,

    /// Neutral -> Suspect score threshold.
    pub promote_suspect: f64,
    /// Neutral -> Suspect support threshold.
    pub promote_suspect_support: f64,
    /// Suspect -> Neutral score threshold (also ConfirmedGood -> Neutral).
    pub demote_neutral: f64,
    /// Suspect -> ConfirmedBad score threshold.
    pub promote_bad: f64,
    /// Suspect -> ConfirmedBad support threshold.
    pub promote_bad_support: f64,
    /// ConfirmedBad -> Suspect score threshold.
    pub demote_bad: f64,
    /// ConfirmedBad -> Suspect support threshold.
    pub demote_bad_support: f64,
    /// Neutral -> ConfirmedGood score threshold.
    pub promote_good: f64,
    /// Neutral -> ConfirmedGood support threshold.
    pub promote_good_support: f64,

    /// Time constant, in hours, for bot-score decay toward the 0.5 prior.
    pub score_tau_hours: f64,
    /// Time constant, in hours, for support decay toward zero.
    pub support_tau_hours: f64,

    /// Days of inactivity before a non-manual entry becomes GC-eligible.
    pub gc_eligible_days: f64,
    /// Support ceiling below which a stale entry is GC-eligible.
    pub gc_support_threshold: f64,
    /// Restrict GC eligibility to entries currently in `Neutral`.
    pub gc_only_neutral: bool,

    /// Access-count threshold marking a cache entry "hot".
    pub hot_key_threshold: u64,
    /// How long a hot-key exemption from cold eviction/GC lasts, in hours.
    pub hot_key_extension_hours: f64,
    /// Capacity of the in-memory hot-key cache fronting the durable store.
    pub hot_cache_capacity: usize,
    /// Interval between write-behind flushes of dirty hot-cache entries.
    pub write_behind_interval_ms: u64,
    /// Minimum occurrences before a `SignatureFeedback` event is emitted.
    pub feedback_min_occurrences: u64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_support: 1_000.0,

            promote_suspect: 0.6,
            promote_suspect_support: 10.0,
            demote_neutral: 0.4,
            promote_bad: 0.9,
            promote_bad_support: 50.0,
            demote_bad: 0.7,
            demote_bad_support: 100.0,
            promote_good: 0.1,
            promote_good_support: 100.0,

            score_tau_hours: 168.0,
            support_tau_hours: 336.0,

            gc_eligible_days: 90.0,
            gc_support_threshold: 1.0,
            gc_only_neutral: true,

            hot_key_threshold: 10,
            hot_key_extension_hours: 24.0,
            hot_cache_capacity: 10_000,
            write_behind_interval_ms: 2_000,
            feedback_min_occurrences: 3,
        }
    }
}

/// Fast-path decider tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FastPathConfig {
    /// Reputation bot-score at or above which the fast path aborts outright.
    pub fast_abort_threshold: f64,
    /// Reputation bot-score at or below which the fast path allows outright.
    pub fast_allow_threshold: f64,
    /// Fraction of fast-path-eligible requests sampled into the slow path
    /// anyway, to keep reputation signal fresh.
    pub sample_rate: f64,
}

impl Default for FastPathConfig {
    fn default() -> Self {
        Self {
            fast_abort_threshold: 0.95,
            fast_allow_threshold: 0.05,
            sample_rate: 0.01,
        }
    }
}

/// Bot-list fetcher/scheduler tuning (contract-level; actual transport is
/// supplied by the caller's `ListSource` implementation).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListSourceConfig {
    pub refresh_interval_secs: u64,
    pub request_timeout_ms: u64,
    pub max_list_bytes: usize,
    pub retry_backoff_ms: u64,
    pub max_retries: u32,
}

impl Default for ListSourceConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 3_600,
            request_timeout_ms: 10_000,
            max_list_bytes: 64 * 1024 * 1024,
            retry_backoff_ms: 500,
            max_retries: 3,
        }
    }
}

/// Policy engine defaults: which builtin policy is active at boot, per-path
/// policy selection, and static-asset short-circuiting (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PolicyEngineConfig {
    /// Name of the policy active at startup; must resolve in the registry.
    pub active_policy: String,
    /// Optional path to a TOML/JSON file of additional custom policies.
    pub custom_policies_file: Option<PathBuf>,
    /// `path pattern -> policy name`. Pattern matching prefers exact over
    /// `*` (single segment) over `**` (any suffix).
    pub path_policies: std::collections::BTreeMap<String, String>,
    /// Whether a static-asset file extension short-circuits to the `static`
    /// policy before `path_policies` is consulted.
    pub use_file_extension_static_detection: bool,
    /// Extensions (without the dot, lowercase) treated as static assets.
    pub static_asset_extensions: Vec<String>,
}

impl Default for PolicyEngineConfig {
    fn default() -> Self {
        Self {
            active_policy: "default".to_string(),
            custom_policies_file: None,
            path_policies: std::collections::BTreeMap::new(),
            use_file_extension_static_detection: true,
            static_asset_extensions: [
                "css", "js", "mjs", "map", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico",
                "woff", "woff2", "ttf", "eot", "mp4", "webm", "pdf", "txt",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }
}

/// Learning bus tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BusConfig {
    /// Bounded channel capacity; publishers drop (never block) when full —
    /// see `LearningBus::try_publish`.
    pub channel_capacity: usize,
    /// Rolling window size, in events, used by the drift handler.
    pub drift_window: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 4_096,
            drift_window: 500,
        }
    }
}

/// Telemetry ring-buffer sizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TelemetryConfig {
    pub ring_buffer_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            ring_buffer_capacity: 10_000,
        }
    }
}

/// Filesystem paths used by the engine's durable stores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub sqlite_db: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[BS-CONFIG] WARNING: HOME not set, falling back to /var/lib/botshield for data paths"
                );
                PathBuf::from("/var/lib/botshield")
            },
            PathBuf::from,
        );
        let (cfg, data) = if home_dir == Path::new("/var/lib/botshield") {
            (PathBuf::from("/etc/botshield/config.toml"), home_dir)
        } else {
            (
                home_dir.join(".config").join("botshield").join("config.toml"),
                home_dir.join(".local").join("share").join("botshield"),
            )
        };
        Self {
            config_file: cfg,
            sqlite_db: data.join("patterns.sqlite3"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from an explicit path, `BOTSHIELD_CONFIG`, or the default
    /// path, then apply environment overrides.
    ///
    /// A missing config file is not an error when resolved implicitly;
    /// defaults are used. An explicitly named missing file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_config = if path.is_none() {
            env::var_os("BOTSHIELD_CONFIG").map(PathBuf::from)
        } else {
            None
        };

        let path_buf = path.map_or_else(
            || env_config.clone().unwrap_or_else(Self::default_path),
            Path::to_path_buf,
        );
        let is_explicit_path = path.is_some() || env_config.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| BotShieldError::Runtime {
                details: format!("reading {}: {source}", path_buf.display()),
            })?;
            toml::from_str(&raw)?
        } else if is_explicit_path {
            return Err(BotShieldError::MissingConfig {
                path: path_buf.display().to_string(),
            });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging/telemetry.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        set_env_f64(
            "BOTSHIELD_REPUTATION_LEARNING_RATE",
            &mut self.reputation.learning_rate,
        )?;
        set_env_f64(
            "BOTSHIELD_REPUTATION_SCORE_TAU_HOURS",
            &mut self.reputation.score_tau_hours,
        )?;
        set_env_f64(
            "BOTSHIELD_REPUTATION_PROMOTE_BAD",
            &mut self.reputation.promote_bad,
        )?;
        set_env_f64(
            "BOTSHIELD_REPUTATION_PROMOTE_BAD_SUPPORT",
            &mut self.reputation.promote_bad_support,
        )?;
        set_env_f64(
            "BOTSHIELD_FAST_PATH_FAST_ABORT_THRESHOLD",
            &mut self.fast_path.fast_abort_threshold,
        )?;
        set_env_f64(
            "BOTSHIELD_FAST_PATH_FAST_ALLOW_THRESHOLD",
            &mut self.fast_path.fast_allow_threshold,
        )?;
        set_env_f64(
            "BOTSHIELD_FAST_PATH_SAMPLE_RATE",
            &mut self.fast_path.sample_rate,
        )?;
        set_env_usize(
            "BOTSHIELD_CACHE_MAX_PATTERNS",
            &mut self.cache.max_patterns,
        )?;
        set_env_u64(
            "BOTSHIELD_LIST_SOURCE_REFRESH_INTERVAL_SECS",
            &mut self.list_source.refresh_interval_secs,
        )?;
        if let Some(raw) = env_var("BOTSHIELD_POLICY_ACTIVE") {
            self.policy.active_policy = raw;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        validate_prob("reputation.promote_bad", self.reputation.promote_bad)?;
        validate_prob("reputation.demote_bad", self.reputation.demote_bad)?;
        validate_prob("reputation.promote_suspect", self.reputation.promote_suspect)?;
        validate_prob("reputation.demote_neutral", self.reputation.demote_neutral)?;
        validate_prob("reputation.promote_good", self.reputation.promote_good)?;
        validate_prob(
            "fast_path.fast_abort_threshold",
            self.fast_path.fast_abort_threshold,
        )?;
        validate_prob(
            "fast_path.fast_allow_threshold",
            self.fast_path.fast_allow_threshold,
        )?;
        validate_prob("fast_path.sample_rate", self.fast_path.sample_rate)?;

        if self.fast_path.fast_allow_threshold >= self.fast_path.fast_abort_threshold {
            return Err(BotShieldError::InvalidConfig {
                details: "fast_path.fast_allow_threshold must be < fast_abort_threshold"
                    .to_string(),
            });
        }
        // Hysteresis invariant (§8): demotion threshold strictly below
        // promotion threshold for the same boundary.
        if self.reputation.demote_bad >= self.reputation.promote_bad {
            return Err(BotShieldError::InvalidConfig {
                details: "reputation.demote_bad must be < promote_bad".to_string(),
            });
        }
        if self.reputation.demote_neutral >= self.reputation.promote_suspect {
            return Err(BotShieldError::InvalidConfig {
                details: "reputation.demote_neutral must be < promote_suspect".to_string(),
            });
        }
        if self.reputation.score_tau_hours <= 0.0 || self.reputation.support_tau_hours <= 0.0 {
            return Err(BotShieldError::InvalidConfig {
                details: "reputation.score_tau_hours and support_tau_hours must be > 0".to_string(),
            });
        }
        if self.reputation.learning_rate <= 0.0 || self.reputation.learning_rate > 1.0 {
            return Err(BotShieldError::InvalidConfig {
                details: format!(
                    "reputation.learning_rate must be in (0, 1], got {}",
                    self.reputation.learning_rate
                ),
            });
        }
        if self.cache.max_patterns == 0 {
            return Err(BotShieldError::InvalidConfig {
                details: "cache.max_patterns must be >= 1".to_string(),
            });
        }
        if self.bus.channel_capacity == 0 {
            return Err(BotShieldError::InvalidConfig {
                details: "bus.channel_capacity must be >= 1".to_string(),
            });
        }
        if self.policy.active_policy.trim().is_empty() {
            return Err(BotShieldError::InvalidConfig {
                details: "policy.active_policy must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn validate_prob(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(BotShieldError::InvalidConfig {
            details: format!("{name} must be in [0,1], got {value}"),
        });
    }
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_env_f64(name: &str, slot: &mut f64) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<f64>().map_err(|error| BotShieldError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn set_env_u64(name: &str, slot: &mut u64) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<u64>().map_err(|error| BotShieldError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn set_env_usize(name: &str, slot: &mut usize) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw
            .parse::<usize>()
            .map_err(|error| BotShieldError::ConfigParse {
                context: "env",
                details: format!("{name}={raw:?}: {error}"),
            })?;
    }
    Ok(())
}
