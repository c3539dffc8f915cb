//! Scheduler configuration and validation.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```
//! use netpilot_logic::config::PilotConfig;
//!
//! let config = PilotConfig::from_json(r#"{ "hack_fraction": 0.5 }"#).unwrap();
//! assert_eq!(config.hack_fraction, 0.5);
//! assert_eq!(config.security_threshold, 0.9);
//! ```

use serde::{Deserialize, Serialize};

/// Worker scripts started by the allocator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scripts {
    pub weaken: String,
    pub grow: String,
    pub hack: String,
    pub share: String,
}

impl Default for Scripts {
    fn default() -> Self {
        Self {
            weaken: "/lib/weaken.js".into(),
            grow: "/lib/grow.js".into(),
            hack: "/lib/hack.js".into(),
            share: "/lib/share.js".into(),
        }
    }
}

/// Tunables for the scheduler loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PilotConfig {
    pub scripts: Scripts,
    /// Weaken while `min_security < security * security_threshold`.
    pub security_threshold: f64,
    /// Grow while `money < max_money * money_threshold`.
    pub money_threshold: f64,
    /// Share of current money taken per hack cycle.
    pub hack_fraction: f64,
    /// Stand-in for current money when a target is empty.
    pub grow_money_floor: f64,
    /// RAM kept free on home.
    pub home_reserve_ram: f64,
    /// Free RAM above which the share filler is started.
    pub share_threshold: f64,
    pub share_pause_ms: u64,
    pub poll_interval_ms: u64,
    pub state_file: String,
    /// Servers never considered as targets.
    pub ignored: Vec<String>,
    /// Targets need more max money than this.
    pub min_target_money: f64,
    /// Upper bound for the weaken thread search.
    pub max_weaken_threads: u64,
    /// Skip the per-server escalation messages on level changes.
    pub quiet_escalation: bool,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            scripts: Scripts::default(),
            security_threshold: 0.9,
            money_threshold: 0.9,
            hack_fraction: 0.75,
            grow_money_floor: 100_000.0,
            home_reserve_ram: 32.0,
            share_threshold: 20_000.0,
            share_pause_ms: 5_300,
            poll_interval_ms: 5_000,
            state_file: "/tmp/hackingpilot.txt".into(),
            ignored: [
                "home",
                "darkweb",
                "CSEC",
                "avmnite-02h",
                "I.I.I.I",
                "run4theh111z",
                "The-Cave",
                "w0r1d_d43m0n",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_target_money: 0.0,
            max_weaken_threads: 100_000,
            quiet_escalation: false,
        }
    }
}

/// A rejected configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    SecurityThresholdOutOfRange(f64),
    MoneyThresholdOutOfRange(f64),
    HackFractionOutOfRange(f64),
    NonPositiveMoneyFloor(f64),
    NegativeHomeReserve(f64),
    ZeroPollInterval,
    ZeroWeakenCap,
    EmptyScriptPath(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::SecurityThresholdOutOfRange(v) => {
                write!(f, "security_threshold must be in (0, 1], got {}", v)
            }
            ConfigError::MoneyThresholdOutOfRange(v) => {
                write!(f, "money_threshold must be in (0, 1], got {}", v)
            }
            ConfigError::HackFractionOutOfRange(v) => {
                write!(f, "hack_fraction must be in (0, 1], got {}", v)
            }
            ConfigError::NonPositiveMoneyFloor(v) => {
                write!(f, "grow_money_floor must be positive, got {}", v)
            }
            ConfigError::NegativeHomeReserve(v) => {
                write!(f, "home_reserve_ram must not be negative, got {}", v)
            }
            ConfigError::ZeroPollInterval => write!(f, "poll_interval_ms must be positive"),
            ConfigError::ZeroWeakenCap => write!(f, "max_weaken_threads must be positive"),
            ConfigError::EmptyScriptPath(which) => write!(f, "script path '{}' is empty", which),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Failure to turn JSON text into a usable config.
#[derive(Debug)]
pub enum ConfigLoadError {
    Json(serde_json::Error),
    Invalid(Vec<ConfigError>),
}

impl From<serde_json::Error> for ConfigLoadError {
    fn from(e: serde_json::Error) -> Self {
        ConfigLoadError::Json(e)
    }
}

impl std::fmt::Display for ConfigLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigLoadError::Json(e) => write!(f, "config parse error: {}", e),
            ConfigLoadError::Invalid(errors) => {
                write!(f, "invalid config: ")?;
                for (i, e) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigLoadError {}

fn in_unit_range(v: f64) -> bool {
    v > 0.0 && v <= 1.0
}

/// Check a config. Returns every problem found, empty when valid.
pub fn validate_config(config: &PilotConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    if !in_unit_range(config.security_threshold) {
        errors.push(ConfigError::SecurityThresholdOutOfRange(config.security_threshold));
    }
    if !in_unit_range(config.money_threshold) {
        errors.push(ConfigError::MoneyThresholdOutOfRange(config.money_threshold));
    }
    if !in_unit_range(config.hack_fraction) {
        errors.push(ConfigError::HackFractionOutOfRange(config.hack_fraction));
    }
    if !(config.grow_money_floor > 0.0) {
        errors.push(ConfigError::NonPositiveMoneyFloor(config.grow_money_floor));
    }
    if config.home_reserve_ram < 0.0 {
        errors.push(ConfigError::NegativeHomeReserve(config.home_reserve_ram));
    }
    if config.poll_interval_ms == 0 {
        errors.push(ConfigError::ZeroPollInterval);
    }
    if config.max_weaken_threads == 0 {
        errors.push(ConfigError::ZeroWeakenCap);
    }

    let scripts = [
        ("weaken", &config.scripts.weaken),
        ("grow", &config.scripts.grow),
        ("hack", &config.scripts.hack),
        ("share", &config.scripts.share),
    ];
    for (which, path) in scripts {
        if path.trim().is_empty() {
            errors.push(ConfigError::EmptyScriptPath(which));
        }
    }

    errors
}

impl PilotConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(text: &str) -> Result<Self, ConfigLoadError> {
        let config: PilotConfig = serde_json::from_str(text)?;
        let errors = validate_config(&config);
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigLoadError::Invalid(errors))
        }
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored.iter().any(|i| i == name)
    }
}
