use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RecollectConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub decay: DecayConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub log_level: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

/// Tier promotion, decay and eviction policy knobs.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DecayConfig {
    /// Idle hours after which a working node may move to short-term.
    pub working_memory_threshold_hours: u64,
    /// Idle days after which a short-term node may move to long-term.
    pub short_term_threshold_days: u64,
    /// Fraction of activation a long-term node loses on each run that finds it idle
    /// for at least a day. Not scaled by elapsed time.
    pub long_term_decay_rate: f64,
    /// Exempt sensitive nodes from decay and eviction.
    pub sensitive_memory_protection: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub tick_interval_secs: u64,
    pub persist_schedules: bool,
}

impl Default for RecollectConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            decay: DecayConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            log_level: "info".into(),
            host: "127.0.0.1".into(),
            port: 7431,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_recollect_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            working_memory_threshold_hours: 6,
            short_term_threshold_days: 7,
            long_term_decay_rate: 0.02,
            sensitive_memory_protection: true,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_secs: 60,
            persist_schedules: false,
        }
    }
}

/// Returns `~/.recollect/`, falling back to `./.recollect` when no home directory is known.
pub fn default_recollect_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".recollect")
}

/// Returns the default config file path: `~/.recollect/config.toml`
pub fn default_config_path() -> PathBuf {
    default_recollect_dir().join("config.toml")
}

impl RecollectConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            RecollectConfig::default()
        };

        config.apply_env_overrides();
        config.decay.validate()?;
        Ok(config)
    }

    /// Apply `RECOLLECT_*` environment variable overrides.
    ///
    /// Unparseable numeric or boolean values are logged and ignored.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RECOLLECT_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("RECOLLECT_LOG_LEVEL") {
            self.server.log_level = val;
        }
        override_parsed(
            "RECOLLECT_WORKING_MEMORY_THRESHOLD_HOURS",
            &mut self.decay.working_memory_threshold_hours,
        );
        override_parsed(
            "RECOLLECT_SHORT_TERM_THRESHOLD_DAYS",
            &mut self.decay.short_term_threshold_days,
        );
        override_parsed(
            "RECOLLECT_LONG_TERM_DECAY_RATE",
            &mut self.decay.long_term_decay_rate,
        );
        override_parsed(
            "RECOLLECT_SENSITIVE_MEMORY_PROTECTION",
            &mut self.decay.sensitive_memory_protection,
        );
        override_parsed(
            "RECOLLECT_TICK_INTERVAL_SECS",
            &mut self.scheduler.tick_interval_secs,
        );
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

impl DecayConfig {
    /// Reject rates outside `[0.0, 1.0]`.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.long_term_decay_rate),
            "decay.long_term_decay_rate must be between 0.0 and 1.0, got {}",
            self.long_term_decay_rate
        );
        Ok(())
    }
}

fn override_parsed<T: std::str::FromStr>(key: &str, slot: &mut T) {
    let Ok(raw) = std::env::var(key) else {
        return;
    };
    match raw.parse::<T>() {
        Ok(val) => *slot = val,
        Err(_) => warn!(key, value = %raw, "ignoring unparseable env override"),
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
