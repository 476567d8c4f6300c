use crate::backoff::{BackoffStrategy, StrategyKind};
use crate::config::error::{ConfigError, Result};
use crate::options::{
    ControllerConfig, DEFAULT_COOLDOWN, DEFAULT_MAX_ATTEMPTS, DEFAULT_TICK_INTERVAL,
};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides, e.g. `RETRYKIT_MAX_ATTEMPTS=5`.
pub const ENV_PREFIX: &str = "RETRYKIT";

/// Retry settings as they appear in `retrykit.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Attempts before the controller gives up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base cooldown in milliseconds
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    #[serde(default)]
    pub retry_strategy: StrategyKind,

    /// Only used by the exponential strategy
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Present when the caller owns the attempt counter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_attempt: Option<u32>,

    #[serde(default)]
    pub auto_retry: bool,

    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Validate against the embedded JSON schema on load
    #[serde(default = "default_true")]
    pub schema_validation: bool,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_cooldown_ms() -> u64 {
    DEFAULT_COOLDOWN.as_millis() as u64
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL.as_millis() as u64
}
fn default_true() -> bool {
    true
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            cooldown_ms: default_cooldown_ms(),
            retry_strategy: StrategyKind::default(),
            backoff_multiplier: default_backoff_multiplier(),
            current_attempt: None,
            auto_retry: false,
            tick_interval_ms: default_tick_interval_ms(),
            schema_validation: default_true(),
        }
    }
}

impl RetrySettings {
    pub fn strategy(&self) -> BackoffStrategy {
        BackoffStrategy::from_kind(self.retry_strategy, self.backoff_multiplier)
    }

    /// Convert into a validated [`ControllerConfig`].
    pub fn to_controller_config(&self) -> Result<ControllerConfig> {
        let config = match self.current_attempt {
            Some(current) => ControllerConfig::controlled(current, self.max_attempts),
            None => ControllerConfig::uncontrolled(self.max_attempts),
        }
        .cooldown(Duration::from_millis(self.cooldown_ms))
        .strategy(self.strategy())
        .auto_retry(self.auto_retry)
        .tick_interval(Duration::from_millis(self.tick_interval_ms));

        config.validate()?;
        Ok(config)
    }
}

/// Loads [`RetrySettings`] with layered merging
#[derive(Debug)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Defaults, then the config file (if set), then `RETRYKIT_*` variables.
    pub fn load(&self) -> Result<RetrySettings> {
        let mut builder = Config::builder();

        let defaults_json = serde_json::to_string(&RetrySettings::default())?;
        builder = builder.add_source(File::from_str(&defaults_json, config::FileFormat::Json));

        if let Some(ref path) = self.config_path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            builder = builder.add_source(File::from(path.as_ref()));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: RetrySettings = builder.build()?.try_deserialize()?;

        if settings.schema_validation {
            let validator = crate::config::validator::SchemaValidator::new()?;
            validator.validate(&settings)?;
        }

        tracing::debug!(
            path = ?self.config_path,
            max_attempts = settings.max_attempts,
            strategy = %settings.retry_strategy,
            "retry settings loaded"
        );
        Ok(settings)
    }

    /// First existing file among:
    /// 1. `./retrykit.toml`
    /// 2. `<config dir>/retrykit/config.toml`
    /// 3. `~/.retrykit.toml`
    pub fn find_config_file() -> Option<PathBuf> {
        let cwd_config = PathBuf::from("./retrykit.toml");
        if cwd_config.exists() {
            return Some(cwd_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("retrykit").join("config.toml");
            if xdg_config.exists() {
                return Some(xdg_config);
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".retrykit.toml");
            if home_config.exists() {
                return Some(home_config);
            }
        }

        None
    }

    pub fn load_default() -> Result<RetrySettings> {
        let loader = match Self::find_config_file() {
            Some(config_path) => ConfigLoader::new().with_file(config_path),
            None => ConfigLoader::new(),
        };
        loader.load()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
