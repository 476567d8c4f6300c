//! `retrykit` command line
//!
//! ## Commands
//!
//! - `retrykit schedule [--json]`: print the cooldown after each failed attempt
//! - `retrykit probe <URL>`: GET a URL under a retry controller
//! - `retrykit config`: print the effective settings as TOML
//!
//! ## Exit Codes
//!
//! - 0: Success
//! - 1: Probe gave up after max attempts
//! - 2: Setup error (arguments, settings, HTTP client)

pub mod probe;
pub mod render;
pub mod schedule;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use retrykit_controller::StrategyKind;
use retrykit_controller::config::{ConfigLoader, RetrySettings};

pub use probe::{ProbeArgs, ProbeOutcome, run_probe};
pub use schedule::{ScheduleArgs, render_schedule};

/// Retry controller driver
#[derive(Debug, Parser)]
#[command(name = "retrykit", version, about)]
pub struct Cli {
    /// Settings file (defaults to ./retrykit.toml, then the user config dir)
    #[arg(long = "config", short = 'c', value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: SettingsOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the backoff schedule for the effective settings
    Schedule(ScheduleArgs),

    /// Probe a URL, retrying failures with cooldown
    Probe(ProbeArgs),

    /// Print the effective settings as TOML
    Config,
}

/// Flags that take precedence over file and environment settings
#[derive(Debug, Default, Clone, Args)]
pub struct SettingsOverrides {
    /// Attempts before giving up
    #[arg(long = "max-attempts", global = true, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Base cooldown in milliseconds
    #[arg(long = "cooldown-ms", global = true, value_name = "MS")]
    pub cooldown_ms: Option<u64>,

    /// constant, linear, exponential or immediate
    #[arg(long = "strategy", global = true, value_name = "STRATEGY")]
    pub strategy: Option<StrategyKind>,

    /// Growth factor for the exponential strategy
    #[arg(long = "multiplier", global = true, value_name = "FACTOR")]
    pub multiplier: Option<f64>,

    /// Start with caller-controlled attempt counting at this value
    #[arg(long = "current-attempt", global = true, value_name = "N")]
    pub current_attempt: Option<u32>,

    /// Countdown granularity in milliseconds
    #[arg(long = "tick-ms", global = true, value_name = "MS")]
    pub tick_ms: Option<u64>,
}

impl SettingsOverrides {
    pub fn apply(&self, settings: &mut RetrySettings) {
        if let Some(max_attempts) = self.max_attempts {
            settings.max_attempts = max_attempts;
        }
        if let Some(cooldown_ms) = self.cooldown_ms {
            settings.cooldown_ms = cooldown_ms;
        }
        if let Some(strategy) = self.strategy {
            settings.retry_strategy = strategy;
        }
        if let Some(multiplier) = self.multiplier {
            settings.backoff_multiplier = multiplier;
        }
        if self.current_attempt.is_some() {
            settings.current_attempt = self.current_attempt;
        }
        if let Some(tick_ms) = self.tick_ms {
            settings.tick_interval_ms = tick_ms;
        }
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        let settings = self.load_settings()?;
        match self.command {
            Command::Schedule(args) => schedule::run(&settings, &args),
            Command::Probe(args) => probe::run(&settings, &args).await,
            Command::Config => {
                print!(
                    "{}",
                    toml::to_string_pretty(&settings).context("failed to render settings")?
                );
                Ok(ExitCode::SUCCESS)
            }
        }
    }

    /// Settings from file and environment, then command-line overrides.
    ///
    /// Overrides bypass the schema, so the result is checked again by
    /// converting it into a controller configuration.
    pub fn load_settings(&self) -> anyhow::Result<RetrySettings> {
        let mut settings = match &self.config {
            Some(path) => ConfigLoader::new().with_file(path).load(),
            None => ConfigLoader::load_default(),
        }
        .context("failed to load retry settings")?;

        self.overrides.apply(&mut settings);
        settings
            .to_controller_config()
            .context("invalid retry settings")?;
        Ok(settings)
    }
}
