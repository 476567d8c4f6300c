//! `retrykit schedule`

use std::process::ExitCode;
use std::time::Duration;

use clap::Args;
use retrykit_controller::config::RetrySettings;
use retrykit_controller::{BackoffStrategy, StrategyKind};

#[derive(Debug, Clone, Args)]
pub struct ScheduleArgs {
    /// Output as JSON instead of text
    #[arg(long = "json", short = 'j')]
    pub json: bool,
}

pub(crate) fn run(settings: &RetrySettings, args: &ScheduleArgs) -> anyhow::Result<ExitCode> {
    if args.json {
        let delays_ms: Vec<u64> = delays(settings)
            .iter()
            .map(|(_, delay)| delay.as_millis() as u64)
            .collect();
        let json = serde_json::json!({
            "strategy": settings.retry_strategy.as_str(),
            "cooldown_ms": settings.cooldown_ms,
            "max_attempts": settings.max_attempts,
            "first_attempt": first_attempt(settings),
            "delays_ms": delays_ms,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        for line in render_schedule(settings) {
            println!("{line}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// The attempt the controller runs next. A caller-supplied counter of `n`
/// means attempts `1..=n` are already spent.
fn first_attempt(settings: &RetrySettings) -> u32 {
    settings.current_attempt.unwrap_or(0).saturating_add(1)
}

/// Cooldowns that actually occur, keyed by the failed attempt that starts
/// them: one per remaining attempt except the last.
fn delays(settings: &RetrySettings) -> Vec<(u32, Duration)> {
    let attempts = first_attempt(settings)..settings.max_attempts;
    let delays = settings
        .strategy()
        .schedule(Duration::from_millis(settings.cooldown_ms), attempts.clone());
    attempts.zip(delays).collect()
}

pub fn render_schedule(settings: &RetrySettings) -> Vec<String> {
    let mut lines = Vec::new();
    match settings.strategy() {
        BackoffStrategy::Exponential { multiplier } => lines.push(format!(
            "strategy: {} (multiplier {multiplier})",
            StrategyKind::Exponential
        )),
        strategy => lines.push(format!("strategy: {}", strategy.kind())),
    }
    lines.push(format!("base cooldown: {}ms", settings.cooldown_ms));

    if first_attempt(settings) > settings.max_attempts {
        lines.push("no attempts remaining".to_string());
        return lines;
    }
    for (attempt, delay) in delays(settings) {
        if delay.is_zero() {
            lines.push(format!("attempt {attempt} failed -> retry immediately"));
        } else {
            lines.push(format!(
                "attempt {attempt} failed -> wait {}ms",
                delay.as_millis()
            ));
        }
    }
    lines.push(format!(
        "attempt {} failed -> max attempts reached",
        settings.max_attempts
    ));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn exponential_schedule_is_capped() {
        let settings = RetrySettings {
            max_attempts: 7,
            ..RetrySettings::default()
        };

        assert_eq!(
            vec![
                "strategy: exponential (multiplier 2)",
                "base cooldown: 1000ms",
                "attempt 1 failed -> wait 1000ms",
                "attempt 2 failed -> wait 2000ms",
                "attempt 3 failed -> wait 4000ms",
                "attempt 4 failed -> wait 8000ms",
                "attempt 5 failed -> wait 16000ms",
                "attempt 6 failed -> wait 30000ms",
                "attempt 7 failed -> max attempts reached",
            ],
            render_schedule(&settings)
        );
    }

    #[test]
    fn schedule_starts_after_the_current_attempt() {
        let settings = RetrySettings {
            max_attempts: 5,
            current_attempt: Some(2),
            ..RetrySettings::default()
        };

        assert_eq!(
            vec![
                "strategy: exponential (multiplier 2)",
                "base cooldown: 1000ms",
                "attempt 3 failed -> wait 4000ms",
                "attempt 4 failed -> wait 8000ms",
                "attempt 5 failed -> max attempts reached",
            ],
            render_schedule(&settings)
        );
    }

    #[test]
    fn schedule_at_ceiling_has_nothing_left() {
        let settings = RetrySettings {
            current_attempt: Some(3),
            ..RetrySettings::default()
        };

        assert_eq!(
            vec![
                "strategy: exponential (multiplier 2)",
                "base cooldown: 1000ms",
                "no attempts remaining",
            ],
            render_schedule(&settings)
        );
    }

    #[test]
    fn immediate_schedule_has_no_waits() {
        let settings = RetrySettings {
            retry_strategy: StrategyKind::Immediate,
            ..RetrySettings::default()
        };

        assert_eq!(
            vec![
                "strategy: immediate",
                "base cooldown: 1000ms",
                "attempt 1 failed -> retry immediately",
                "attempt 2 failed -> retry immediately",
                "attempt 3 failed -> max attempts reached",
            ],
            render_schedule(&settings)
        );
    }

    #[test]
    fn single_attempt_has_no_cooldown() {
        let settings = RetrySettings {
            max_attempts: 1,
            retry_strategy: StrategyKind::Linear,
            ..RetrySettings::default()
        };

        assert_eq!(
            vec![
                "strategy: linear",
                "base cooldown: 1000ms",
                "attempt 1 failed -> max attempts reached",
            ],
            render_schedule(&settings)
        );
    }
}
