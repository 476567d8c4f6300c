//! `retrykit probe <URL>`
//!
//! The action is a single GET; transport errors and non-2xx statuses are
//! failures. The controller retries on its own after each cooldown until the
//! URL answers or attempts run out.

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use reqwest::Url;
use retrykit_controller::config::RetrySettings;
use retrykit_controller::{
    ControllerConfig, RetryController, RetryEvent, TracingListener, TriggerOutcome,
};
use tokio::sync::mpsc;

use crate::render::render_event;

#[derive(Debug, Clone, Args)]
pub struct ProbeArgs {
    /// URL to GET
    pub url: Url,

    /// Per-request timeout in milliseconds
    #[arg(long = "timeout-ms", default_value = "5000", value_name = "MS")]
    pub timeout_ms: u64,
}

/// How a probe ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub succeeded: bool,
    /// Invocations of the GET, including the successful one
    pub attempts: u32,
}

impl ProbeOutcome {
    pub fn exit_code(self) -> ExitCode {
        if self.succeeded {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

enum ProbeUpdate {
    Line(String),
    Finished { succeeded: bool },
}

pub(crate) async fn run(settings: &RetrySettings, args: &ProbeArgs) -> anyhow::Result<ExitCode> {
    let config = settings.to_controller_config()?;
    let outcome = run_probe(
        args.url.clone(),
        config,
        Duration::from_millis(args.timeout_ms),
        |line| println!("{line}"),
    )
    .await?;
    Ok(outcome.exit_code())
}

/// Drive a controller whose action GETs `url`, reporting progress to
/// `on_line`, until it succeeds or gives up.
///
/// In controlled mode the probe plays the caller and advances the counter
/// after every failed attempt.
pub async fn run_probe<F>(
    url: Url,
    config: ControllerConfig,
    timeout: Duration,
    mut on_line: F,
) -> anyhow::Result<ProbeOutcome>
where
    F: FnMut(&str),
{
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client")?;

    let attempts = Arc::new(AtomicU32::new(0));
    let action = {
        let url = url.clone();
        let attempts = Arc::clone(&attempts);
        move || {
            attempts.fetch_add(1, Ordering::SeqCst);
            let client = client.clone();
            let url = url.clone();
            async move {
                client
                    .get(url.clone())
                    .send()
                    .await
                    .with_context(|| format!("GET {url}"))?
                    .error_for_status()?;
                anyhow::Ok(())
            }
        }
    };

    let controller = RetryController::new(config.auto_retry(true), action)
        .context("invalid retry configuration")?
        .with_listener(TracingListener);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = controller.handle();
    controller.add_listener(Arc::new(move |event: &RetryEvent| {
        let Some(snapshot) = handle.snapshot() else {
            return;
        };
        if let RetryEvent::AfterRetry(attempt) = event
            && !attempt.success
            && snapshot.controlled
            && let Err(err) = handle.set_current_attempt(attempt.attempt_number)
        {
            tracing::warn!(error = %err, "failed to advance attempt counter");
        }
        if let Some(line) = render_event(event, &snapshot) {
            let _ = tx.send(ProbeUpdate::Line(line));
        }
        match event {
            RetryEvent::AfterRetry(attempt) if attempt.success => {
                let _ = tx.send(ProbeUpdate::Finished { succeeded: true });
            }
            RetryEvent::MaxAttemptsReached { .. } => {
                let _ = tx.send(ProbeUpdate::Finished { succeeded: false });
            }
            _ => {}
        }
    }));

    tracing::info!(%url, "probing");
    if controller.trigger().await == TriggerOutcome::Ignored {
        anyhow::bail!("controller is not idle; the attempt counter is already at its ceiling");
    }

    while let Some(update) = rx.recv().await {
        match update {
            ProbeUpdate::Line(line) => on_line(&line),
            ProbeUpdate::Finished { succeeded } => {
                controller.teardown();
                return Ok(ProbeOutcome {
                    succeeded,
                    attempts: attempts.load(Ordering::SeqCst),
                });
            }
        }
    }
    anyhow::bail!("controller stopped before the probe settled")
}
