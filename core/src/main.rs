// src/main.rs

//! Command-line front end: runs one pipeline from the config directory with
//! every step (or the steps named on the command line) selected, then prints
//! each step's state and captured output.
//!
//! Usage: `runbook [<pipeline> [<step>...]]`. Without arguments it lists the
//! loaded pipelines.

use anyhow::{bail, Context, Result};
use runbook::{bootstrap, captured_lines, ServerState, ServiceSettings, StepSelection};
use std::sync::Arc;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() -> Result<()> {
  let filter = tracing_subscriber::EnvFilter::builder()
    .with_default_directive(LevelFilter::INFO.into())
    .from_env_lossy();
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE)
    .init();

  let settings = ServiceSettings::from_env().context("failed to resolve settings")?;
  let (state, server_config) = bootstrap(&settings).context("failed to load configuration")?;
  let state = Arc::new(state);
  tracing::info!(port = server_config.port(), "Service context ready.");

  let mut args = std::env::args().skip(1);
  let Some(pipeline_name) = args.next() else {
    for pipeline in state.pipelines() {
      println!("{}\t{}", pipeline.name, pipeline.description);
    }
    return Ok(());
  };
  let requested: Vec<String> = args.collect();

  let Some(pipeline) = state.pipeline_from_name(&pipeline_name) else {
    bail!("no pipeline named '{}'", pipeline_name);
  };

  let selection: Vec<StepSelection> = if requested.is_empty() {
    pipeline.steps().iter().map(|s| StepSelection::checked(s.show_as())).collect()
  } else {
    requested.into_iter().map(StepSelection::checked).collect()
  };

  run_to_completion(&state, &pipeline_name, selection).await?;

  for status in state.step_states(&pipeline_name).unwrap_or_default() {
    println!("== {} [{}]", status.step, status.state);
    if let Ok(text) = state.step_output(&status.step) {
      for line in captured_lines(&text) {
        println!("{}", line);
      }
    }
  }
  Ok(())
}

async fn run_to_completion(state: &Arc<ServerState>, name: &str, selection: Vec<StepSelection>) -> Result<()> {
  let stop = {
    let state = Arc::clone(state);
    let name = name.to_string();
    move || {
      if let Err(e) = state.kill(&name) {
        tracing::error!(error = %e, "Failed to kill pipeline.");
      }
    }
  };

  if !state.trigger(name, selection).started {
    bail!("pipeline '{}' was not started", name);
  }

  loop {
    tokio::select! {
      _ = tokio::signal::ctrl_c() => {
        tracing::warn!("Interrupted - killing running steps.");
        stop();
      }
      _ = tokio::time::sleep(POLL_INTERVAL) => {}
    }
    if !state.is_running() {
      return Ok(());
    }
  }
}
