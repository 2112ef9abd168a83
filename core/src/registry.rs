// runbook/src/registry.rs

//! Defines `ServerState`, the run registry: it owns the loaded pipelines and
//! at most one current `Execution`, and enforces single-flight execution.
//!
//! The registry is an explicitly constructed context object. Callers share it
//! behind an `Arc` for the lifetime of the service.

use crate::config::{ensure_dir, GlobalConfig, ServerConfig, ServiceSettings};
use crate::core::StepSelection;
use crate::error::{RunbookError, RunbookResult};
use crate::pipeline::{load_pipelines, Execution, PipelineDefinition, StepStatus};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Reply to a trigger request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerResponse {
  pub started: bool,
}

/// Reply to a status request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
  pub running: bool,
  #[serde(rename = "stepStates")]
  pub step_states: Vec<StepStatus>,
}

pub struct ServerState {
  pipelines: Vec<Arc<PipelineDefinition>>,
  execution: Mutex<Option<Arc<Execution>>>,
}

impl ServerState {
  pub fn new(pipelines: Vec<Arc<PipelineDefinition>>) -> Self {
    Self {
      pipelines,
      execution: Mutex::new(None),
    }
  }

  /// Loads every pipeline file in `pipeline_dir`, skipping bad ones.
  pub fn load(pipeline_dir: &Path, cfg: &GlobalConfig) -> RunbookResult<Self> {
    let pipelines = load_pipelines(pipeline_dir, cfg)?;
    event!(Level::INFO, count = pipelines.len(), "Pipelines loaded.");
    Ok(Self::new(pipelines))
  }

  pub fn pipelines(&self) -> &[Arc<PipelineDefinition>] {
    &self.pipelines
  }

  /// Exact lookup. `None` when no pipeline has that name.
  pub fn pipeline_from_name(&self, name: &str) -> Option<Arc<PipelineDefinition>> {
    self.pipelines.iter().find(|p| p.name == name).cloned()
  }

  pub fn has_execution(&self) -> bool {
    self.execution.lock().is_some()
  }

  pub fn is_running(&self) -> bool {
    self.execution.lock().as_ref().is_some_and(|e| !e.is_finished())
  }

  pub fn current_execution(&self) -> Option<Arc<Execution>> {
    self.execution.lock().clone()
  }

  /// Installs a fresh execution, unless one is still unfinished.
  ///
  /// The check and the install happen under one lock, so of two concurrent
  /// callers exactly one wins. The pipeline's step states are reset to `Waiting`.
  pub fn new_execution(
    &self,
    pipeline: Option<Arc<PipelineDefinition>>,
    selection: Vec<StepSelection>,
  ) -> RunbookResult<()> {
    let mut current = self.execution.lock();
    if let Some(active) = current.as_ref().filter(|e| !e.is_finished()) {
      event!(Level::WARN, pipeline = %active.pipeline_name(), "Already running a pipeline.");
      return Err(RunbookError::AlreadyRunning {
        pipeline: active.pipeline_name().to_string(),
      });
    }

    let execution = Execution::new(pipeline, selection)?;
    execution.pipeline().reset_states();
    event!(Level::INFO, pipeline = %execution.pipeline_name(), "Installed new execution.");
    *current = Some(Arc::new(execution));
    Ok(())
  }

  /// Runs the current execution to completion and marks it finished.
  pub async fn execute(&self) {
    let Some(execution) = self.current_execution() else {
      event!(Level::WARN, "Execute called without an execution.");
      return;
    };
    execution.execute().await;
    execution.set_finished();
  }

  pub fn step_output(&self, step: &str) -> RunbookResult<String> {
    match self.current_execution() {
      Some(execution) => execution.step_output(step),
      None => Err(RunbookError::NoExecution),
    }
  }

  /// Per-step `{name, state}` list of the named pipeline.
  pub fn step_states(&self, name: &str) -> Option<Vec<StepStatus>> {
    self.pipeline_from_name(name).map(|p| p.step_states())
  }

  pub fn status(&self, name: &str) -> Option<StatusReport> {
    let step_states = self.step_states(name)?;
    Some(StatusReport {
      running: self.is_running(),
      step_states,
    })
  }

  /// Kills the running steps of the active run of pipeline `name`.
  ///
  /// Without an active run this is a successful no-op.
  #[instrument(name = "ServerState::kill", skip(self), err(Display))]
  pub fn kill(&self, name: &str) -> RunbookResult<()> {
    let Some(execution) = self.current_execution().filter(|e| !e.is_finished()) else {
      event!(Level::DEBUG, "No active run - nothing to kill.");
      return Ok(());
    };
    if execution.pipeline_name() != name {
      return Err(RunbookError::PipelineNotFound { name: name.to_string() });
    }
    execution.kill()
  }

  /// Discards the previous run so the next trigger starts clean.
  ///
  /// Rejected while a run is unfinished.
  #[instrument(name = "ServerState::reset", skip(self), err(Display))]
  pub fn reset(&self, name: &str) -> RunbookResult<()> {
    let pipeline = self
      .pipeline_from_name(name)
      .ok_or_else(|| RunbookError::PipelineNotFound { name: name.to_string() })?;

    let mut current = self.execution.lock();
    if let Some(active) = current.as_ref().filter(|e| !e.is_finished()) {
      return Err(RunbookError::AlreadyRunning {
        pipeline: active.pipeline_name().to_string(),
      });
    }
    *current = None;
    pipeline.reset_states();
    event!(Level::INFO, "Execution reset.");
    Ok(())
  }

  /// Starts pipeline `name` with `selection` on a detached task and returns
  /// without waiting for it. Must be called inside a tokio runtime.
  pub fn trigger(self: &Arc<Self>, name: &str, selection: Vec<StepSelection>) -> TriggerResponse {
    let Some(pipeline) = self.pipeline_from_name(name) else {
      event!(Level::ERROR, pipeline = %name, "Could not find pipeline.");
      return TriggerResponse { started: false };
    };

    if let Err(e) = self.new_execution(Some(pipeline), selection) {
      event!(Level::ERROR, pipeline = %name, error = %e, "Could not create new execution.");
      return TriggerResponse { started: false };
    }

    let state = Arc::clone(self);
    tokio::spawn(async move {
      state.execute().await;
    });

    TriggerResponse { started: true }
  }
}

impl std::fmt::Debug for ServerState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ServerState")
      .field("pipelines", &self.pipelines.iter().map(|p| &p.name).collect::<Vec<_>>())
      .field("execution", &*self.execution.lock())
      .finish()
  }
}

/// Startup: ensures the config and pipeline directories exist, loads both
/// config files and scans the pipelines.
///
/// Directory setup failures are fatal; a bad pipeline file is not.
#[instrument(name = "bootstrap", skip_all, fields(config_dir = %settings.config_dir.display()), err(Display))]
pub fn bootstrap(settings: &ServiceSettings) -> RunbookResult<(ServerState, ServerConfig)> {
  ensure_dir(&settings.config_dir)?;
  ensure_dir(&settings.pipeline_dir())?;

  let server_config = ServerConfig::load(&settings.config_dir)?;
  let global_config = GlobalConfig::load(&settings.global_config_path())?;
  let state = ServerState::load(server_config.pipeline_dir(), &global_config)?;

  Ok((state, server_config))
}
