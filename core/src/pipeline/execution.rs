// runbook/src/pipeline/execution.rs

//! Contains the `Execution` engine: one run of a caller-selected, caller-ordered
//! subset of a pipeline's steps, owning the captured output of that run.

use crate::core::{OutputBuffer, RunPhase, Step, StepSelection, StepState};
use crate::error::{RunbookError, RunbookResult};
use crate::pipeline::definition::PipelineDefinition;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{event, instrument, span, Instrument, Level};

pub struct Execution {
  pipeline: Arc<PipelineDefinition>,
  selection: Vec<StepSelection>,
  /// Captured output per executed step name. Entries are only ever added.
  outputs: RwLock<HashMap<String, OutputBuffer>>,
  /// Checked selection entries that named no step of the pipeline.
  unresolved: Mutex<Vec<String>>,
  phase: Mutex<RunPhase>,
}

impl Execution {
  /// Fails with `MissingPipeline` when no pipeline is given.
  pub fn new(pipeline: Option<Arc<PipelineDefinition>>, selection: Vec<StepSelection>) -> RunbookResult<Self> {
    let pipeline = pipeline.ok_or(RunbookError::MissingPipeline)?;
    Ok(Self {
      pipeline,
      selection,
      outputs: RwLock::new(HashMap::new()),
      unresolved: Mutex::new(Vec::new()),
      phase: Mutex::new(RunPhase::NotStarted),
    })
  }

  pub fn pipeline(&self) -> &Arc<PipelineDefinition> {
    &self.pipeline
  }

  pub fn pipeline_name(&self) -> &str {
    &self.pipeline.name
  }

  pub fn selection(&self) -> &[StepSelection] {
    &self.selection
  }

  pub fn phase(&self) -> RunPhase {
    *self.phase.lock()
  }

  pub fn is_finished(&self) -> bool {
    self.phase() == RunPhase::Finished
  }

  pub fn set_finished(&self) {
    *self.phase.lock() = RunPhase::Finished;
  }

  /// Output captured so far for `step`. While the run is active this is a
  /// prefix of the final text.
  pub fn step_output(&self, step: &str) -> RunbookResult<String> {
    self
      .outputs
      .read()
      .get(step)
      .map(OutputBuffer::snapshot)
      .ok_or_else(|| RunbookError::StepNotFound { name: step.to_string() })
  }

  pub fn unresolved_steps(&self) -> Vec<String> {
    self.unresolved.lock().clone()
  }

  /// Steps of this run's pipeline currently in `Running`.
  pub fn running_steps(&self) -> Vec<Arc<dyn Step>> {
    self
      .pipeline
      .steps()
      .iter()
      .filter(|s| s.state() == StepState::Running)
      .cloned()
      .collect()
  }

  /// Kills every running step. Every step is attempted; the first error is returned.
  pub fn kill(&self) -> RunbookResult<()> {
    let mut first_err = None;
    for step in self.running_steps() {
      event!(Level::INFO, step = %step.show_as(), "Killing step.");
      if let Err(e) = step.kill() {
        event!(Level::ERROR, step = %step.show_as(), error = %e, "Failed to kill step.");
        first_err.get_or_insert(e);
      }
    }
    first_err.map_or(Ok(()), Err)
  }

  /// Runs the checked entries of the selection in list order.
  ///
  /// A failing step never aborts the run, and neither does an entry naming an
  /// unknown step. The run is `Finished` when this returns. Only the first call
  /// does anything.
  #[instrument(
    name = "Execution::execute",
    skip_all,
    fields(pipeline = %self.pipeline.name, selected = self.selection.len())
  )]
  pub async fn execute(&self) {
    {
      let mut phase = self.phase.lock();
      if *phase != RunPhase::NotStarted {
        event!(Level::WARN, phase = ?*phase, "Execution already started; ignoring.");
        return;
      }
      *phase = RunPhase::Running;
    }
    event!(Level::INFO, "Starting pipeline.");

    for (index, entry) in self.selection.iter().enumerate() {
      let step_span = span!(Level::INFO, "pipeline_step", step_name = %entry.step_name, step_index = index);

      if !entry.checked {
        event!(parent: &step_span, Level::INFO, "Skipping unchecked step.");
        continue;
      }

      let Some(step) = self.pipeline.find_step(&entry.step_name).cloned() else {
        event!(parent: &step_span, Level::ERROR, "Could not find pipeline step.");
        self.unresolved.lock().push(entry.step_name.clone());
        continue;
      };

      let out = OutputBuffer::new();
      self.outputs.write().insert(entry.step_name.clone(), out.clone());
      step.set_state(StepState::Running);

      step.execute(&out).instrument(step_span.clone()).await;

      event!(parent: &step_span, Level::DEBUG, state = %step.state(), "Step returned.");
    }

    self.set_finished();
    event!(Level::INFO, "Pipeline finished.");
  }
}

impl std::fmt::Debug for Execution {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Execution")
      .field("pipeline", &self.pipeline.name)
      .field("selection", &self.selection)
      .field("phase", &self.phase())
      .finish()
  }
}
