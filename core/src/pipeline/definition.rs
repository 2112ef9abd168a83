// runbook/src/pipeline/definition.rs

//! Contains the `PipelineDefinition` struct and its construction from a pipeline file.

use crate::config::GlobalConfig;
use crate::core::{Step, StepState};
use crate::error::{RunbookError, RunbookResult};
use crate::step::{parse_step, FieldBag};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// `{name, state}` pair for status display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStatus {
  #[serde(rename = "Step")]
  pub step: String,
  #[serde(rename = "State")]
  pub state: StepState,
}

/// A named, ordered collection of steps.
///
/// Step display names are expected to be unique; lookups return the first match.
pub struct PipelineDefinition {
  pub name: String,
  pub description: String,
  steps: Vec<Arc<dyn Step>>,
}

#[derive(Debug, Deserialize)]
struct PipelineFile {
  #[serde(rename = "Name")]
  name: String,
  #[serde(rename = "Description")]
  description: String,
  #[serde(rename = "Steps")]
  steps: Vec<Value>,
}

impl PipelineDefinition {
  pub fn new(name: impl Into<String>, description: impl Into<String>, steps: Vec<Arc<dyn Step>>) -> Self {
    Self {
      name: name.into(),
      description: description.into(),
      steps,
    }
  }

  /// Parses pipeline JSON. `source` names the input in error messages.
  pub fn from_json_str(source: &Path, text: &str, cfg: &GlobalConfig) -> RunbookResult<Self> {
    let file: PipelineFile = serde_json::from_str(text).map_err(|e| RunbookError::Json {
      path: source.to_path_buf(),
      source: e,
    })?;
    event!(Level::DEBUG, pipeline = %file.name, steps = file.steps.len(), "Read pipeline file.");

    let owner = format!("pipeline '{}'", file.name);
    let steps = file
      .steps
      .iter()
      .map(|raw| {
        let bag: &FieldBag = raw.as_object().ok_or_else(|| RunbookError::InvalidField {
          owner: owner.clone(),
          field: "Steps",
          expected: "a list of objects",
        })?;
        parse_step(bag, cfg)
      })
      .collect::<RunbookResult<Vec<_>>>()?;

    Ok(Self::new(file.name, file.description, steps))
  }

  #[instrument(name = "PipelineDefinition::from_json_file", skip_all, fields(path = %path.display()), err(Display))]
  pub fn from_json_file(path: &Path, cfg: &GlobalConfig) -> RunbookResult<Self> {
    let text = std::fs::read_to_string(path).map_err(|e| RunbookError::io(path, e))?;
    Self::from_json_str(path, &text, cfg)
  }

  pub fn steps(&self) -> &[Arc<dyn Step>] {
    &self.steps
  }

  /// Exact, case-sensitive lookup by display name.
  pub fn find_step(&self, name: &str) -> Option<&Arc<dyn Step>> {
    self.steps.iter().find(|s| s.show_as() == name)
  }

  pub fn step_states(&self) -> Vec<StepStatus> {
    self
      .steps
      .iter()
      .map(|s| StepStatus {
        step: s.show_as().to_string(),
        state: s.state(),
      })
      .collect()
  }

  pub fn reset_states(&self) {
    for step in &self.steps {
      step.set_state(StepState::Waiting);
    }
  }
}

impl fmt::Debug for PipelineDefinition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PipelineDefinition")
      .field("name", &self.name)
      .field("description", &self.description)
      .field("steps", &self.steps.iter().map(|s| s.show_as()).collect::<Vec<_>>())
      .finish()
  }
}
