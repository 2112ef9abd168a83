// runbook/src/core/control.rs

//! Lifecycle states of a single step and of a whole run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of one pipeline step.
///
/// `Waiting` is the initial state. The engine moves a selected step to `Running`;
/// a script step always leaves `execute` in `Failed` or `Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StepState {
  #[default]
  Waiting,
  Running,
  Failed,
  Success,
  /// Reserved. Nothing produces or consumes it.
  Semi,
}

impl StepState {
  pub fn is_terminal(self) -> bool {
    matches!(self, StepState::Failed | StepState::Success)
  }
}

impl fmt::Display for StepState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      StepState::Waiting => "Waiting",
      StepState::Running => "Running",
      StepState::Failed => "Failed",
      StepState::Success => "Success",
      StepState::Semi => "Semi",
    };
    f.write_str(s)
  }
}

/// Phase of one run. `Finished` is terminal and is the only completion signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
  #[default]
  NotStarted,
  Running,
  Finished,
}
