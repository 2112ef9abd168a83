// runbook/src/core/step.rs

//! The step capability contract shared by every step variant.

use super::control::StepState;
use super::output::OutputBuffer;
use crate::error::RunbookResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of step kinds. The tag is the `"Type"` value in pipeline files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
  /// Runs a script through the configured interpreter (tag `"PS"`).
  Script,
  /// Carries a static link or informational text (tag `"Link"`).
  Link,
}

impl StepKind {
  pub const ALL: [StepKind; 2] = [StepKind::Script, StepKind::Link];

  pub fn tag(self) -> &'static str {
    match self {
      StepKind::Script => "PS",
      StepKind::Link => "Link",
    }
  }

  pub fn from_tag(tag: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|kind| kind.tag() == tag)
  }
}

impl fmt::Display for StepKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.tag())
  }
}

/// Read-only, per-variant view of a step's configuration for display glue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDetail<'a> {
  Script {
    script_path: &'a str,
    arguments: &'a [String],
    depends_on: &'a [String],
    default: bool,
  },
  Link {
    link: &'a str,
  },
}

/// One entry of a trigger payload. The list order is the run order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSelection {
  #[serde(rename = "StepName")]
  pub step_name: String,
  #[serde(rename = "Checked")]
  pub checked: bool,
}

impl StepSelection {
  pub fn new(step_name: impl Into<String>, checked: bool) -> Self {
    Self {
      step_name: step_name.into(),
      checked,
    }
  }

  pub fn checked(step_name: impl Into<String>) -> Self {
    Self::new(step_name, true)
  }

  pub fn unchecked(step_name: impl Into<String>) -> Self {
    Self::new(step_name, false)
  }
}

/// The capability every pipeline step provides.
///
/// Steps are shared between the run task, kill requests and status queries,
/// so every method takes `&self` and state lives behind interior mutability.
#[async_trait]
pub trait Step: Send + Sync + fmt::Debug {
  /// Stable identifier used to resolve selections and key captured output.
  fn show_as(&self) -> &str;

  fn kind(&self) -> StepKind;

  fn state(&self) -> StepState;

  fn set_state(&self, state: StepState);

  fn detail(&self) -> StepDetail<'_>;

  /// Runs the step to completion, appending captured lines to `out`.
  async fn execute(&self, out: &OutputBuffer);

  /// Best-effort and idempotent. Safe to call at any time.
  fn kill(&self) -> RunbookResult<()>;
}
