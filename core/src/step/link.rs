// runbook/src/step/link.rs
use super::fields::{FieldBag, Fields};
use crate::core::{OutputBuffer, Step, StepDetail, StepKind, StepState};
use crate::error::RunbookResult;
use crate::substitution::Variables;
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{event, Level};

/// Static link or informational text shown alongside a pipeline.
///
/// Executing or killing it does nothing. The engine still marks it `Running`
/// when selected, and nothing moves it on from there.
#[derive(Debug)]
pub struct LinkStep {
  name: String,
  link: String,
  state: Mutex<StepState>,
}

impl LinkStep {
  pub fn new(name: impl Into<String>, link: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      link: link.into(),
      state: Mutex::new(StepState::Waiting),
    }
  }

  /// Builds a link step from its field-bag. Required: `Name`, `Link`.
  pub fn from_fields(bag: &FieldBag, vars: &Variables) -> RunbookResult<Self> {
    let fields = Fields::new(bag, StepKind::Link, vars);
    let name = fields.required_str("Name")?;
    let fields = fields.named(&name);
    let link = fields.required_str("Link")?;
    event!(Level::DEBUG, step = %name, link = %link, "Read link step.");
    Ok(Self::new(name, link))
  }

  pub fn link(&self) -> &str {
    &self.link
  }
}

#[async_trait]
impl Step for LinkStep {
  fn show_as(&self) -> &str {
    &self.name
  }

  fn kind(&self) -> StepKind {
    StepKind::Link
  }

  fn state(&self) -> StepState {
    *self.state.lock()
  }

  fn set_state(&self, state: StepState) {
    *self.state.lock() = state;
  }

  fn detail(&self) -> StepDetail<'_> {
    StepDetail::Link { link: &self.link }
  }

  async fn execute(&self, _out: &OutputBuffer) {}

  fn kill(&self) -> RunbookResult<()> {
    Ok(())
  }
}
