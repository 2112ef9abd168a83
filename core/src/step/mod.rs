// runbook/src/step/mod.rs

//! Concrete step variants and the kind → constructor table.

mod fields;
pub mod link;
pub mod script;

pub use fields::FieldBag;
pub use link::LinkStep;
pub use script::ScriptStep;

use crate::config::GlobalConfig;
use crate::core::{Step, StepKind};
use crate::error::{RunbookError, RunbookResult};
use std::sync::Arc;
use tracing::{event, Level};

/// Builds a step from its field-bag, dispatching on the `"Type"` tag.
///
/// This match is the only place that maps a kind to its constructor.
pub fn parse_step(bag: &FieldBag, cfg: &GlobalConfig) -> RunbookResult<Arc<dyn Step>> {
  let tag = bag
    .get("Type")
    .and_then(|v| v.as_str())
    .ok_or_else(|| RunbookError::MissingField {
      owner: "step".to_string(),
      field: "Type",
    })?;

  event!(Level::DEBUG, kind = %tag, "Read step type.");
  let kind = StepKind::from_tag(tag).ok_or_else(|| {
    event!(Level::ERROR, kind = %tag, "Unknown step type.");
    RunbookError::UnknownStepKind { kind: tag.to_string() }
  })?;

  let step: Arc<dyn Step> = match kind {
    StepKind::Script => Arc::new(ScriptStep::from_fields(bag, cfg.vars(), cfg.interpreter())?),
    StepKind::Link => Arc::new(LinkStep::from_fields(bag, cfg.vars())?),
  };
  Ok(step)
}
