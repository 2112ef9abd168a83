// runbook/src/step/fields.rs

//! Typed access to the untyped field-bag a pipeline file provides for each step.

use crate::core::StepKind;
use crate::error::{RunbookError, RunbookResult};
use crate::substitution::{substitute, Variables};
use serde_json::{Map, Value};

/// One step's raw fields, as found in the pipeline file.
pub type FieldBag = Map<String, Value>;

/// Reads required and optional fields, substituting variables into every string.
pub(crate) struct Fields<'a> {
  bag: &'a FieldBag,
  vars: &'a Variables,
  owner: String,
}

impl<'a> Fields<'a> {
  pub(crate) fn new(bag: &'a FieldBag, kind: StepKind, vars: &'a Variables) -> Self {
    Self {
      bag,
      vars,
      owner: format!("{} step", kind),
    }
  }

  /// Names the step in later error messages once its name is known.
  pub(crate) fn named(mut self, name: &str) -> Self {
    self.owner = format!("{} '{}'", self.owner, name);
    self
  }

  fn required(&self, field: &'static str) -> RunbookResult<&'a Value> {
    self.bag.get(field).ok_or_else(|| RunbookError::MissingField {
      owner: self.owner.clone(),
      field,
    })
  }

  fn invalid(&self, field: &'static str, expected: &'static str) -> RunbookError {
    RunbookError::InvalidField {
      owner: self.owner.clone(),
      field,
      expected,
    }
  }

  pub(crate) fn required_str(&self, field: &'static str) -> RunbookResult<String> {
    self
      .required(field)?
      .as_str()
      .map(|s| substitute(s, self.vars))
      .ok_or_else(|| self.invalid(field, "a string"))
  }

  pub(crate) fn required_str_list(&self, field: &'static str) -> RunbookResult<Vec<String>> {
    let items = self
      .required(field)?
      .as_array()
      .ok_or_else(|| self.invalid(field, "a list of strings"))?;

    items
      .iter()
      .map(|item| {
        item
          .as_str()
          .map(|s| substitute(s, self.vars))
          .ok_or_else(|| self.invalid(field, "a list of strings"))
      })
      .collect()
  }

  pub(crate) fn optional_bool(&self, field: &'static str, default: bool) -> RunbookResult<bool> {
    match self.bag.get(field) {
      None | Some(Value::Null) => Ok(default),
      Some(value) => value.as_bool().ok_or_else(|| self.invalid(field, "a boolean")),
    }
  }
}
