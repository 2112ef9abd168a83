// runbook/src/substitution.rs

//! `$(name)` templating, applied once to every string a pipeline file provides.

use std::collections::HashMap;

/// Resolved variable bindings, name to value.
pub type Variables = HashMap<String, String>;

const OPEN: &str = "$(";
const CLOSE: char = ')';

/// Replaces every `$(name)` whose `name` is bound in `vars` with its value.
///
/// Unbound references and unterminated `$(` sequences stay as literal text.
/// The scan is single-pass, so a substituted value is never expanded again.
pub fn substitute(text: &str, vars: &Variables) -> String {
  if vars.is_empty() || !text.contains(OPEN) {
    return text.to_string();
  }

  let mut result = String::with_capacity(text.len());
  let mut rest = text;

  while let Some(start) = rest.find(OPEN) {
    result.push_str(&rest[..start]);
    let after_open = &rest[start + OPEN.len()..];

    let bound = after_open
      .find(CLOSE)
      .and_then(|end| vars.get(&after_open[..end]).map(|value| (end, value)));

    match bound {
      Some((end, value)) => {
        result.push_str(value);
        rest = &after_open[end + 1..];
      }
      None => {
        // Unbound: keep `$(` literal and rescan right after it, so a nested
        // `$(name)` is still found.
        result.push_str(OPEN);
        rest = after_open;
      }
    }
  }

  result.push_str(rest);
  result
}
