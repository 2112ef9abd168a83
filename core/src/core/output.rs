// runbook/src/core/output.rs
use parking_lot::RwLock;
use std::sync::Arc;

/// Marker appended after every captured line: a literal backslash followed by `n`,
/// so the buffer can be embedded in a JSON string as-is.
pub const LINE_MARKER: &str = "\\n";

/// Escapes one raw output line: single quotes become double quotes and
/// backslashes are doubled.
pub fn normalize_line(line: &str) -> String {
  line.replace('\'', "\"").replace('\\', "\\\\")
}

/// Splits captured text back into its lines, undoing the backslash doubling.
///
/// Every content backslash is doubled, so a single `\` followed by `n` is
/// always a line marker. Blank lines are kept. Quote replacement is not undone.
pub fn captured_lines(text: &str) -> Vec<String> {
  let mut lines = Vec::new();
  let mut current = String::new();
  let mut chars = text.chars();

  while let Some(c) = chars.next() {
    if c != '\\' {
      current.push(c);
      continue;
    }
    match chars.next() {
      Some('n') => lines.push(std::mem::take(&mut current)),
      Some('\\') => current.push('\\'),
      Some(other) => {
        current.push('\\');
        current.push(other);
      }
      None => current.push('\\'),
    }
  }

  if !current.is_empty() {
    lines.push(current);
  }
  lines
}

/// Append-only text buffer holding one step's captured output.
///
/// Clones share the same buffer. Writers are the step's own stream drains;
/// readers may observe it at any time and always see a prefix of the final
/// text, because every line is appended under a single write lock.
///
/// Lock guards are blocking and never held across `.await` points.
#[derive(Debug, Default)]
pub struct OutputBuffer(Arc<RwLock<String>>);

impl OutputBuffer {
  pub fn new() -> Self {
    OutputBuffer(Arc::new(RwLock::new(String::new())))
  }

  /// Normalizes `line` and appends it followed by [`LINE_MARKER`].
  pub fn append_line(&self, line: &str) {
    let normalized = normalize_line(line);
    let mut guard = self.0.write();
    guard.push_str(&normalized);
    guard.push_str(LINE_MARKER);
  }

  /// Copy of the text captured so far.
  pub fn snapshot(&self) -> String {
    self.0.read().clone()
  }

  pub fn is_empty(&self) -> bool {
    self.0.read().is_empty()
  }
}

impl Clone for OutputBuffer {
  fn clone(&self) -> Self {
    OutputBuffer(Arc::clone(&self.0))
  }
}
