// runbook/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the process-group capability and of a script step's child process.
///
/// These never leave `Step::execute`: a script step turns them into a `Failed`
/// state plus a diagnostic line in its own output.
#[derive(Debug, Error)]
pub enum ProcessError {
  #[error("Process groups are not supported on this platform")]
  Unsupported,

  #[error("Failed to spawn '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("Child process did not provide its {stream} stream")]
  MissingStream { stream: &'static str },

  #[error("Child process exited before it could be registered")]
  AlreadyExited,

  #[error("Process group already tracks process group {pgid}")]
  AlreadyRegistered { pgid: i32 },

  #[error("Process group has already been disposed")]
  Disposed,

  #[error("Failed to signal process group {pgid}: {source}")]
  Signal {
    pgid: i32,
    #[source]
    source: std::io::Error,
  },

  #[error("Script exited unsuccessfully ({status})")]
  Exited { status: std::process::ExitStatus },

  #[error("Failed waiting for child process: {source}")]
  Wait {
    #[source]
    source: std::io::Error,
  },
}

#[derive(Debug, Error)]
pub enum RunbookError {
  // --- Parse errors (fatal to one pipeline file only) ---
  #[error("Invalid JSON in '{}': {source}", path.display())]
  Json {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("{owner} is missing required field '{field}'")]
  MissingField { owner: String, field: &'static str },

  #[error("{owner} has field '{field}' of the wrong type (expected {expected})")]
  InvalidField {
    owner: String,
    field: &'static str,
    expected: &'static str,
  },

  #[error("Unknown step type: {kind}")]
  UnknownStepKind { kind: String },

  // --- Lookup errors ---
  #[error("Pipeline not found: {name}")]
  PipelineNotFound { name: String },

  #[error("Step not found: {name}")]
  StepNotFound { name: String },

  #[error("No execution has been started")]
  NoExecution,

  #[error("An execution needs a pipeline")]
  MissingPipeline,

  // --- Process errors ---
  #[error(transparent)]
  Process(#[from] ProcessError),

  // --- Concurrency policy ---
  #[error("Pipeline '{pipeline}' is still running")]
  AlreadyRunning { pipeline: String },

  // --- Configuration ---
  #[error("Configuration error in '{}': {message}", path.display())]
  Config { path: PathBuf, message: String },

  #[error("I/O error on '{}': {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl RunbookError {
  /// True for every lookup failure the control surface reports as "not found".
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      RunbookError::PipelineNotFound { .. }
        | RunbookError::StepNotFound { .. }
        | RunbookError::NoExecution
        | RunbookError::MissingPipeline
    )
  }

  pub fn is_parse_error(&self) -> bool {
    matches!(
      self,
      RunbookError::Json { .. }
        | RunbookError::MissingField { .. }
        | RunbookError::InvalidField { .. }
        | RunbookError::UnknownStepKind { .. }
    )
  }

  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    RunbookError::Io {
      path: path.into(),
      source,
    }
  }
}

pub type RunbookResult<T, E = RunbookError> = std::result::Result<T, E>;
