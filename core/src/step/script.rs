// runbook/src/step/script.rs

//! Script steps: run one script through the configured interpreter, capture
//! both output streams line by line and track the whole process subtree so it
//! can be killed as a unit.

use super::fields::{FieldBag, Fields};
use crate::config::Interpreter;
use crate::core::{OutputBuffer, Step, StepDetail, StepKind, StepState};
use crate::error::{ProcessError, RunbookResult};
use crate::process::{create_process_group, ProcessGroup};
use crate::substitution::Variables;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{event, instrument, Level};

#[derive(Debug)]
pub struct ScriptStep {
  name: String,
  script_path: String,
  arguments: Vec<String>,
  /// Stored for display only; the engine never orders or gates on it.
  depends_on: Vec<String>,
  /// Stored for display only.
  default: bool,
  interpreter: Interpreter,
  state: Mutex<StepState>,
  /// Process group of the child while it runs. Guards the window between
  /// spawning the child and registering it against a concurrent `kill`.
  live: Mutex<Option<Arc<dyn ProcessGroup>>>,
}

impl ScriptStep {
  pub fn new(
    name: impl Into<String>,
    script_path: impl Into<String>,
    arguments: Vec<String>,
    interpreter: Interpreter,
  ) -> Self {
    Self {
      name: name.into(),
      script_path: script_path.into(),
      arguments,
      depends_on: Vec::new(),
      default: false,
      interpreter,
      state: Mutex::new(StepState::Waiting),
      live: Mutex::new(None),
    }
  }

  pub fn with_depends_on(mut self, depends_on: Vec<String>) -> Self {
    self.depends_on = depends_on;
    self
  }

  pub fn with_default(mut self, default: bool) -> Self {
    self.default = default;
    self
  }

  /// Builds a script step from its field-bag.
  ///
  /// Required: `Name`, `ScriptPath`, `Arguments`, `DependsOn`. Optional: `Default`.
  pub fn from_fields(bag: &FieldBag, vars: &Variables, interpreter: &Interpreter) -> RunbookResult<Self> {
    let fields = Fields::new(bag, StepKind::Script, vars);
    let name = fields.required_str("Name")?;
    let fields = fields.named(&name);

    let script_path = fields.required_str("ScriptPath")?;
    let arguments = fields.required_str_list("Arguments")?;
    let depends_on = fields.required_str_list("DependsOn")?;
    let default = fields.optional_bool("Default", false)?;

    event!(
      Level::DEBUG,
      step = %name,
      script = %script_path,
      args = ?arguments,
      depends_on = ?depends_on,
      "Read script step."
    );

    Ok(
      Self::new(name, script_path, arguments, interpreter.clone())
        .with_depends_on(depends_on)
        .with_default(default),
    )
  }

  pub fn script_path(&self) -> &str {
    &self.script_path
  }

  pub fn arguments(&self) -> &[String] {
    &self.arguments
  }

  pub fn depends_on(&self) -> &[String] {
    &self.depends_on
  }

  pub fn is_default(&self) -> bool {
    self.default
  }

  /// The full command line: interpreter, its fixed flags, script path, arguments.
  pub fn invocation(&self) -> Vec<String> {
    std::iter::once(self.interpreter.program.clone())
      .chain(self.interpreter.flags.iter().cloned())
      .chain(std::iter::once(self.script_path.clone()))
      .chain(self.arguments.iter().cloned())
      .collect()
  }

  fn command(&self) -> Command {
    let mut command = Command::new(&self.interpreter.program);
    command
      .args(&self.interpreter.flags)
      .arg(&self.script_path)
      .args(&self.arguments)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);
    command
  }

  /// Creates the process group, spawns the child into it and registers it,
  /// all while holding `live` so a concurrent `kill` sees either no group or
  /// a group with the child already registered.
  fn start(&self) -> Result<Child, ProcessError> {
    let mut live = self.live.lock();

    let group = create_process_group()?;
    let mut command = self.command();
    group.prepare(&mut command);

    let child = command.spawn().map_err(|source| ProcessError::Spawn {
      program: self.interpreter.program.clone(),
      source,
    })?;

    if let Err(e) = group.register(&child) {
      event!(Level::ERROR, error = %e, "Failed to register child in process group.");
      if let Err(dispose_err) = group.dispose() {
        event!(Level::WARN, error = %dispose_err, "Failed to dispose process group.");
      }
      return Err(e);
    }

    event!(Level::DEBUG, pid = ?child.id(), "Started child process.");
    *live = Some(group);
    Ok(child)
  }

  /// Drops the tracking handle, terminating anything still left in the group.
  fn release(&self) {
    if let Some(group) = self.live.lock().take() {
      if let Err(e) = group.dispose() {
        event!(Level::WARN, error = %e, "Failed to dispose process group.");
      }
    }
  }

  async fn run(&self, out: &OutputBuffer) -> Result<(), ProcessError> {
    let mut child = self.start()?;

    let stdout = child.stdout.take().ok_or(ProcessError::MissingStream { stream: "stdout" });
    let stderr = child.stderr.take().ok_or(ProcessError::MissingStream { stream: "stderr" });
    let (stdout, stderr) = match (stdout, stderr) {
      (Ok(stdout), Ok(stderr)) => (stdout, stderr),
      (Err(e), _) | (_, Err(e)) => {
        if let Err(kill_err) = child.start_kill() {
          event!(Level::WARN, error = %kill_err, "Failed to kill child process.");
        }
        return Err(e);
      }
    };

    // No ordering holds between interleaved stdout and stderr lines.
    let (_, _, waited) = tokio::join!(
      drain(stdout, out, "stdout"),
      drain(stderr, out, "stderr"),
      child.wait()
    );

    let status = waited.map_err(|source| ProcessError::Wait { source })?;
    if status.success() {
      Ok(())
    } else {
      Err(ProcessError::Exited { status })
    }
  }
}

async fn drain<R>(stream: R, out: &OutputBuffer, stream_name: &'static str)
where
  R: AsyncRead + Unpin,
{
  let mut reader = BufReader::new(stream);
  let mut buf = Vec::new();
  loop {
    buf.clear();
    match reader.read_until(b'\n', &mut buf).await {
      Ok(0) => break,
      Ok(_) => {
        let line = String::from_utf8_lossy(&buf);
        out.append_line(line.trim_end_matches(|c| c == '\n' || c == '\r'));
      }
      Err(e) => {
        event!(Level::WARN, stream = stream_name, error = %e, "Failed reading child output.");
        break;
      }
    }
  }
}

#[async_trait]
impl Step for ScriptStep {
  fn show_as(&self) -> &str {
    &self.name
  }

  fn kind(&self) -> StepKind {
    StepKind::Script
  }

  fn state(&self) -> StepState {
    *self.state.lock()
  }

  fn set_state(&self, state: StepState) {
    *self.state.lock() = state;
  }

  fn detail(&self) -> StepDetail<'_> {
    StepDetail::Script {
      script_path: &self.script_path,
      arguments: &self.arguments,
      depends_on: &self.depends_on,
      default: self.default,
    }
  }

  #[instrument(
    name = "ScriptStep::execute",
    skip_all,
    fields(step = %self.name, script = %self.script_path)
  )]
  async fn execute(&self, out: &OutputBuffer) {
    self.set_state(StepState::Running);
    event!(Level::INFO, "Executing script step.");
    let started = Instant::now();

    let outcome = self.run(out).await;
    self.release();

    match outcome {
      Ok(()) => {
        let elapsed = started.elapsed().as_secs_f64();
        out.append_line(&format!("Finished step {} in {:.2} seconds", self.name, elapsed));
        event!(Level::INFO, elapsed_secs = elapsed, "Finished executing script step.");
        self.set_state(StepState::Success);
      }
      Err(e) => {
        event!(Level::ERROR, error = %e, "Script step failed.");
        out.append_line(&format!("Step {} failed: {}", self.name, e));
        self.set_state(StepState::Failed);
      }
    }
  }

  fn kill(&self) -> RunbookResult<()> {
    let live = self.live.lock();
    match live.as_ref() {
      Some(group) => {
        event!(Level::INFO, step = %self.name, "Killing script step process group.");
        group.kill()?;
        Ok(())
      }
      None => {
        event!(Level::DEBUG, step = %self.name, "No live process to kill.");
        Ok(())
      }
    }
  }
}
