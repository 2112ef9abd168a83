// runbook/src/process/mod.rs

//! Process-group capability: lets a script step terminate the whole process
//! subtree it started, not only its immediate child.
//!
//! Usage discipline: create a group right before spawning the child, let the
//! group [`prepare`](ProcessGroup::prepare) the command, register the child
//! immediately after it starts, and dispose the group on every exit path.
//! Dropping a group disposes it.

#[cfg(unix)]
mod posix;

use crate::error::ProcessError;
use std::sync::Arc;
use tokio::process::{Child, Command};

pub trait ProcessGroup: Send + Sync + std::fmt::Debug {
  /// Configures `command` so the child it spawns becomes trackable by this group.
  fn prepare(&self, command: &mut Command);

  /// Adds a freshly started child. Fails if it has already exited or a child
  /// is already registered.
  fn register(&self, child: &Child) -> Result<(), ProcessError>;

  /// Terminates every member of the group. A no-op until a child is registered.
  fn kill(&self) -> Result<(), ProcessError>;

  /// Releases the group and terminates members that are still alive. Idempotent.
  fn dispose(&self) -> Result<(), ProcessError>;
}

/// Creates a tracking group using the platform backend.
pub fn create_process_group() -> Result<Arc<dyn ProcessGroup>, ProcessError> {
  #[cfg(unix)]
  {
    Ok(Arc::new(posix::PosixProcessGroup::new()))
  }
  #[cfg(not(unix))]
  {
    Err(ProcessError::Unsupported)
  }
}
