// runbook/src/process/posix.rs

//! POSIX backend: the child is started as the leader of a new process group
//! and the whole group is signalled with `killpg`.

use super::ProcessGroup;
use crate::error::ProcessError;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use tokio::process::{Child, Command};
use tracing::{event, Level};

/// Sentinel for "no child registered yet".
const UNREGISTERED: i32 = 0;

#[derive(Debug)]
pub(crate) struct PosixProcessGroup {
  pgid: AtomicI32,
  disposed: AtomicBool,
}

impl PosixProcessGroup {
  pub(crate) fn new() -> Self {
    Self {
      pgid: AtomicI32::new(UNREGISTERED),
      disposed: AtomicBool::new(false),
    }
  }

  fn signal(pgid: i32) -> Result<(), ProcessError> {
    // SAFETY: killpg only reads its integer arguments.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc == 0 {
      event!(Level::DEBUG, pgid, "Sent SIGKILL to process group.");
      return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
      // Every member is already gone.
      return Ok(());
    }
    Err(ProcessError::Signal { pgid, source: err })
  }
}

impl ProcessGroup for PosixProcessGroup {
  fn prepare(&self, command: &mut Command) {
    // 0 makes the child the leader of a new group whose id equals its pid.
    command.process_group(0);
  }

  fn register(&self, child: &Child) -> Result<(), ProcessError> {
    if self.disposed.load(Ordering::Acquire) {
      return Err(ProcessError::Disposed);
    }
    let pid = child.id().ok_or(ProcessError::AlreadyExited)?;
    let pgid = i32::try_from(pid).map_err(|_| ProcessError::AlreadyExited)?;

    self
      .pgid
      .compare_exchange(UNREGISTERED, pgid, Ordering::AcqRel, Ordering::Acquire)
      .map(|_| ())
      .map_err(|existing| ProcessError::AlreadyRegistered { pgid: existing })
  }

  fn kill(&self) -> Result<(), ProcessError> {
    match self.pgid.load(Ordering::Acquire) {
      UNREGISTERED => Ok(()),
      pgid => Self::signal(pgid),
    }
  }

  fn dispose(&self) -> Result<(), ProcessError> {
    if self.disposed.swap(true, Ordering::AcqRel) {
      return Ok(());
    }
    match self.pgid.swap(UNREGISTERED, Ordering::AcqRel) {
      UNREGISTERED => Ok(()),
      pgid => Self::signal(pgid),
    }
  }
}

impl Drop for PosixProcessGroup {
  fn drop(&mut self) {
    if let Err(e) = self.dispose() {
      event!(Level::WARN, error = %e, "Failed to dispose process group on drop.");
    }
  }
}
