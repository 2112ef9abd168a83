// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use once_cell::sync::Lazy;
use runbook::{
  GlobalConfig, Interpreter, LinkStep, PipelineDefinition, ScriptStep, ServerState, Step, Variables,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Level;

// --- Helper for Tracing Setup (call once per test run if needed) ---
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Scratch directories ---
static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Directory under the system temp dir, removed on drop.
pub struct ScratchDir {
  path: PathBuf,
}

impl ScratchDir {
  pub fn new(tag: &str) -> Self {
    let n = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    let path = std::env::temp_dir().join(format!("runbook-{}-{}-{}", tag, std::process::id(), n));
    let _ = std::fs::remove_dir_all(&path);
    std::fs::create_dir_all(&path).expect("create scratch dir");
    Self { path }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn write(&self, name: &str, contents: &str) -> PathBuf {
    let file = self.path.join(name);
    std::fs::write(&file, contents).expect("write scratch file");
    file
  }
}

impl Drop for ScratchDir {
  fn drop(&mut self) {
    let _ = std::fs::remove_dir_all(&self.path);
  }
}

// --- Steps and pipelines ---

pub fn sh() -> Interpreter {
  Interpreter::new("sh", &[])
}

pub fn sh_config(pairs: &[(&str, &str)]) -> GlobalConfig {
  let vars: Variables = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
  GlobalConfig::new(vars, sh())
}

/// Writes `body` to `<name>.sh` in `dir` and returns a script step running it with `sh`.
pub fn script_step(dir: &ScratchDir, name: &str, body: &str) -> Arc<dyn Step> {
  let path = dir.write(&format!("{}.sh", name), body);
  Arc::new(ScriptStep::new(name, path.to_string_lossy(), Vec::new(), sh()))
}

pub fn link_step(name: &str, link: &str) -> Arc<dyn Step> {
  Arc::new(LinkStep::new(name, link))
}

pub fn pipeline(name: &str, steps: Vec<Arc<dyn Step>>) -> Arc<PipelineDefinition> {
  Arc::new(PipelineDefinition::new(name, format!("{} pipeline", name), steps))
}

// --- Polling ---

/// Polls `cond` every 20ms until it holds; panics after `timeout`.
pub async fn wait_for(what: &str, timeout: Duration, mut cond: impl FnMut() -> bool) {
  let deadline = Instant::now() + timeout;
  while !cond() {
    if Instant::now() > deadline {
      panic!("timed out waiting for {}", what);
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
  }
}

pub async fn wait_until_idle(state: &ServerState) {
  wait_for("run to finish", Duration::from_secs(15), || !state.is_running()).await;
}
