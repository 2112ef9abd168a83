// src/lib.rs

//! Runbook: a single-flight runner for declarative script pipelines.
//!
//! A pipeline is a named, ordered list of steps loaded from a JSON file:
//!  - Script steps run a script through a configured interpreter, with both
//!    output streams captured line by line while the script runs.
//!  - Link steps carry a static link or informational text.
//!
//! A caller picks which steps to run and in which order. The registry
//! (`ServerState`) runs at most one such selection at a time, exposes each
//! step's state and captured output while it runs, and can kill the whole
//! process tree of the running script.

pub mod config;
pub mod core;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod registry;
pub mod step;
pub mod substitution;

// --- Re-exports for the Public API ---

pub use crate::core::{captured_lines, OutputBuffer, RunPhase, Step, StepDetail, StepKind, StepSelection, StepState};
pub use crate::step::{parse_step, FieldBag, LinkStep, ScriptStep};

pub use crate::pipeline::{load_pipelines, Execution, PipelineDefinition, StepStatus};

pub use crate::config::{GlobalConfig, Interpreter, ServerConfig, ServiceSettings};
pub use crate::error::{ProcessError, RunbookError, RunbookResult};
pub use crate::substitution::{substitute, Variables};

// The registry that owns pipelines and the single in-flight run
pub use crate::registry::{bootstrap, ServerState, StatusReport, TriggerResponse};

/*
    Core workflow:
    1. Resolve `ServiceSettings` (env / .env) and call `bootstrap` to get the
       `ServerState` plus the `ServerConfig`.
    2. Share the state as `Arc<ServerState>`.
    3. `trigger(name, selection)` starts a run on a detached task;
       a second trigger while it is unfinished returns `started: false`.
    4. Poll `status(name)` and `step_output(step)` while it runs.
    5. `kill(name)` terminates the running script's whole process tree.
    6. `reset(name)` discards the finished run.
*/
