// runbook/src/core/mod.rs

//! Shared building blocks used by the step variants and the engine.

pub mod control;
pub mod output;
pub mod step;

// Re-export key types for easier access from other modules (and lib.rs)
pub use control::{RunPhase, StepState};
pub use output::{captured_lines, OutputBuffer};
pub use step::{Step, StepDetail, StepKind, StepSelection};
