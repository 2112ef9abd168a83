// runbook/src/pipeline/mod.rs

//! Pipeline definitions, the execution engine and the startup loader.

pub mod definition;
pub mod execution;
pub mod loader;

pub use definition::{PipelineDefinition, StepStatus};
pub use execution::Execution;
pub use loader::load_pipelines;
