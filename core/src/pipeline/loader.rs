// runbook/src/pipeline/loader.rs

//! Startup scan of the pipeline directory.

use crate::config::GlobalConfig;
use crate::error::{RunbookError, RunbookResult};
use crate::pipeline::definition::PipelineDefinition;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Regular files directly inside `dir`, sorted by path.
pub fn find_all_files(dir: &Path) -> RunbookResult<Vec<PathBuf>> {
  let entries = fs::read_dir(dir).map_err(|e| RunbookError::io(dir, e))?;

  let mut files = Vec::new();
  for entry in entries {
    let entry = entry.map_err(|e| RunbookError::io(dir, e))?;
    let path = entry.path();
    if path.is_file() {
      event!(Level::DEBUG, file = %path.display(), "Found file.");
      files.push(path);
    }
  }
  files.sort();
  Ok(files)
}

/// Parses every file in `dir` as a pipeline.
///
/// A file that fails to parse is logged and skipped, as is a pipeline whose
/// name was already loaded from an earlier file. Only failing to list the
/// directory is an error.
#[instrument(name = "load_pipelines", skip_all, fields(dir = %dir.display()), err(Display))]
pub fn load_pipelines(dir: &Path, cfg: &GlobalConfig) -> RunbookResult<Vec<Arc<PipelineDefinition>>> {
  let mut seen = HashSet::new();
  let mut pipelines = Vec::new();

  for file in find_all_files(dir)? {
    let pipeline = match PipelineDefinition::from_json_file(&file, cfg) {
      Ok(p) => p,
      Err(e) => {
        event!(Level::WARN, file = %file.display(), error = %e, "Error reading pipeline configuration - skipping file.");
        continue;
      }
    };

    if !seen.insert(pipeline.name.clone()) {
      event!(Level::WARN, file = %file.display(), pipeline = %pipeline.name, "Duplicate pipeline name - skipping file.");
      continue;
    }

    event!(Level::INFO, pipeline = %pipeline.name, steps = pipeline.steps().len(), "Loaded pipeline.");
    pipelines.push(Arc::new(pipeline));
  }

  Ok(pipelines)
}
