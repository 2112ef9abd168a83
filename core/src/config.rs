// runbook/src/config.rs

//! Service settings and the two JSON config files in the config directory:
//! `server.json` (listening port) and `global.json` (variables and the script
//! interpreter).

use crate::error::{RunbookError, RunbookResult};
use crate::substitution::Variables;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{event, instrument, Level};

pub const CONFIG_DIR_NAME: &str = "runbook";
pub const PIPELINE_DIR_NAME: &str = "pipelines";
pub const SERVER_CONFIG_FILE: &str = "server.json";
pub const GLOBAL_CONFIG_FILE: &str = "global.json";
pub const DEFAULT_PORT: u16 = 8111;

/// Where the service keeps its configuration.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
  pub config_dir: PathBuf,
}

impl ServiceSettings {
  /// Resolves the config directory from `RUNBOOK_CONFIG_DIR`, then
  /// `$XDG_CONFIG_HOME/runbook`, then `$HOME/.config/runbook`.
  /// A `.env` file in the working directory is honoured.
  pub fn from_env() -> RunbookResult<Self> {
    dotenvy::dotenv().ok();

    let non_empty = |name: &str| env::var(name).ok().filter(|v| !v.is_empty());

    let config_dir = if let Some(dir) = non_empty("RUNBOOK_CONFIG_DIR") {
      PathBuf::from(dir)
    } else if let Some(base) = non_empty("XDG_CONFIG_HOME") {
      PathBuf::from(base).join(CONFIG_DIR_NAME)
    } else if let Some(home) = non_empty("HOME") {
      PathBuf::from(home).join(".config").join(CONFIG_DIR_NAME)
    } else {
      return Err(RunbookError::Config {
        path: PathBuf::new(),
        message: "cannot determine a config directory: set RUNBOOK_CONFIG_DIR".to_string(),
      });
    };

    event!(Level::INFO, config_dir = %config_dir.display(), "Resolved config directory.");
    Ok(Self { config_dir })
  }

  pub fn new(config_dir: impl Into<PathBuf>) -> Self {
    Self {
      config_dir: config_dir.into(),
    }
  }

  pub fn pipeline_dir(&self) -> PathBuf {
    self.config_dir.join(PIPELINE_DIR_NAME)
  }

  pub fn global_config_path(&self) -> PathBuf {
    self.config_dir.join(GLOBAL_CONFIG_FILE)
  }
}

/// Creates `path` (and its parents) when it does not exist yet.
pub fn ensure_dir(path: &Path) -> RunbookResult<()> {
  if path.is_dir() {
    return Ok(());
  }
  event!(Level::INFO, path = %path.display(), "Directory not found - creating.");
  fs::create_dir_all(path).map_err(|e| RunbookError::io(path, e))?;
  if !path.is_dir() {
    return Err(RunbookError::Config {
      path: path.to_path_buf(),
      message: "directory still missing after creation".to_string(),
    });
  }
  Ok(())
}

// --- server.json ---

#[derive(Debug, Serialize, Deserialize)]
struct ServerConfigFile {
  port: String,
}

impl Default for ServerConfigFile {
  fn default() -> Self {
    Self {
      port: DEFAULT_PORT.to_string(),
    }
  }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
  config_dir: PathBuf,
  pipeline_dir: PathBuf,
  port: u16,
}

impl ServerConfig {
  /// Reads `server.json` from `config_dir`, writing a default one first when missing.
  #[instrument(name = "ServerConfig::load", skip_all, fields(config_dir = %config_dir.display()), err(Display))]
  pub fn load(config_dir: &Path) -> RunbookResult<Self> {
    let path = config_dir.join(SERVER_CONFIG_FILE);
    if !path.exists() {
      event!(Level::INFO, path = %path.display(), "Server config not found - creating file with default settings.");
      write_json(&path, &ServerConfigFile::default())?;
    }

    let file: ServerConfigFile = read_json(&path)?;
    let port = file.port.parse::<u16>().map_err(|e| RunbookError::Config {
      path: path.clone(),
      message: format!("port has wrong format: {}", e),
    })?;
    event!(Level::DEBUG, port, "Read server port.");

    Ok(Self {
      config_dir: config_dir.to_path_buf(),
      pipeline_dir: config_dir.join(PIPELINE_DIR_NAME),
      port,
    })
  }

  pub fn port(&self) -> u16 {
    self.port
  }

  pub fn config_dir(&self) -> &Path {
    &self.config_dir
  }

  pub fn pipeline_dir(&self) -> &Path {
    &self.pipeline_dir
  }
}

// --- global.json ---

/// The script-execution binary and the fixed flags placed before the script path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpreter {
  pub program: String,
  #[serde(default)]
  pub flags: Vec<String>,
}

impl Interpreter {
  pub fn new(program: impl Into<String>, flags: &[&str]) -> Self {
    Self {
      program: program.into(),
      flags: flags.iter().map(|f| f.to_string()).collect(),
    }
  }
}

impl Default for Interpreter {
  #[cfg(windows)]
  fn default() -> Self {
    Interpreter::new("powershell", &["-nologo", "-noprofile", "-noninteractive"])
  }

  #[cfg(not(windows))]
  fn default() -> Self {
    Interpreter::new("pwsh", &["-NoLogo", "-NoProfile", "-NonInteractive"])
  }
}

#[derive(Debug, Serialize, Deserialize)]
struct VarEntry {
  name: String,
  value: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GlobalConfigFile {
  vars: Vec<VarEntry>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  interpreter: Option<Interpreter>,
}

/// Variables available to `$(name)` substitution plus the script interpreter.
#[derive(Debug, Clone, Default)]
pub struct GlobalConfig {
  vars: Variables,
  interpreter: Interpreter,
}

impl GlobalConfig {
  pub fn new(vars: Variables, interpreter: Interpreter) -> Self {
    Self { vars, interpreter }
  }

  /// Reads `global.json`. A missing file is created with defaults; a malformed
  /// one is moved to `<file>.bak` and regenerated, and loading continues with
  /// the defaults.
  #[instrument(name = "GlobalConfig::load", skip_all, fields(path = %path.display()), err(Display))]
  pub fn load(path: &Path) -> RunbookResult<Self> {
    if !path.exists() {
      event!(Level::INFO, "Global config not found - creating file with default settings.");
      write_json(path, &GlobalConfigFile::default())?;
    }

    match Self::parse_file(path) {
      Ok(cfg) => Ok(cfg),
      Err(e) if matches!(e, RunbookError::Json { .. } | RunbookError::Config { .. }) => {
        let backup = path.with_extension("json.bak");
        event!(Level::WARN, error = %e, backup = %backup.display(), "Malformed global config - regenerating defaults.");
        fs::rename(path, &backup).map_err(|e| RunbookError::io(path, e))?;
        write_json(path, &GlobalConfigFile::default())?;
        Ok(Self::default())
      }
      Err(e) => Err(e),
    }
  }

  fn parse_file(path: &Path) -> RunbookResult<Self> {
    let file: GlobalConfigFile = read_json(path)?;

    let mut vars = HashMap::with_capacity(file.vars.len());
    for entry in file.vars {
      event!(Level::DEBUG, name = %entry.name, "Read global var.");
      if vars.insert(entry.name.clone(), entry.value).is_some() {
        return Err(RunbookError::Config {
          path: path.to_path_buf(),
          message: format!("found non-unique name in vars: {}", entry.name),
        });
      }
    }

    event!(Level::INFO, count = vars.len(), "Read global vars.");
    Ok(Self {
      vars,
      interpreter: file.interpreter.unwrap_or_default(),
    })
  }

  pub fn vars(&self) -> &Variables {
    &self.vars
  }

  pub fn resolve_var(&self, name: &str) -> Option<&str> {
    self.vars.get(name).map(String::as_str)
  }

  pub fn interpreter(&self) -> &Interpreter {
    &self.interpreter
  }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> RunbookResult<T> {
  let bytes = fs::read(path).map_err(|e| RunbookError::io(path, e))?;
  serde_json::from_slice(&bytes).map_err(|source| RunbookError::Json {
    path: path.to_path_buf(),
    source,
  })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RunbookResult<()> {
  let mut text = serde_json::to_string_pretty(value).map_err(|source| RunbookError::Json {
    path: path.to_path_buf(),
    source,
  })?;
  text.push('\n');
  fs::write(path, text).map_err(|e| RunbookError::io(path, e))
}
