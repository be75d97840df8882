//! Workspace configuration.
//!
//! Configuration lives in `plinth.toml` at the workspace root. Every field has a
//! default, so a workspace without a config file is valid for `build`; `repl`
//! additionally needs `repl.main`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{CONFIG_FILENAME, DEFAULT_CONNECTION_TIMEOUT_SECS};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "PLINTH_CONFIG";

/// Environment variable overriding workspace root discovery.
pub const ROOT_ENV: &str = "PLINTH_ROOT";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  pub defaults: Defaults,
  pub python: PythonConfig,
  pub repl: ReplConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Defaults {
  /// Seconds an executor may wait on network connections.
  pub connection_timeout: u64,
}

impl Default for Defaults {
  fn default() -> Self {
    Self {
      connection_timeout: DEFAULT_CONNECTION_TIMEOUT_SECS,
    }
  }
}

impl Defaults {
  pub fn connection_timeout(&self) -> Duration {
    Duration::from_secs(self.connection_timeout)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PythonConfig {
  pub interpreter: String,
  /// Output directory for built binaries, relative to the root.
  pub dist_dir: PathBuf,
}

impl Default for PythonConfig {
  fn default() -> Self {
    Self {
      interpreter: "python3".to_string(),
      dist_dir: PathBuf::from("dist"),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplConfig {
  /// Java launcher. Falls back to `$JAVA_HOME/bin/java`, then `java` on PATH.
  pub java: Option<PathBuf>,
  /// Main class of the REPL.
  pub main: Option<String>,
  pub jvm_args: Vec<String>,
  pub args: Vec<String>,
  /// Tool classpath entries, relative to the root unless absolute.
  pub classpath: Vec<PathBuf>,
}

impl Config {
  /// Loads the workspace config for `root`.
  ///
  /// `PLINTH_CONFIG` takes precedence over `<root>/plinth.toml`. A missing file
  /// yields the defaults.
  pub fn load(root: &Path) -> Result<Self, ConfigError> {
    let path = std::env::var_os(CONFIG_ENV)
      .map(PathBuf::from)
      .unwrap_or_else(|| root.join(CONFIG_FILENAME));

    if !path.exists() {
      debug!(path = %path.display(), "no config file, using defaults");
      return Ok(Self::default());
    }

    Self::from_file(&path)
  }

  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::parse(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
    toml::from_str(content)
  }
}

/// Determines the workspace root.
///
/// Order: the explicit argument, `PLINTH_ROOT`, the nearest ancestor of `cwd`
/// holding a `plinth.toml`, then `cwd` itself.
pub fn find_root(explicit: Option<&Path>, cwd: &Path) -> PathBuf {
  if let Some(root) = explicit {
    return canonical(root);
  }
  if let Some(root) = std::env::var_os(ROOT_ENV) {
    return canonical(Path::new(&root));
  }

  cwd
    .ancestors()
    .find(|dir| dir.join(CONFIG_FILENAME).is_file())
    .map(canonical)
    .unwrap_or_else(|| canonical(cwd))
}

fn canonical(path: &Path) -> PathBuf {
  dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
