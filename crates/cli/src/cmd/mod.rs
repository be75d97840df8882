mod build;
mod repl;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use plinth_lib::config::{Config, find_root};
use plinth_lib::context::ExecutionContext;

pub use build::cmd_build;
pub use repl::cmd_repl;

/// Resolves the workspace root and loads its configuration.
fn load_workspace(root: Option<&Path>) -> Result<(PathBuf, Config)> {
  let cwd = std::env::current_dir().context("Failed to determine current directory")?;
  let root = find_root(root, &cwd);
  let config = Config::load(&root).context("Failed to load configuration")?;
  Ok((root, config))
}

/// Opens an execution context, taking the workspace run lock.
fn open_context(root: Option<&Path>, command: &str) -> Result<ExecutionContext> {
  let (root, config) = load_workspace(root)?;
  ExecutionContext::new(&root, config, command).context("Failed to acquire run lock")
}
