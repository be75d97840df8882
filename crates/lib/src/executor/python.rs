//! Python executor.
//!
//! Runs the configured interpreter once per target, in set order:
//! - `python_tests`: `<interpreter> -m pytest <build args> <sources>`
//! - `python_binary`: `<interpreter> -m zipapp <package> -m <entry point> -o <dist>/<name>.pyz`
//! - `python_library`: nothing to do
//!
//! Output goes straight to the terminal. The first non-zero status stops the build.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{Executor, ExecutorError};
use crate::config::PythonConfig;
use crate::target::{Target, TargetKind, TargetSet};

pub struct PythonExecutor {
  root_dir: PathBuf,
  config: PythonConfig,
}

impl PythonExecutor {
  pub fn new(root_dir: impl Into<PathBuf>, config: PythonConfig) -> Self {
    Self {
      root_dir: root_dir.into(),
      config,
    }
  }

  fn dist_dir(&self) -> PathBuf {
    self.root_dir.join(&self.config.dist_dir)
  }

  /// Arguments for the interpreter, or `None` when the target needs no work.
  fn command_args(&self, target: &Target, build_args: &[String]) -> Option<Vec<String>> {
    match &target.kind {
      TargetKind::PythonTests => {
        let mut args = vec!["-m".to_string(), "pytest".to_string()];
        args.extend(build_args.iter().cloned());
        args.extend(target.root_relative_sources().map(|p| p.display().to_string()));
        Some(args)
      }
      TargetKind::PythonBinary { entry_point } => {
        let output = self.dist_dir().join(format!("{}.pyz", target.address.name()));
        Some(vec![
          "-m".to_string(),
          "zipapp".to_string(),
          target.address.package_dir().display().to_string(),
          "-m".to_string(),
          entry_point.clone(),
          "-o".to_string(),
          output.display().to_string(),
        ])
      }
      _ => None,
    }
  }

  fn run(&self, args: &[String], conn_timeout: Duration) -> Result<i32, ExecutorError> {
    let program = &self.config.interpreter;
    info!(program = %program, args = ?args, "running python builder");

    let status = Command::new(program)
      .args(args)
      .current_dir(&self.root_dir)
      .env("PIP_DEFAULT_TIMEOUT", conn_timeout.as_secs().to_string())
      .env("PLINTH_CONNECTION_TIMEOUT", conn_timeout.as_secs().to_string())
      .status()
      .map_err(|source| ExecutorError::Spawn {
        program: program.clone(),
        source,
      })?;

    // Killed by a signal: report a generic failure.
    Ok(status.code().unwrap_or(1))
  }
}

impl Executor for PythonExecutor {
  fn build(&self, targets: &TargetSet, build_args: &[String], conn_timeout: Duration) -> Result<i32, ExecutorError> {
    if targets.iter().any(|t| matches!(t.kind, TargetKind::PythonBinary { .. })) {
      ensure_dir(&self.dist_dir())?;
    }

    for target in targets {
      let Some(args) = self.command_args(target, build_args) else {
        debug!(target = %target, "nothing to build");
        continue;
      };

      let status = self.run(&args, conn_timeout)?;
      if status != 0 {
        warn!(target = %target, status, "python builder failed");
        return Ok(status);
      }
    }

    Ok(0)
  }
}

fn ensure_dir(dir: &Path) -> Result<(), ExecutorError> {
  std::fs::create_dir_all(dir)?;
  Ok(())
}
