//! Language-specific build executors.

pub mod python;

use std::time::Duration;

use thiserror::Error;

use crate::target::TargetSet;

pub use python::PythonExecutor;

#[derive(Debug, Error)]
pub enum ExecutorError {
  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Builds a set of targets that all share one capability.
pub trait Executor {
  /// Returns the builder's exit status; zero means success.
  fn build(&self, targets: &TargetSet, build_args: &[String], conn_timeout: Duration) -> Result<i32, ExecutorError>;
}
