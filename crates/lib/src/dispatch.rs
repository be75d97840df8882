//! Dispatching a resolved target set to a single executor.

use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::consts::NO_TARGETS_STATUS;
use crate::executor::{Executor, ExecutorError};
use crate::target::{Capability, TargetSet};

#[derive(Debug, Error)]
pub enum DispatchError {
  #[error("Cannot build target {target}")]
  Unsupported { target: String },

  #[error("Problem executing {capability} builder for targets {targets}: {source}")]
  Executor {
    capability: Capability,
    targets: String,
    #[source]
    source: ExecutorError,
  },
}

/// Builds `targets` with the python executor.
///
/// Every target must be a python target; the first one that isn't aborts the
/// dispatch before anything runs. An empty set returns [`NO_TARGETS_STATUS`]
/// without invoking the executor.
pub fn dispatch<E: Executor>(
  targets: &TargetSet,
  build_args: &[String],
  conn_timeout: Duration,
  python: &E,
) -> Result<i32, DispatchError> {
  let mut python_targets = TargetSet::new();

  for target in targets {
    match target.capability() {
      Some(Capability::Python) => {
        python_targets.insert(target.clone());
      }
      Some(Capability::Jvm) | None => {
        return Err(DispatchError::Unsupported {
          target: target.to_string(),
        });
      }
    }
  }

  if python_targets.is_empty() {
    info!("no python targets to build");
    return Ok(NO_TARGETS_STATUS);
  }

  info!(count = python_targets.len(), timeout = ?conn_timeout, "dispatching to python executor");
  python
    .build(&python_targets, build_args, conn_timeout)
    .map_err(|source| DispatchError::Executor {
      capability: Capability::Python,
      targets: python_targets.to_string(),
      source,
    })
}


#[cfg(test)]
mod tests {
  use super::testing::RecordingExecutor;
  use super::*;
  use crate::target::TargetKind;
  use crate::target::testing::target;

  const TIMEOUT: Duration = Duration::from_secs(7);

  #[test]
  fn python_targets_reach_the_executor() {
    let set: TargetSet = [target("foo:bar", TargetKind::PythonLibrary)].into_iter().collect();
    let exec = RecordingExecutor::default();

    let status = dispatch(&set, &[], TIMEOUT, &exec).unwrap();

    assert_eq!(status, 0);
    let calls = exec.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, vec!["//foo:bar"]);
    assert!(calls[0].1.is_empty());
    assert_eq!(calls[0].2, TIMEOUT);
  }

  #[test]
  fn mixed_capabilities_abort_before_building() {
    let set: TargetSet = [
      target("py:lib", TargetKind::PythonLibrary),
      target("jvm:lib", TargetKind::JavaLibrary),
    ]
    .into_iter()
    .collect();
    let exec = RecordingExecutor::default();

    let err = dispatch(&set, &[], TIMEOUT, &exec).unwrap_err();

    assert!(matches!(err, DispatchError::Unsupported { .. }));
    assert_eq!(err.to_string(), "Cannot build target java_library(//jvm:lib)");
    assert!(exec.calls.borrow().is_empty());
  }

  #[test]
  fn empty_set_returns_no_targets_status() {
    let exec = RecordingExecutor::default();
    let status = dispatch(&TargetSet::new(), &[], TIMEOUT, &exec).unwrap();
    assert_eq!(status, NO_TARGETS_STATUS);
    assert!(exec.calls.borrow().is_empty());
  }

  #[test]
  fn executor_status_is_passed_through() {
    let set: TargetSet = [target("foo:tests", TargetKind::PythonTests)].into_iter().collect();
    let exec = RecordingExecutor {
      status: 3,
      ..Default::default()
    };
    assert_eq!(
      dispatch(&set, &["--verbose".to_string()], TIMEOUT, &exec).unwrap(),
      3
    );
    assert_eq!(exec.calls.borrow()[0].1, vec!["--verbose"]);
  }

  #[test]
  fn executor_failure_is_wrapped_with_targets() {
    let set: TargetSet = [target("foo:tests", TargetKind::PythonTests)].into_iter().collect();
    let exec = RecordingExecutor {
      fail: true,
      ..Default::default()
    };

    let err = dispatch(&set, &[], TIMEOUT, &exec).unwrap_err();

    assert!(matches!(
      err,
      DispatchError::Executor {
        source: ExecutorError::Io(_),
        ..
      }
    ));
    let message = err.to_string();
    assert!(message.contains("python_tests(//foo:tests)"));
    assert!(message.contains("builder exploded"));
  }
}
