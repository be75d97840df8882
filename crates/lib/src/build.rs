//! The `build` pipeline: split arguments, resolve specs, dispatch.

use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::context::ExecutionContext;
use crate::dispatch::{DispatchError, dispatch};
use crate::executor::Executor;
use crate::resolve::{ResolveError, resolve_targets};
use crate::spec::{UsageError, split_args};
use crate::target::TargetSet;
use crate::workunit::{Outcome, WorkUnitLabel};

#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Usage(#[from] UsageError),

  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error(transparent)]
  Dispatch(#[from] DispatchError),
}

/// What a build ran on and the status it finished with.
#[derive(Debug)]
pub struct BuildOutcome {
  pub targets: TargetSet,
  pub status: i32,
}

impl BuildOutcome {
  pub fn succeeded(&self) -> bool {
    self.status == 0
  }
}

/// Runs a build over raw command-line arguments.
///
/// `conn_timeout` overrides the configured connection timeout.
pub fn run_build<S, E>(
  ctx: &ExecutionContext,
  args: &[S],
  conn_timeout: Option<Duration>,
  python: &E,
) -> Result<BuildOutcome, BuildError>
where
  S: AsRef<str>,
  E: Executor,
{
  run_build_with(ctx, args, conn_timeout, python, |_| {})
}

/// Like [`run_build`], calling `on_resolved` with the targets once they are
/// resolved and before anything is dispatched.
pub fn run_build_with<S, E, F>(
  ctx: &ExecutionContext,
  args: &[S],
  conn_timeout: Option<Duration>,
  python: &E,
  on_resolved: F,
) -> Result<BuildOutcome, BuildError>
where
  S: AsRef<str>,
  E: Executor,
  F: FnOnce(&TargetSet),
{
  let split = split_args(args)?;
  let conn_timeout = conn_timeout.unwrap_or_else(|| ctx.config().defaults.connection_timeout());

  let tracker = ctx.run_tracker();
  let mut build = tracker.new_workunit("build", &[WorkUnitLabel::Build], "");

  let targets = {
    let mut resolve = tracker.new_workunit("resolve", &[WorkUnitLabel::Resolve], "");
    let mut graph = ctx.build_graph();
    let targets = resolve_targets(ctx.root_dir(), &split.specs, &mut graph)?;
    resolve.set_outcome(Outcome::Success);
    targets
  };
  info!("build operating on targets: {}", targets);
  on_resolved(&targets);

  let status = {
    let mut python_unit = tracker.new_workunit("python", &[WorkUnitLabel::Python], "");
    let status = dispatch(&targets, &split.build_args, conn_timeout, python)?;
    python_unit.set_outcome(if status == 0 { Outcome::Success } else { Outcome::Failure });
    status
  };

  build.set_outcome(if status == 0 { Outcome::Success } else { Outcome::Failure });
  Ok(BuildOutcome { targets, status })
}
