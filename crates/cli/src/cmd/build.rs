//! Implementation of the `plinth build` command.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;

use plinth_lib::build::run_build_with;
use plinth_lib::consts::NO_TARGETS_STATUS;
use plinth_lib::executor::PythonExecutor;
use plinth_lib::target::Target;
use plinth_lib::workunit::WorkUnit;

use super::open_context;
use crate::output::{
  OutputFormat, format_duration, print_error, print_info, print_json, print_stat, print_success, print_warning,
};

#[derive(Serialize)]
struct BuildReport<'a> {
  targets: Vec<&'a Target>,
  status: i32,
  workunits: Vec<WorkUnit>,
}

/// Execute the build command.
///
/// Returns the process exit status: the builder's status, or
/// [`NO_TARGETS_STATUS`] when nothing qualified for building.
pub fn cmd_build(root: Option<&Path>, args: &[String], timeout: Option<Duration>, output: OutputFormat) -> Result<i32> {
  let start = Instant::now();

  let command = std::iter::once("build")
    .chain(args.iter().map(String::as_str))
    .collect::<Vec<_>>()
    .join(" ");
  let ctx = open_context(root, &command)?;

  let python = PythonExecutor::new(ctx.root_dir(), ctx.config().python.clone());
  let outcome = run_build_with(&ctx, args, timeout, &python, |targets| {
    if !output.is_json() {
      print_info(&format!("Build operating on targets: {}", targets));
    }
  })
  .context("Build failed")?;

  if output.is_json() {
    print_json(&BuildReport {
      targets: outcome.targets.iter().map(|target| target.as_ref()).collect(),
      status: outcome.status,
      workunits: ctx.run_tracker().report(),
    })?;
    return Ok(outcome.status);
  }

  println!();
  match outcome.status {
    0 => print_success("Build complete!"),
    NO_TARGETS_STATUS => print_warning("No python targets to build"),
    status => print_error(&format!("Build failed with exit status {}", status)),
  }
  print_stat("Targets", &outcome.targets.len().to_string());
  print_stat("Duration", &format_duration(start.elapsed()));

  Ok(outcome.status)
}
