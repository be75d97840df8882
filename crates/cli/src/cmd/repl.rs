//! Implementation of the `plinth repl` command.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use plinth_lib::jvm::SessionEnd;
use plinth_lib::repl::{ReplOptions, ReplTask};
use plinth_lib::resolve::resolve_targets;

use super::open_context;
use crate::output::print_info;

/// Execute the repl command.
///
/// Resolves the specs, then runs one REPL session over their JVM targets. The
/// session's own exit status doesn't affect ours.
pub fn cmd_repl(root: Option<&Path>, specs: &[String], jvm_args: Vec<String>, args: Vec<String>) -> Result<i32> {
  let command = format!("repl {}", specs.join(" "));
  let mut ctx = open_context(root, &command)?;

  let targets = {
    let mut graph = ctx.build_graph();
    resolve_targets(ctx.root_dir(), specs, &mut graph).context("Failed to resolve targets")?
  };
  info!("repl operating on targets: {}", targets);

  let task = ReplTask::new(ctx.root_dir(), &ctx.config().repl, ReplOptions { jvm_args, args })
    .context("Invalid REPL options")?;
  let end = task.execute(&mut ctx, &targets).context("REPL failed")?;

  if end == SessionEnd::Interrupted {
    print_info("REPL interrupted");
  }

  Ok(0)
}
