//! Per-invocation execution context.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::graph::BuildGraph;
use crate::run_lock::{ReleasedLock, RunLock, RunLockError};
use crate::terminal::{StdinTerminal, TerminalControl, TerminalGuard};
use crate::workunit::RunTracker;

/// State shared by everything one invocation does.
///
/// Creating a context takes the workspace run lock; it is held for the
/// context's lifetime except inside an [`InteractiveScope`].
pub struct ExecutionContext {
  root_dir: PathBuf,
  config: Config,
  run_tracker: RunTracker,
  lock: RunLock,
  terminal: Box<dyn TerminalControl>,
}

/// The run lock released and the terminal snapshotted, for one interactive
/// session. Dropping it restores the terminal first, then retakes the lock.
pub struct InteractiveScope<'a> {
  terminal: TerminalGuard<'a>,
  lock: ReleasedLock<'a>,
}

impl InteractiveScope<'_> {
  /// Restores the terminal, then retakes the lock and reports whether that
  /// worked.
  pub fn finish(self) -> Result<(), RunLockError> {
    let InteractiveScope { terminal, lock } = self;
    drop(terminal);
    lock.reacquire()
  }
}

impl ExecutionContext {
  pub fn new(root_dir: &Path, config: Config, command: &str) -> Result<Self, RunLockError> {
    let lock = RunLock::acquire(root_dir, command)?;
    Ok(Self {
      root_dir: root_dir.to_path_buf(),
      config,
      run_tracker: RunTracker::new(),
      lock,
      terminal: Box::new(StdinTerminal),
    })
  }

  /// Replaces the terminal the context saves and restores.
  pub fn with_terminal(mut self, terminal: Box<dyn TerminalControl>) -> Self {
    self.terminal = terminal;
    self
  }

  pub fn root_dir(&self) -> &Path {
    &self.root_dir
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn run_tracker(&self) -> &RunTracker {
    &self.run_tracker
  }

  pub fn lock(&self) -> &RunLock {
    &self.lock
  }

  /// A fresh build graph rooted at the workspace.
  pub fn build_graph(&self) -> BuildGraph {
    BuildGraph::new(&self.root_dir)
  }

  /// Releases the run lock, then captures the terminal settings.
  pub fn interactive_scope(&mut self) -> Result<InteractiveScope<'_>, RunLockError> {
    let lock = self.lock.release()?;
    let terminal = TerminalGuard::capture(self.terminal.as_ref());
    Ok(InteractiveScope { terminal, lock })
  }
}
