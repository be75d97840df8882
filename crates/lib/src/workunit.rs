//! Hierarchical work-unit reporting.
//!
//! A [`RunTracker`] records named units of work as a tree. Opening a unit while
//! another is open nests it; the returned [`WorkUnitScope`] closes the unit on
//! drop. Reporting is observability only and never changes control flow.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkUnitLabel {
  Resolve,
  Build,
  Python,
  Jvm,
  Repl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
  Success,
  Failure,
  /// Closed without an outcome, e.g. while unwinding from an error.
  Aborted,
}

/// A finished or still-open unit, as it appears in the report.
#[derive(Debug, Clone, Serialize)]
pub struct WorkUnit {
  pub name: String,
  pub labels: Vec<WorkUnitLabel>,
  #[serde(skip_serializing_if = "String::is_empty")]
  pub cmd: String,
  pub outcome: Option<Outcome>,
  #[serde(serialize_with = "serialize_millis")]
  pub duration: Option<Duration>,
  pub children: Vec<WorkUnit>,
}

fn serialize_millis<S: serde::Serializer>(duration: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
  match duration {
    Some(d) => s.serialize_some(&(d.as_millis() as u64)),
    None => s.serialize_none(),
  }
}

#[derive(Debug, Default)]
struct TrackerState {
  roots: Vec<WorkUnit>,
  /// Child-index path from `roots` to each open unit.
  open: Vec<(usize, Instant)>,
}

impl TrackerState {
  fn unit_at_depth(&mut self, depth: usize) -> Option<&mut WorkUnit> {
    let (&(first, _), rest) = self.open.split_first()?;
    let mut unit = self.roots.get_mut(first)?;
    for &(index, _) in rest.iter().take(depth) {
      unit = unit.children.get_mut(index)?;
    }
    Some(unit)
  }
}

#[derive(Debug, Clone, Default)]
pub struct RunTracker {
  state: Arc<Mutex<TrackerState>>,
}

impl RunTracker {
  pub fn new() -> Self {
    Self::default()
  }

  /// Opens a unit nested under the innermost open one.
  pub fn new_workunit(&self, name: &str, labels: &[WorkUnitLabel], cmd: &str) -> WorkUnitScope {
    let mut state = self.lock();
    let unit = WorkUnit {
      name: name.to_string(),
      labels: labels.to_vec(),
      cmd: cmd.to_string(),
      outcome: None,
      duration: None,
      children: Vec::new(),
    };

    let state = &mut *state;
    let depth = state.open.len();
    let index = match depth.checked_sub(1).and_then(|parent| state.unit_at_depth(parent)) {
      Some(parent) => {
        parent.children.push(unit);
        parent.children.len() - 1
      }
      None => {
        state.roots.push(unit);
        state.roots.len() - 1
      }
    };
    state.open.push((index, Instant::now()));

    if cmd.is_empty() {
      info!(workunit = name, labels = ?labels, "starting");
    } else {
      info!(workunit = name, labels = ?labels, cmd, "starting");
    }

    WorkUnitScope {
      tracker: self.clone(),
      depth,
      outcome: None,
    }
  }

  /// Snapshot of the report tree.
  pub fn report(&self) -> Vec<WorkUnit> {
    self.lock().roots.clone()
  }

  fn close(&self, depth: usize, outcome: Outcome) {
    let mut state = self.lock();
    // Close anything nested deeper that was leaked, then this unit.
    while state.open.len() > depth + 1 {
      close_innermost(&mut state, Outcome::Aborted);
    }
    if state.open.len() == depth + 1 {
      close_innermost(&mut state, outcome);
    }
  }

  fn lock(&self) -> MutexGuard<'_, TrackerState> {
    self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

fn close_innermost(state: &mut TrackerState, outcome: Outcome) {
  let depth = state.open.len() - 1;
  let started = state.open[depth].1;
  if let Some(unit) = state.unit_at_depth(depth) {
    unit.outcome = Some(outcome);
    unit.duration = Some(started.elapsed());
    debug!(workunit = %unit.name, outcome = ?outcome, elapsed = ?started.elapsed(), "finished");
  }
  state.open.pop();
}

/// An open work unit; closed when dropped.
pub struct WorkUnitScope {
  tracker: RunTracker,
  depth: usize,
  outcome: Option<Outcome>,
}

impl WorkUnitScope {
  pub fn set_outcome(&mut self, outcome: Outcome) {
    self.outcome = Some(outcome);
  }
}

impl Drop for WorkUnitScope {
  fn drop(&mut self) {
    self
      .tracker
      .close(self.depth, self.outcome.unwrap_or(Outcome::Aborted));
  }
}
