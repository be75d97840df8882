//! Build targets and resolved target sets.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::address::Address;

/// Language capability of a concrete target; selects the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
  Python,
  Jvm,
}

impl fmt::Display for Capability {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Capability::Python => write!(f, "python"),
      Capability::Jvm => write!(f, "jvm"),
    }
  }
}

/// What a target is. `Aggregate` only groups dependencies and is never built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetKind {
  #[serde(rename = "dependencies")]
  Aggregate,
  PythonLibrary,
  PythonBinary { entry_point: String },
  PythonTests,
  JavaLibrary,
  ScalaLibrary,
  JvmBinary { main: String },
}

impl TargetKind {
  pub fn capability(&self) -> Option<Capability> {
    match self {
      TargetKind::Aggregate => None,
      TargetKind::PythonLibrary | TargetKind::PythonBinary { .. } | TargetKind::PythonTests => Some(Capability::Python),
      TargetKind::JavaLibrary | TargetKind::ScalaLibrary | TargetKind::JvmBinary { .. } => Some(Capability::Jvm),
    }
  }

  /// Type name as written in build files.
  pub fn type_name(&self) -> &'static str {
    match self {
      TargetKind::Aggregate => "dependencies",
      TargetKind::PythonLibrary => "python_library",
      TargetKind::PythonBinary { .. } => "python_binary",
      TargetKind::PythonTests => "python_tests",
      TargetKind::JavaLibrary => "java_library",
      TargetKind::ScalaLibrary => "scala_library",
      TargetKind::JvmBinary { .. } => "jvm_binary",
    }
  }
}

/// A node in the dependency graph. Immutable once loaded and shared via `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
  pub address: Address,
  #[serde(flatten)]
  pub kind: TargetKind,
  /// Source files, relative to the package directory.
  pub sources: Vec<PathBuf>,
  pub dependencies: Vec<Address>,
}

impl Target {
  pub fn is_concrete(&self) -> bool {
    !matches!(self.kind, TargetKind::Aggregate)
  }

  pub fn capability(&self) -> Option<Capability> {
    self.kind.capability()
  }

  /// Source paths relative to the workspace root.
  pub fn root_relative_sources(&self) -> impl Iterator<Item = PathBuf> + '_ {
    self.sources.iter().map(|source| self.address.path().join(source))
  }
}

impl fmt::Display for Target {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}({})", self.kind.type_name(), self.address)
  }
}

/// Insertion-ordered set of unique targets, keyed by address.
#[derive(Debug, Clone, Default)]
pub struct TargetSet {
  targets: Vec<Arc<Target>>,
  seen: HashSet<Address>,
}

impl TargetSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Inserts `target` unless a target with the same address is present.
  /// Returns whether it was inserted.
  pub fn insert(&mut self, target: Arc<Target>) -> bool {
    if !self.seen.insert(target.address.clone()) {
      return false;
    }
    self.targets.push(target);
    true
  }

  pub fn contains(&self, address: &Address) -> bool {
    self.seen.contains(address)
  }

  pub fn len(&self) -> usize {
    self.targets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.targets.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Arc<Target>> {
    self.targets.iter()
  }

  pub fn addresses(&self) -> impl Iterator<Item = &Address> {
    self.targets.iter().map(|t| &t.address)
  }
}

impl Extend<Arc<Target>> for TargetSet {
  fn extend<I: IntoIterator<Item = Arc<Target>>>(&mut self, iter: I) {
    for target in iter {
      self.insert(target);
    }
  }
}

impl FromIterator<Arc<Target>> for TargetSet {
  fn from_iter<I: IntoIterator<Item = Arc<Target>>>(iter: I) -> Self {
    let mut set = TargetSet::new();
    set.extend(iter);
    set
  }
}

impl<'a> IntoIterator for &'a TargetSet {
  type Item = &'a Arc<Target>;
  type IntoIter = std::slice::Iter<'a, Arc<Target>>;

  fn into_iter(self) -> Self::IntoIter {
    self.targets.iter()
  }
}

impl fmt::Display for TargetSet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[")?;
    for (i, target) in self.targets.iter().enumerate() {
      if i > 0 {
        write!(f, ", ")?;
      }
      write!(f, "{}", target)?;
    }
    write!(f, "]")
  }
}

#[cfg(test)]
pub(crate) mod testing {
  use std::path::Path;

  use super::*;

  /// Builds a detached target for tests that don't need a build graph.
  pub fn target(spec: &str, kind: TargetKind) -> Arc<Target> {
    let address = Address::parse_relative(Path::new("/ws"), Path::new(""), spec).unwrap();
    Arc::new(Target {
      address,
      kind,
      sources: Vec::new(),
      dependencies: Vec::new(),
    })
  }
}
