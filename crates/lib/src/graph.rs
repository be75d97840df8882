//! Build file loading and target closures.
//!
//! Packages are loaded lazily: looking up a target parses its package's
//! `BUILD.toml` and then every package reachable through its dependencies, so
//! that [`BuildGraph::closure`] can walk the graph without touching the disk.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, trace};

use crate::address::{Address, AddressError};
use crate::target::{Target, TargetKind};

#[derive(Debug, Error)]
pub enum LookupError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid target name '{name}' in {path}: {source}")]
  InvalidName {
    path: PathBuf,
    name: String,
    #[source]
    source: AddressError,
  },

  #[error("target {address} is declared more than once")]
  Duplicate { address: Address },

  #[error("target {address} is missing required attribute '{attribute}'")]
  MissingAttribute { address: Address, attribute: &'static str },

  #[error("target {address} has an invalid dependency '{spec}': {source}")]
  BadDependency {
    address: Address,
    spec: String,
    #[source]
    source: AddressError,
  },

  #[error("target {address} depends on {dependency}, which does not exist")]
  MissingDependency { address: Address, dependency: Address },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BuildFile {
  #[serde(default, rename = "target")]
  targets: Vec<TargetDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TargetDecl {
  name: String,
  #[serde(rename = "type")]
  kind: KindDecl,
  #[serde(default)]
  sources: Vec<PathBuf>,
  #[serde(default)]
  dependencies: Vec<String>,
  entry_point: Option<String>,
  main: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum KindDecl {
  Dependencies,
  PythonLibrary,
  PythonBinary,
  PythonTests,
  JavaLibrary,
  ScalaLibrary,
  JvmBinary,
}

type Package = HashMap<String, Arc<Target>>;

/// Targets loaded from the build files under one root.
#[derive(Debug)]
pub struct BuildGraph {
  root_dir: PathBuf,
  packages: HashMap<PathBuf, Package>,
}

impl BuildGraph {
  pub fn new(root_dir: impl Into<PathBuf>) -> Self {
    Self {
      root_dir: root_dir.into(),
      packages: HashMap::new(),
    }
  }

  pub fn root_dir(&self) -> &Path {
    &self.root_dir
  }

  /// Returns an already-loaded target.
  pub fn get(&self, address: &Address) -> Option<&Arc<Target>> {
    self.packages.get(address.path())?.get(address.name())
  }

  /// Looks up the target at `address`, loading every package its closure needs.
  ///
  /// Returns `Ok(None)` when the package exists but declares no such target.
  pub fn lookup(&mut self, address: &Address) -> Result<Option<Arc<Target>>, LookupError> {
    let Some(target) = self.load_package(address.path())?.get(address.name()).cloned() else {
      return Ok(None);
    };

    let mut pending = vec![target.clone()];
    let mut expanded = HashSet::new();

    while let Some(current) = pending.pop() {
      if !expanded.insert(current.address.clone()) {
        continue;
      }
      for dependency in &current.dependencies {
        if !dependency.build_file().is_file() {
          return Err(LookupError::MissingDependency {
            address: current.address.clone(),
            dependency: dependency.clone(),
          });
        }
        match self.load_package(dependency.path())?.get(dependency.name()) {
          Some(next) => pending.push(next.clone()),
          None => {
            return Err(LookupError::MissingDependency {
              address: current.address.clone(),
              dependency: dependency.clone(),
            });
          }
        }
      }
    }

    debug!(address = %address, loaded = expanded.len(), "looked up target");
    Ok(Some(target))
  }

  /// Lazily walks `target` and everything it depends on, depth first, starting
  /// with `target` itself. Each target is yielded once.
  pub fn closure<'a>(&'a self, target: &Arc<Target>) -> Closure<'a> {
    let mut visited = HashSet::new();
    visited.insert(target.address.clone());
    Closure {
      graph: self,
      stack: vec![target.clone()],
      visited,
    }
  }

  fn load_package(&mut self, path: &Path) -> Result<&Package, LookupError> {
    if !self.packages.contains_key(path) {
      let package = self.parse_package(path)?;
      self.packages.insert(path.to_path_buf(), package);
    }
    Ok(&self.packages[path])
  }

  fn parse_package(&self, path: &Path) -> Result<Package, LookupError> {
    let dir = self.root_dir.join(path);
    let file = dir.join(crate::consts::BUILD_FILENAME);
    trace!(file = %file.display(), "parsing build file");

    let content = std::fs::read_to_string(&file).map_err(|source| LookupError::Read {
      path: file.clone(),
      source,
    })?;
    let decls: BuildFile = toml::from_str(&content).map_err(|source| LookupError::Parse {
      path: file.clone(),
      source,
    })?;

    let mut package = Package::new();
    for decl in decls.targets {
      let spec = format!(":{}", decl.name);
      let address = Address::parse_relative(&self.root_dir, path, &spec).map_err(|source| LookupError::InvalidName {
        path: file.clone(),
        name: decl.name.clone(),
        source,
      })?;
      let target = into_target(&self.root_dir, path, address, decl)?;
      if package.contains_key(target.address.name()) {
        return Err(LookupError::Duplicate {
          address: target.address,
        });
      }
      package.insert(target.address.name().to_string(), Arc::new(target));
    }

    Ok(package)
  }
}

fn into_target(root_dir: &Path, package: &Path, address: Address, decl: TargetDecl) -> Result<Target, LookupError> {
  let kind = match decl.kind {
    KindDecl::Dependencies => TargetKind::Aggregate,
    KindDecl::PythonLibrary => TargetKind::PythonLibrary,
    KindDecl::PythonTests => TargetKind::PythonTests,
    KindDecl::JavaLibrary => TargetKind::JavaLibrary,
    KindDecl::ScalaLibrary => TargetKind::ScalaLibrary,
    KindDecl::PythonBinary => TargetKind::PythonBinary {
      entry_point: decl.entry_point.ok_or_else(|| LookupError::MissingAttribute {
        address: address.clone(),
        attribute: "entry_point",
      })?,
    },
    KindDecl::JvmBinary => TargetKind::JvmBinary {
      main: decl.main.ok_or_else(|| LookupError::MissingAttribute {
        address: address.clone(),
        attribute: "main",
      })?,
    },
  };

  let dependencies = decl
    .dependencies
    .iter()
    .map(|spec| {
      Address::parse_relative(root_dir, package, spec).map_err(|source| LookupError::BadDependency {
        address: address.clone(),
        spec: spec.clone(),
        source,
      })
    })
    .collect::<Result<Vec<_>, _>>()?;

  Ok(Target {
    address,
    kind,
    sources: decl.sources,
    dependencies,
  })
}

/// Depth-first walk over a target's dependency closure.
///
/// Only targets loaded by [`BuildGraph::lookup`] are visited, so calling
/// `closure` again on an unchanged graph yields the same sequence.
pub struct Closure<'a> {
  graph: &'a BuildGraph,
  stack: Vec<Arc<Target>>,
  visited: HashSet<Address>,
}

impl Iterator for Closure<'_> {
  type Item = Arc<Target>;

  fn next(&mut self) -> Option<Self::Item> {
    let current = self.stack.pop()?;
    for dependency in current.dependencies.iter().rev() {
      if self.visited.contains(dependency) {
        continue;
      }
      if let Some(next) = self.graph.get(dependency) {
        self.visited.insert(dependency.clone());
        self.stack.push(next.clone());
      }
    }
    Some(current)
  }
}
