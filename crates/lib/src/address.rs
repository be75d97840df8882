//! Target addresses and spec parsing.
//!
//! A spec names one build-definition entry relative to the workspace root:
//!
//! - `//src/app:server` or `src/app:server`: target `server` in `src/app`
//! - `src/app`: target `app` in `src/app` (name defaults to the last component)
//! - `:tools`: target `tools` in the root package
//!
//! Parsing is a pure function of the root and the spec, plus the existence of the
//! package's `BUILD.toml`.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::consts::BUILD_FILENAME;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
  #[error("empty spec")]
  Empty,

  #[error("spec '{spec}' has an empty target name")]
  EmptyName { spec: String },

  #[error("spec '{spec}' names no package and no target")]
  NoName { spec: String },

  #[error("spec '{spec}' must be relative to the root and must not contain '..'")]
  InvalidPath { spec: String },

  #[error("no {} in {}", BUILD_FILENAME, .dir.display())]
  NoBuildFile { dir: PathBuf },
}

/// Identity of one entry in a build file: `(root_dir, path, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
  root_dir: PathBuf,
  path: PathBuf,
  name: String,
}

impl Address {
  /// Parses `spec` relative to `root_dir` and checks the package has a build file.
  pub fn parse(root_dir: &Path, spec: &str) -> Result<Self, AddressError> {
    let address = Self::parse_relative(root_dir, Path::new(""), spec)?;

    let dir = address.package_dir();
    if !dir.join(BUILD_FILENAME).is_file() {
      return Err(AddressError::NoBuildFile { dir });
    }

    Ok(address)
  }

  /// Parses a dependency spec declared in the package at `package`.
  ///
  /// `:name` refers to the declaring package; anything else is root-relative.
  /// The build file is not checked here; lookup reports missing packages.
  pub fn parse_relative(root_dir: &Path, package: &Path, spec: &str) -> Result<Self, AddressError> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
      return Err(AddressError::Empty);
    }

    let (raw_path, name) = match trimmed.rsplit_once(':') {
      Some((path, name)) => (path, Some(name)),
      None => (trimmed, None),
    };

    let path = if raw_path.is_empty() && name.is_some() && !trimmed.starts_with("//") {
      package.to_path_buf()
    } else {
      normalize(raw_path).ok_or_else(|| AddressError::InvalidPath {
        spec: trimmed.to_string(),
      })?
    };

    let name = match name {
      Some("") => {
        return Err(AddressError::EmptyName {
          spec: trimmed.to_string(),
        });
      }
      Some(name) => name.to_string(),
      None => path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| AddressError::NoName {
          spec: trimmed.to_string(),
        })?,
    };

    Ok(Self {
      root_dir: root_dir.to_path_buf(),
      path,
      name,
    })
  }

  pub fn root_dir(&self) -> &Path {
    &self.root_dir
  }

  /// Package path relative to the root.
  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Absolute directory of the package.
  pub fn package_dir(&self) -> PathBuf {
    self.root_dir.join(&self.path)
  }

  pub fn build_file(&self) -> PathBuf {
    self.package_dir().join(BUILD_FILENAME)
  }
}

impl fmt::Display for Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let path = self
      .path
      .components()
      .map(|c| c.as_os_str().to_string_lossy())
      .collect::<Vec<_>>()
      .join("/");
    write!(f, "//{}:{}", path, self.name)
  }
}

impl Serialize for Address {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

/// Normalizes a root-relative package path, rejecting absolute paths and `..`.
fn normalize(raw: &str) -> Option<PathBuf> {
  let raw = raw.strip_prefix("//").unwrap_or(raw);
  let mut path = PathBuf::new();
  for component in Path::new(raw).components() {
    match component {
      Component::Normal(part) => path.push(part),
      Component::CurDir => {}
      Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
    }
  }
  Some(path)
}
