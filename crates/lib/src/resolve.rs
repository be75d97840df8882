//! Resolving specs into a deduplicated set of concrete targets.

use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::address::{Address, AddressError};
use crate::graph::{BuildGraph, LookupError};
use crate::target::TargetSet;

#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("Problem parsing spec {spec}: {source}")]
  Spec {
    spec: String,
    #[source]
    source: AddressError,
  },

  #[error("Problem parsing BUILD target {address}: {source}")]
  Lookup {
    address: Address,
    #[source]
    source: LookupError,
  },

  #[error("Target {address} does not exist")]
  Missing { address: Address },
}

/// Resolves every spec, in order, and unions the concrete targets of their
/// closures. Stops at the first spec that fails.
pub fn resolve_targets<S: AsRef<str>>(
  root_dir: &Path,
  specs: &[S],
  graph: &mut BuildGraph,
) -> Result<TargetSet, ResolveError> {
  let mut targets = TargetSet::new();

  for spec in specs {
    let spec = spec.as_ref();
    let address = Address::parse(root_dir, spec).map_err(|source| ResolveError::Spec {
      spec: spec.to_string(),
      source,
    })?;

    let target = graph
      .lookup(&address)
      .map_err(|source| ResolveError::Lookup {
        address: address.clone(),
        source,
      })?
      .ok_or_else(|| ResolveError::Missing {
        address: address.clone(),
      })?;

    let before = targets.len();
    targets.extend(graph.closure(&target).filter(|t| t.is_concrete()));
    debug!(spec, address = %address, added = targets.len() - before, "resolved spec");
  }

  Ok(targets)
}
