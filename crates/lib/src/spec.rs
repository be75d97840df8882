//! Splitting command-line arguments into target specs and builder arguments.

use thiserror::Error;

/// Literal token separating specs from pass-through builder arguments.
pub const SEPARATOR: &str = "--";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
  #[error("A spec argument is required")]
  MissingSpec,
}

/// Target specs and the arguments passed through verbatim to the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitArgs {
  pub specs: Vec<String>,
  pub build_args: Vec<String>,
}

/// Splits `args` at the first `--`.
///
/// Without a separator only the first argument is a spec and everything after
/// it goes to the builder, so `a b c` yields specs `[a]` and build args `[b, c]`.
pub fn split_args<S: AsRef<str>>(args: &[S]) -> Result<SplitArgs, UsageError> {
  if args.is_empty() {
    return Err(UsageError::MissingSpec);
  }

  let owned = |items: &[S]| items.iter().map(|s| s.as_ref().to_string()).collect::<Vec<_>>();

  let (specs, build_args) = match args.iter().position(|arg| arg.as_ref() == SEPARATOR) {
    Some(end) => (owned(&args[..end]), owned(&args[end + 1..])),
    None => (owned(&args[..1]), owned(&args[1..])),
  };

  if specs.is_empty() {
    return Err(UsageError::MissingSpec);
  }

  Ok(SplitArgs { specs, build_args })
}
