mod cmd;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{cmd_build, cmd_repl};
use output::{OutputFormat, print_error};

/// plinth - build targets and open REPLs over a BUILD.toml workspace
#[derive(Parser)]
#[command(name = "plinth")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Workspace root (default: $PLINTH_ROOT, else the nearest directory with plinth.toml)
  #[arg(long, global = true)]
  root: Option<PathBuf>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build targets with their language builder
  ///
  /// `plinth build SPEC... -- ARGS` passes ARGS to the builder. Without `--`,
  /// only the first argument is a spec and the rest go to the builder.
  Build {
    /// Connection timeout for the builder, in seconds or as a duration (e.g. 90s)
    #[arg(short, long, value_parser = parse_timeout)]
    timeout: Option<Duration>,

    /// Target specs, optionally followed by `--` and builder arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
  },

  /// Open a JVM REPL with the targets on the classpath
  Repl {
    /// Extra JVM arguments, split like a shell would (repeatable)
    #[arg(long = "jvm-arg", allow_hyphen_values = true)]
    jvm_args: Vec<String>,

    /// Extra REPL main class arguments, split like a shell would (repeatable)
    #[arg(long = "arg", allow_hyphen_values = true)]
    args: Vec<String>,

    /// Target specs
    #[arg(required = true)]
    specs: Vec<String>,
  },
}

fn parse_timeout(value: &str) -> Result<Duration, humantime::DurationError> {
  match value.parse::<u64>() {
    Ok(secs) => Ok(Duration::from_secs(secs)),
    Err(_) => humantime::parse_duration(value),
  }
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = if cli.verbose {
    EnvFilter::new(default_level)
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match run(cli) {
    Ok(status) => std::process::exit(status),
    Err(err) => {
      print_error(&format!("{err:#}"));
      std::process::exit(1);
    }
  }
}

fn run(cli: Cli) -> Result<i32> {
  let root = cli.root.as_deref();
  match cli.command {
    Commands::Build { timeout, args } => cmd_build(root, &args, timeout, cli.output),
    Commands::Repl { jvm_args, args, specs } => cmd_repl(root, &specs, jvm_args, args),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timeout_accepts_plain_seconds_and_durations() {
    assert_eq!(parse_timeout("20").unwrap(), Duration::from_secs(20));
    assert_eq!(parse_timeout("2m").unwrap(), Duration::from_secs(120));
    assert!(parse_timeout("soon").is_err());
  }

  #[test]
  fn build_keeps_separator_and_hyphen_args() {
    let cli = Cli::try_parse_from(["plinth", "build", "-t", "5", "foo:bar", "--", "-k", "slow"]).unwrap();
    match cli.command {
      Commands::Build { timeout, args } => {
        assert_eq!(timeout, Some(Duration::from_secs(5)));
        assert_eq!(args, vec!["foo:bar", "--", "-k", "slow"]);
      }
      Commands::Repl { .. } => panic!("expected build"),
    }
  }

  #[test]
  fn build_options_after_the_first_spec_are_passed_through() {
    let cli = Cli::try_parse_from(["plinth", "build", "foo:tests", "-t", "5"]).unwrap();
    match cli.command {
      Commands::Build { timeout, args } => {
        assert_eq!(timeout, None);
        assert_eq!(args, vec!["foo:tests", "-t", "5"]);
      }
      Commands::Repl { .. } => panic!("expected build"),
    }
  }

  #[test]
  fn repl_collects_repeated_flags() {
    let cli = Cli::try_parse_from([
      "plinth",
      "repl",
      "--jvm-arg",
      "-Xmx2g",
      "--jvm-arg",
      "-Dfoo=bar",
      "--arg",
      "-usejavacp",
      "src/scala:lib",
    ])
    .unwrap();
    match cli.command {
      Commands::Repl { jvm_args, args, specs } => {
        assert_eq!(jvm_args, vec!["-Xmx2g", "-Dfoo=bar"]);
        assert_eq!(args, vec!["-usejavacp"]);
        assert_eq!(specs, vec!["src/scala:lib"]);
      }
      Commands::Build { .. } => panic!("expected repl"),
    }
  }

  #[test]
  fn repl_requires_a_spec() {
    assert!(Cli::try_parse_from(["plinth", "repl"]).is_err());
  }
}
