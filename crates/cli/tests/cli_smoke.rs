//! CLI smoke tests for plinth.
//!
//! Each test builds a throwaway workspace of BUILD.toml files and checks the
//! exit status and output of the binary against it.

use std::path::Path;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the plinth binary, rooted at `root`.
fn plinth_cmd(root: &Path) -> Command {
  let mut cmd = cargo_bin_cmd!("plinth");
  cmd
    .arg("--root")
    .arg(root)
    .env_remove("PLINTH_CONFIG")
    .env_remove("PLINTH_ROOT")
    .env_remove("RUST_LOG");
  cmd
}

/// Create a temp workspace with the given `(package, BUILD.toml)` pairs.
fn workspace(packages: &[(&str, &str)]) -> TempDir {
  let temp = TempDir::new().unwrap();
  for (package, content) in packages {
    let dir = temp.path().join(package);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("BUILD.toml"), content).unwrap();
  }
  temp
}

fn write_config(root: &Path, content: &str) {
  std::fs::write(root.join("plinth.toml"), content).unwrap();
}

const FOO: &str = r#"
[[target]]
name = "bar"
type = "python_library"
sources = ["bar.py"]

[[target]]
name = "tests"
type = "python_tests"
sources = ["test_bar.py"]
dependencies = [":bar"]

[[target]]
name = "nothing"
type = "dependencies"

[[target]]
name = "mixed"
type = "dependencies"
dependencies = [":bar", "//jvm:lib"]
"#;

const JVM: &str = r#"
[[target]]
name = "lib"
type = "scala_library"
sources = ["Lib.scala"]
"#;

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  cargo_bin_cmd!("plinth")
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  cargo_bin_cmd!("plinth")
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("plinth"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["build", "repl"] {
    cargo_bin_cmd!("plinth")
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

// =============================================================================
// Build
// =============================================================================

#[test]
fn build_library_succeeds() {
  let ws = workspace(&[("foo", FOO), ("jvm", JVM)]);

  plinth_cmd(ws.path())
    .args(["build", "//foo:bar"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Build operating on targets: [python_library(//foo:bar)]"))
    .stdout(predicate::str::contains("Build complete!"));
}

#[test]
fn build_without_spec_is_a_usage_error() {
  let ws = workspace(&[("foo", FOO)]);

  plinth_cmd(ws.path())
    .arg("build")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("A spec argument is required"));
}

#[test]
fn build_mixed_capabilities_fails() {
  let ws = workspace(&[("foo", FOO), ("jvm", JVM)]);

  plinth_cmd(ws.path())
    .args(["build", "foo:mixed"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Cannot build target scala_library(//jvm:lib)"));
}

#[test]
fn build_unknown_target_fails() {
  let ws = workspace(&[("foo", FOO)]);

  plinth_cmd(ws.path())
    .args(["build", "foo:missing"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Target //foo:missing does not exist"));
}

#[test]
fn build_without_build_file_fails() {
  let ws = workspace(&[("foo", FOO)]);

  plinth_cmd(ws.path())
    .args(["build", "nowhere:bar"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Problem parsing spec nowhere:bar"));
}

#[cfg(unix)]
#[test]
fn build_with_no_qualifying_targets_exits_255() {
  let ws = workspace(&[("foo", FOO)]);

  plinth_cmd(ws.path())
    .args(["build", "foo:nothing"])
    .assert()
    .code(255)
    .stderr(predicate::str::contains("No python targets to build"));
}

#[cfg(unix)]
#[test]
fn build_returns_builder_status() {
  let ws = workspace(&[("foo", FOO)]);
  write_config(ws.path(), "[python]\ninterpreter = \"false\"\n");

  plinth_cmd(ws.path())
    .args(["build", "foo:tests", "--", "-k", "slow"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Build failed with exit status 1"));
}

#[test]
fn build_json_output_reports_targets_and_workunits() {
  let ws = workspace(&[("foo", FOO)]);

  plinth_cmd(ws.path())
    .args(["-o", "json", "build", "foo:bar"])
    .assert()
    .success()
    .stdout(predicate::str::contains("\"status\": 0"))
    .stdout(predicate::str::contains("\"address\": \"//foo:bar\""))
    .stdout(predicate::str::contains("\"name\": \"resolve\""))
    .stdout(predicate::str::contains("Build operating on targets").not());
}

#[test]
fn invalid_config_fails() {
  let ws = workspace(&[("foo", FOO)]);
  write_config(ws.path(), "[python]\nunknown = 1\n");

  plinth_cmd(ws.path())
    .args(["build", "foo:bar"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Failed to load configuration"));
}

// =============================================================================
// REPL
// =============================================================================

#[test]
fn repl_without_main_class_fails() {
  let ws = workspace(&[("jvm", JVM)]);

  plinth_cmd(ws.path())
    .args(["repl", "jvm:lib"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("no REPL main class configured"));
}

#[cfg(unix)]
#[test]
fn repl_runs_configured_launcher() {
  let ws = workspace(&[("jvm", JVM)]);
  write_config(
    ws.path(),
    r#"
[repl]
java = "/bin/sh"
main = "Main"
jvm_args = ["-c", "exit 4"]
"#,
  );

  // The session's own status is not propagated.
  plinth_cmd(ws.path()).args(["repl", "jvm:lib"]).assert().success();
}

#[test]
fn repl_with_unbalanced_quote_fails() {
  let ws = workspace(&[("jvm", JVM)]);
  write_config(ws.path(), "[repl]\nmain = \"Main\"\n");

  plinth_cmd(ws.path())
    .args(["repl", "--jvm-arg", "-Dfoo='bar", "jvm:lib"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Invalid REPL options"));
}

#[cfg(unix)]
#[test]
fn repl_splits_jvm_arg_values() {
  let ws = workspace(&[("jvm", JVM)]);
  let marker = ws.path().join("ran");
  write_config(ws.path(), "[repl]\njava = \"/bin/sh\"\nmain = \"Main\"\n");

  // One flag value becomes `-c <script>` for the shell standing in for java.
  plinth_cmd(ws.path())
    .arg("repl")
    .arg("--jvm-arg")
    .arg(format!("-c 'touch {}'", marker.display()))
    .arg("jvm:lib")
    .assert()
    .success();

  assert!(marker.exists());
}
