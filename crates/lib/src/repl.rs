//! Interactive JVM REPL task.
//!
//! A REPL session can last a long time, so the task lets other invocations run
//! meanwhile: it releases the run lock and snapshots the terminal, runs the JVM
//! attached to the terminal, then restores the terminal and takes the lock back.
//! The restore and retake happen however the session ends, including errors
//! before the JVM starts and Ctrl-C while it runs.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::ReplConfig;
use crate::consts::CONFIG_FILENAME;
use crate::context::ExecutionContext;
use crate::jvm::{JavaInvocation, SessionEnd};
use crate::run_lock::RunLockError;
use crate::target::{Capability, TargetSet};
use crate::workunit::{Outcome, RunTracker, WorkUnitLabel};

#[derive(Debug, Error)]
pub enum ReplError {
  #[error("no REPL main class configured; set repl.main in {}", CONFIG_FILENAME)]
  MissingConfig,

  #[error("run lock error: {0}")]
  Lock(#[from] RunLockError),

  #[error("could not split REPL option {value:?}: unbalanced quotes or trailing escape")]
  BadOption { value: String },

  #[error("failed to start async runtime: {0}")]
  Runtime(#[source] std::io::Error),

  #[error("failed to launch {}: {source}", .java.display())]
  Launch {
    java: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Extra command-line options, appended to the configured ones.
///
/// Each value is split into words with shell quoting rules, so one
/// `--jvm-arg "-Xmx1g -Dfoo=bar"` adds two JVM arguments.
#[derive(Debug, Clone, Default)]
pub struct ReplOptions {
  pub jvm_args: Vec<String>,
  pub args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ReplTask {
  java: PathBuf,
  main: Option<String>,
  jvm_args: Vec<String>,
  args: Vec<String>,
  tool_classpath: Vec<PathBuf>,
}

impl ReplTask {
  pub fn new(root_dir: &Path, config: &ReplConfig, options: ReplOptions) -> Result<Self, ReplError> {
    let mut jvm_args = config.jvm_args.clone();
    jvm_args.extend(split_words(options.jvm_args)?);
    let mut args = config.args.clone();
    args.extend(split_words(options.args)?);

    Ok(Self {
      java: JavaInvocation::locate_java(config.java.as_deref()),
      main: config.main.clone(),
      jvm_args,
      args,
      tool_classpath: config.classpath.iter().map(|entry| root_dir.join(entry)).collect(),
    })
  }

  /// The JVM command for a session over `targets`.
  ///
  /// The classpath is the configured tool classpath followed by the package
  /// directories of the JVM targets, without duplicates.
  pub fn invocation(&self, targets: &TargetSet) -> Result<JavaInvocation, ReplError> {
    let main = self.main.clone().ok_or(ReplError::MissingConfig)?;

    let mut classpath = self.tool_classpath.clone();
    for target in targets {
      if target.capability() != Some(Capability::Jvm) {
        continue;
      }
      let dir = target.address.package_dir();
      if !classpath.contains(&dir) {
        classpath.push(dir);
      }
    }

    Ok(JavaInvocation {
      java: self.java.clone(),
      jvm_args: self.jvm_args.clone(),
      classpath,
      main,
      args: self.args.clone(),
    })
  }

  /// Runs one REPL session.
  ///
  /// A non-zero exit of the REPL is reported in the returned [`SessionEnd`],
  /// not as an error. Failing to retake the run lock afterwards is an error.
  pub fn execute(&self, ctx: &mut ExecutionContext, targets: &TargetSet) -> Result<SessionEnd, ReplError> {
    let tracker = ctx.run_tracker().clone();
    let scope = ctx.interactive_scope()?;
    let session = self.run_session(&tracker, targets);
    scope.finish()?;
    session
  }

  fn run_session(&self, tracker: &RunTracker, targets: &TargetSet) -> Result<SessionEnd, ReplError> {
    let invocation = self.invocation(targets)?;
    let cmd = invocation.command_line();

    let mut workunit = tracker.new_workunit("repl", &[WorkUnitLabel::Repl, WorkUnitLabel::Jvm], &cmd);

    let runtime = tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .map_err(ReplError::Runtime)?;

    // Start REPL output on a fresh line.
    println!();
    let end = runtime
      .block_on(invocation.run_interactive())
      .map_err(|source| ReplError::Launch {
        java: invocation.java.clone(),
        source,
      })?;

    match end {
      SessionEnd::Interrupted => {
        debug!("repl session interrupted");
        workunit.set_outcome(Outcome::Success);
      }
      SessionEnd::Exited(Some(0)) => {
        workunit.set_outcome(Outcome::Success);
      }
      SessionEnd::Exited(code) => {
        info!(code = ?code, "repl exited with non-zero status");
        workunit.set_outcome(Outcome::Failure);
      }
    }

    Ok(end)
  }
}

fn split_words(values: Vec<String>) -> Result<Vec<String>, ReplError> {
  let mut words = Vec::new();
  for value in values {
    match shlex::split(&value) {
      Some(split) => words.extend(split),
      None => return Err(ReplError::BadOption { value }),
    }
  }
  Ok(words)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;
  use crate::target::TargetKind;
  use crate::target::testing::target;
  use crate::terminal::testing::CountingTerminal;
  use serial_test::serial;
  use tempfile::TempDir;

  fn repl_config(java: &str, main: Option<&str>) -> ReplConfig {
    ReplConfig {
      java: Some(PathBuf::from(java)),
      main: main.map(str::to_string),
      jvm_args: vec!["-Xmx1g".to_string()],
      args: vec!["-usejavacp".to_string()],
      classpath: vec![PathBuf::from("3rdparty/scala.jar")],
    }
  }

  fn context(root: &Path, terminal: &CountingTerminal) -> ExecutionContext {
    ExecutionContext::new(root, Config::default(), "repl")
      .unwrap()
      .with_terminal(Box::new(terminal.clone()))
  }

  fn options(jvm_args: &[&str], args: &[&str]) -> ReplOptions {
    ReplOptions {
      jvm_args: jvm_args.iter().map(|s| s.to_string()).collect(),
      args: args.iter().map(|s| s.to_string()).collect(),
    }
  }

  #[test]
  fn options_extend_configured_arguments() {
    let task = ReplTask::new(
      Path::new("/ws"),
      &repl_config("java", Some("Main")),
      options(&["-Dfoo=bar"], &["-deprecation"]),
    )
    .unwrap();

    let inv = task.invocation(&TargetSet::new()).unwrap();

    assert_eq!(inv.jvm_args, vec!["-Xmx1g", "-Dfoo=bar"]);
    assert_eq!(inv.args, vec!["-usejavacp", "-deprecation"]);
    assert_eq!(inv.classpath, vec![PathBuf::from("/ws/3rdparty/scala.jar")]);
  }

  #[test]
  fn option_values_are_split_into_words() {
    let task = ReplTask::new(
      Path::new("/ws"),
      &repl_config("java", Some("Main")),
      options(&["-Xss4m -Dfoo=bar"], &["-i 'init script.scala'"]),
    )
    .unwrap();

    let inv = task.invocation(&TargetSet::new()).unwrap();

    assert_eq!(inv.jvm_args, vec!["-Xmx1g", "-Xss4m", "-Dfoo=bar"]);
    assert_eq!(inv.args, vec!["-usejavacp", "-i", "init script.scala"]);
  }

  #[test]
  fn unbalanced_quotes_are_rejected() {
    let err = ReplTask::new(
      Path::new("/ws"),
      &repl_config("java", Some("Main")),
      options(&["-Dfoo='bar"], &[]),
    )
    .unwrap_err();

    match err {
      ReplError::BadOption { value } => assert_eq!(value, "-Dfoo='bar"),
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn jvm_target_packages_join_the_classpath_once() {
    let task = ReplTask::new(Path::new("/ws"), &repl_config("java", Some("Main")), ReplOptions::default()).unwrap();
    let targets: TargetSet = [
      target("src/scala/app:lib", TargetKind::ScalaLibrary),
      target("src/scala/app:other", TargetKind::JavaLibrary),
      target("src/python/app:lib", TargetKind::PythonLibrary),
    ]
    .into_iter()
    .collect();

    let inv = task.invocation(&targets).unwrap();

    assert_eq!(
      inv.classpath,
      vec![
        PathBuf::from("/ws/3rdparty/scala.jar"),
        PathBuf::from("/ws/src/scala/app")
      ]
    );
  }

  #[test]
  fn missing_main_fails_but_still_restores() {
    let temp = TempDir::new().unwrap();
    let terminal = CountingTerminal::default();
    let mut ctx = context(temp.path(), &terminal);
    let task = ReplTask::new(temp.path(), &repl_config("java", None), ReplOptions::default()).unwrap();

    let err = task.execute(&mut ctx, &TargetSet::new()).unwrap_err();

    assert!(matches!(err, ReplError::MissingConfig));
    assert_eq!(terminal.restores.get(), 1);
    assert!(ctx.lock().is_held());
    assert!(ctx.run_tracker().report().is_empty());
  }

  #[cfg(unix)]
  fn shell_task(root: &Path, script: &str) -> ReplTask {
    // `/bin/sh -Xmx1g` would fail, so replace the JVM args with `-c <script>`.
    let mut config = repl_config("/bin/sh", Some("Main"));
    config.jvm_args = vec!["-c".to_string(), script.to_string()];
    ReplTask::new(root, &config, ReplOptions::default()).unwrap()
  }

  #[cfg(unix)]
  #[test]
  #[serial]
  fn interrupted_session_returns_normally_and_restores_once() {
    let temp = TempDir::new().unwrap();
    let terminal = CountingTerminal::default();
    let mut ctx = context(temp.path(), &terminal);

    let end = shell_task(temp.path(), "kill -INT $$")
      .execute(&mut ctx, &TargetSet::new())
      .unwrap();

    assert_eq!(end, SessionEnd::Interrupted);
    assert_eq!(terminal.captures.get(), 1);
    assert_eq!(terminal.restores.get(), 1);
    assert!(ctx.lock().is_held());

    let report = ctx.run_tracker().report();
    assert_eq!(report[0].name, "repl");
    assert_eq!(report[0].outcome, Some(Outcome::Success));
    assert!(report[0].cmd.starts_with("/bin/sh -c"));
  }

  #[cfg(unix)]
  #[test]
  #[serial]
  fn ctrl_c_to_plinth_ends_the_session_as_interrupted() {
    let temp = TempDir::new().unwrap();
    let terminal = CountingTerminal::default();
    let mut ctx = context(temp.path(), &terminal);

    let end = shell_task(temp.path(), "sleep 0.5; kill -INT $PPID; sleep 0.5; exit 0")
      .execute(&mut ctx, &TargetSet::new())
      .unwrap();

    assert_eq!(end, SessionEnd::Interrupted);
    assert_eq!(terminal.restores.get(), 1);
    assert!(ctx.lock().is_held());
  }

  #[cfg(unix)]
  #[test]
  #[serial]
  fn non_zero_exit_is_not_an_error() {
    let temp = TempDir::new().unwrap();
    let terminal = CountingTerminal::default();
    let mut ctx = context(temp.path(), &terminal);

    let end = shell_task(temp.path(), "exit 7")
      .execute(&mut ctx, &TargetSet::new())
      .unwrap();

    assert_eq!(end, SessionEnd::Exited(Some(7)));
    assert_eq!(terminal.restores.get(), 1);
    assert_eq!(ctx.run_tracker().report()[0].outcome, Some(Outcome::Failure));
  }

  #[cfg(unix)]
  #[test]
  #[serial]
  fn lock_is_free_while_the_session_runs() {
    if std::process::Command::new("flock").arg("--version").output().is_err() {
      return;
    }
    let temp = TempDir::new().unwrap();
    let terminal = CountingTerminal::default();
    let mut ctx = context(temp.path(), &terminal);
    let lock_path = ctx.lock().lock_path().to_path_buf();

    // The child takes the lock itself; this only succeeds if we released it.
    let script = format!("exec 9>>'{}' && flock -n 9", lock_path.display());
    let end = shell_task(temp.path(), &script)
      .execute(&mut ctx, &TargetSet::new())
      .unwrap();

    assert_eq!(end, SessionEnd::Exited(Some(0)));
    assert!(ctx.lock().is_held());
  }

  #[test]
  #[serial]
  fn launch_failure_is_a_task_error_and_restores() {
    let temp = TempDir::new().unwrap();
    let terminal = CountingTerminal::default();
    let mut ctx = context(temp.path(), &terminal);
    let task = ReplTask::new(
      temp.path(),
      &repl_config("/nonexistent/bin/java", Some("Main")),
      ReplOptions::default(),
    )
    .unwrap();

    let err = task.execute(&mut ctx, &TargetSet::new()).unwrap_err();

    assert!(matches!(err, ReplError::Launch { .. }));
    assert_eq!(terminal.restores.get(), 1);
    assert!(ctx.lock().is_held());
    assert_eq!(ctx.run_tracker().report()[0].outcome, Some(Outcome::Aborted));
  }
}
