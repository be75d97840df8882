//! Java tool invocation.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use shell_escape::escape;
use tokio::process::Command;
use tracing::{debug, warn};

/// How an interactive session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
  /// The process exited on its own, with this status code if it had one.
  Exited(Option<i32>),
  /// The user interrupted the session.
  Interrupted,
}

/// A fully assembled `java` command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaInvocation {
  pub java: PathBuf,
  pub jvm_args: Vec<String>,
  pub classpath: Vec<PathBuf>,
  pub main: String,
  pub args: Vec<String>,
}

impl JavaInvocation {
  /// Resolves the java launcher: an explicit path, then `$JAVA_HOME/bin/java`,
  /// then `java` from `PATH`.
  pub fn locate_java(explicit: Option<&Path>) -> PathBuf {
    if let Some(java) = explicit {
      return java.to_path_buf();
    }
    match std::env::var_os("JAVA_HOME") {
      Some(home) if !home.is_empty() => PathBuf::from(home).join("bin").join("java"),
      _ => PathBuf::from("java"),
    }
  }

  /// Argument vector after the launcher.
  pub fn argv(&self) -> Vec<String> {
    let mut argv = self.jvm_args.clone();
    if !self.classpath.is_empty() {
      argv.push("-cp".to_string());
      argv.push(self.classpath_string());
    }
    argv.push(self.main.clone());
    argv.extend(self.args.iter().cloned());
    argv
  }

  pub fn classpath_string(&self) -> String {
    std::env::join_paths(&self.classpath)
      .map(|joined| joined.to_string_lossy().into_owned())
      .unwrap_or_else(|_| {
        self
          .classpath
          .iter()
          .map(|p| p.display().to_string())
          .collect::<Vec<_>>()
          .join(":")
      })
  }

  /// The shell-quoted command line, without running anything.
  pub fn command_line(&self) -> String {
    std::iter::once(self.java.display().to_string())
      .chain(self.argv())
      .map(|arg| escape(arg.into()).into_owned())
      .collect::<Vec<_>>()
      .join(" ")
  }

  /// Runs the command attached to the current terminal and waits for it.
  ///
  /// Ctrl-C while the child runs reaches the child through the terminal; here it
  /// only marks the session as interrupted, and we still wait for the child. A
  /// child killed by SIGINT counts as interrupted too.
  pub async fn run_interactive(&self) -> std::io::Result<SessionEnd> {
    let mut command = Command::new(self.java.as_os_str());
    command
      .args(self.argv().iter().map(OsStr::new))
      .stdin(Stdio::inherit())
      .stdout(Stdio::inherit())
      .stderr(Stdio::inherit());

    // Listen before spawning so an early Ctrl-C can't take the default action.
    let mut interrupts = Interrupts::listen()?;

    debug!(java = %self.java.display(), main = %self.main, "spawning interactive process");
    let mut child = command.spawn()?;

    let mut interrupted = false;
    let mut listening = true;
    let status = loop {
      tokio::select! {
        status = child.wait() => break status?,
        received = interrupts.recv(), if listening => {
          match received {
            Some(()) => {
              debug!("interrupt received during interactive session");
              interrupted = true;
            }
            None => warn!("interrupt listener closed"),
          }
          listening = false;
        }
      }
    };

    if interrupted || killed_by_interrupt(&status) {
      return Ok(SessionEnd::Interrupted);
    }
    Ok(SessionEnd::Exited(status.code()))
  }
}

/// Ctrl-C notifications for the current process. Registering replaces the
/// default action, so the process survives the interrupt.
struct Interrupts {
  #[cfg(unix)]
  inner: tokio::signal::unix::Signal,
  #[cfg(windows)]
  inner: tokio::signal::windows::CtrlC,
}

impl Interrupts {
  #[cfg(unix)]
  fn listen() -> std::io::Result<Self> {
    use tokio::signal::unix::{SignalKind, signal};

    Ok(Self {
      inner: signal(SignalKind::interrupt())?,
    })
  }

  #[cfg(windows)]
  fn listen() -> std::io::Result<Self> {
    Ok(Self {
      inner: tokio::signal::windows::ctrl_c()?,
    })
  }

  async fn recv(&mut self) -> Option<()> {
    self.inner.recv().await
  }
}

#[cfg(unix)]
fn killed_by_interrupt(status: &ExitStatus) -> bool {
  use std::os::unix::process::ExitStatusExt;

  const SIGINT: i32 = 2;
  status.signal() == Some(SIGINT)
}

#[cfg(not(unix))]
fn killed_by_interrupt(_status: &ExitStatus) -> bool {
  false
}
