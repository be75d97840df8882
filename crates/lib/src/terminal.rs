//! Terminal settings capture and restore.
//!
//! Interactive children such as the Scala REPL change terminal modes and don't
//! put them back, leaving a non-default terminal unusable until `reset`.
//! [`TerminalGuard`] snapshots the settings and restores them when dropped.

use std::io;

use tracing::{debug, warn};

/// Opaque snapshot of the controlling terminal's settings.
///
/// Empty when stdin isn't a terminal; restoring an empty snapshot does nothing.
#[derive(Debug, Clone, Default)]
pub struct TerminalSettings {
  #[cfg(unix)]
  termios: Option<rustix::termios::Termios>,
}

impl TerminalSettings {
  pub fn is_empty(&self) -> bool {
    #[cfg(unix)]
    {
      self.termios.is_none()
    }
    #[cfg(not(unix))]
    {
      true
    }
  }
}

pub trait TerminalControl {
  fn capture(&self) -> io::Result<TerminalSettings>;
  fn restore(&self, settings: &TerminalSettings) -> io::Result<()>;
}

/// The process's stdin terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinTerminal;

#[cfg(unix)]
impl TerminalControl for StdinTerminal {
  fn capture(&self) -> io::Result<TerminalSettings> {
    use rustix::termios::{isatty, tcgetattr};

    let stdin = io::stdin();
    if !isatty(&stdin) {
      return Ok(TerminalSettings::default());
    }
    let termios = tcgetattr(&stdin).map_err(io::Error::from)?;
    Ok(TerminalSettings { termios: Some(termios) })
  }

  fn restore(&self, settings: &TerminalSettings) -> io::Result<()> {
    use rustix::termios::{OptionalActions, tcsetattr};

    let Some(termios) = &settings.termios else {
      return Ok(());
    };
    tcsetattr(io::stdin(), OptionalActions::Now, termios).map_err(io::Error::from)
  }
}

#[cfg(not(unix))]
impl TerminalControl for StdinTerminal {
  fn capture(&self) -> io::Result<TerminalSettings> {
    Ok(TerminalSettings::default())
  }

  fn restore(&self, _settings: &TerminalSettings) -> io::Result<()> {
    Ok(())
  }
}

/// Restores the captured settings exactly once, when dropped.
pub struct TerminalGuard<'a> {
  terminal: &'a dyn TerminalControl,
  settings: TerminalSettings,
}

impl<'a> TerminalGuard<'a> {
  /// Captures the current settings. A failed capture is logged and yields an
  /// empty snapshot; the task still runs.
  pub fn capture(terminal: &'a dyn TerminalControl) -> Self {
    let settings = terminal.capture().unwrap_or_else(|err| {
      warn!(error = %err, "failed to capture terminal settings");
      TerminalSettings::default()
    });
    debug!(captured = !settings.is_empty(), "captured terminal settings");
    Self { terminal, settings }
  }
}

impl Drop for TerminalGuard<'_> {
  fn drop(&mut self) {
    if let Err(err) = self.terminal.restore(&self.settings) {
      warn!(error = %err, "failed to restore terminal settings");
    }
  }
}
