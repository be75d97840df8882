//! Workspace-wide run lock.
//!
//! Every invocation holds an exclusive advisory lock on `<root>/.plinth/run.lock`
//! while it works. Interactive tasks release it for the length of the session
//! through [`RunLock::release`], whose guard takes it back when dropped.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::consts::STATE_DIRNAME;

const LOCK_FILENAME: &str = "run.lock";

#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
  pub version: u32,
  pub pid: u32,
  pub started_at_unix: u64,
  pub command: String,
  pub root: PathBuf,
}

#[derive(Debug, Error)]
pub enum RunLockError {
  #[error(
    "Workspace is locked by another process: {command} (PID {pid}, started {started_at})\n\
             If you're sure no plinth process is running, remove the lock file:\n  {lock_path}"
  )]
  Contention {
    command: String,
    pid: u32,
    started_at: String,
    lock_path: PathBuf,
  },

  #[error(
    "Workspace is locked (could not read lock metadata)\n\
             If you're sure no plinth process is running, remove the lock file:\n  {lock_path}"
  )]
  ContentionUnknown { lock_path: PathBuf },

  #[error("Failed to create state directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("Failed to open lock file: {0}")]
  OpenFile(#[source] io::Error),

  #[error("Failed to write lock metadata: {0}")]
  WriteMetadata(#[source] io::Error),

  #[error("Failed to acquire lock: {0}")]
  LockFailed(#[source] io::Error),

  #[error("Failed to release lock: {0}")]
  UnlockFailed(#[source] io::Error),
}

#[derive(Debug)]
pub struct RunLock {
  file: File,
  lock_path: PathBuf,
  root: PathBuf,
  command: String,
  held: bool,
}

impl RunLock {
  /// Takes the lock for `root` without waiting; fails if another process holds it.
  pub fn acquire(root: &Path, command: &str) -> Result<Self, RunLockError> {
    let state_dir = root.join(STATE_DIRNAME);
    let lock_path = state_dir.join(LOCK_FILENAME);

    if !state_dir.exists() {
      std::fs::create_dir_all(&state_dir).map_err(RunLockError::CreateDir)?;
    }

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(RunLockError::OpenFile)?;

    if let Err(err) = sys::try_lock(&file) {
      if err.kind() == io::ErrorKind::WouldBlock {
        return Err(Self::read_contention_error(&lock_path));
      }
      return Err(RunLockError::LockFailed(err));
    }

    let lock = RunLock {
      file,
      lock_path,
      root: root.to_path_buf(),
      command: command.to_string(),
      held: true,
    };
    lock.write_metadata()?;
    debug!(path = %lock.lock_path.display(), "acquired run lock");

    Ok(lock)
  }

  /// False while released, and after a failed reacquire that was only logged
  /// by a dropped [`ReleasedLock`].
  pub fn is_held(&self) -> bool {
    self.held
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }

  /// Releases the lock until the returned guard reacquires it.
  ///
  /// Reacquiring waits for other invocations that took the lock meanwhile.
  /// Call [`ReleasedLock::reacquire`] to see a failure; dropping the guard
  /// only logs it.
  pub fn release(&mut self) -> Result<ReleasedLock<'_>, RunLockError> {
    sys::unlock(&self.file).map_err(RunLockError::UnlockFailed)?;
    self.held = false;
    debug!(path = %self.lock_path.display(), "released run lock");
    Ok(ReleasedLock { lock: Some(self) })
  }

  fn reacquire(&mut self) -> Result<(), RunLockError> {
    sys::lock_blocking(&self.file).map_err(RunLockError::LockFailed)?;
    self.held = true;
    self.write_metadata()?;
    debug!(path = %self.lock_path.display(), "reacquired run lock");
    Ok(())
  }

  /// Reads the lock metadata from the held file handle.
  pub fn read_metadata(&self) -> io::Result<LockMetadata> {
    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  fn write_metadata(&self) -> Result<(), RunLockError> {
    let metadata = LockMetadata {
      version: 1,
      pid: std::process::id(),
      started_at_unix: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs(),
      command: self.command.clone(),
      root: self.root.clone(),
    };

    let mut file = &self.file;
    file.set_len(0).map_err(RunLockError::WriteMetadata)?;
    file.seek(SeekFrom::Start(0)).map_err(RunLockError::WriteMetadata)?;
    let mut writer = io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &metadata)
      .map_err(|e| RunLockError::WriteMetadata(io::Error::other(e)))?;
    writer.flush().map_err(RunLockError::WriteMetadata)?;

    Ok(())
  }

  fn read_contention_error(lock_path: &Path) -> RunLockError {
    if let Ok(mut file) = File::open(lock_path) {
      let mut contents = String::new();
      if file.read_to_string(&mut contents).is_ok()
        && let Ok(metadata) = serde_json::from_str::<LockMetadata>(&contents)
      {
        let started_at = format!("Unix timestamp {}", metadata.started_at_unix);

        return RunLockError::Contention {
          command: metadata.command,
          pid: metadata.pid,
          started_at,
          lock_path: lock_path.to_path_buf(),
        };
      }
    }

    RunLockError::ContentionUnknown {
      lock_path: lock_path.to_path_buf(),
    }
  }
}

/// The run lock, temporarily released. Dropping it takes the lock back.
#[derive(Debug)]
pub struct ReleasedLock<'a> {
  lock: Option<&'a mut RunLock>,
}

impl ReleasedLock<'_> {
  pub fn reacquire(mut self) -> Result<(), RunLockError> {
    match self.lock.take() {
      Some(lock) => lock.reacquire(),
      None => Ok(()),
    }
  }
}

impl Drop for ReleasedLock<'_> {
  fn drop(&mut self) {
    if let Some(lock) = self.lock.take()
      && let Err(err) = lock.reacquire()
    {
      warn!(error = %err, "failed to reacquire run lock");
    }
  }
}

#[cfg(unix)]
mod sys {
  use std::fs::File;
  use std::io;
  use std::os::unix::io::AsFd;

  use rustix::fs::{FlockOperation, flock};

  fn apply(file: &File, operation: FlockOperation) -> io::Result<()> {
    flock(file.as_fd(), operation).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
  }

  pub fn try_lock(file: &File) -> io::Result<()> {
    apply(file, FlockOperation::NonBlockingLockExclusive)
  }

  pub fn lock_blocking(file: &File) -> io::Result<()> {
    apply(file, FlockOperation::LockExclusive)
  }

  pub fn unlock(file: &File) -> io::Result<()> {
    apply(file, FlockOperation::Unlock)
  }
}

#[cfg(windows)]
mod sys {
  use std::fs::File;
  use std::io;
  use std::os::windows::io::AsRawHandle;

  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{
    LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx, UnlockFileEx,
  };

  fn lock(file: &File, flags: u32) -> io::Result<()> {
    let handle = file.as_raw_handle() as HANDLE;
    // SAFETY: OVERLAPPED is a plain data struct that is valid when zero-initialized.
    // LockFileEx is safe to call with a valid file handle and zeroed OVERLAPPED.
    let result = unsafe {
      let mut overlapped = std::mem::zeroed();
      LockFileEx(handle, flags, 0, 1, 0, &mut overlapped)
    };
    if result == 0 { Err(io::Error::last_os_error()) } else { Ok(()) }
  }

  pub fn try_lock(file: &File) -> io::Result<()> {
    lock(file, LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK)
  }

  pub fn lock_blocking(file: &File) -> io::Result<()> {
    lock(file, LOCKFILE_EXCLUSIVE_LOCK)
  }

  pub fn unlock(file: &File) -> io::Result<()> {
    let handle = file.as_raw_handle() as HANDLE;
    // SAFETY: same as above; unlocks the byte range taken by `lock`.
    let result = unsafe {
      let mut overlapped = std::mem::zeroed();
      UnlockFileEx(handle, 0, 1, 0, &mut overlapped)
    };
    if result == 0 { Err(io::Error::last_os_error()) } else { Ok(()) }
  }
}
