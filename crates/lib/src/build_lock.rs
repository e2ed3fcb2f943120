//! File-based locking of a build root.
//!
//! Commands that write into module directories hold an exclusive lock on
//! `<root>/.kiln/lock`; commands that only read definitions hold a shared one.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;
use tracing::debug;

use crate::consts::STATE_DIR;

const LOCK_FILENAME: &str = "lock";

/// Shared for commands that only read, exclusive for commands that write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
  Shared,
  Exclusive,
}

#[derive(Debug, Error)]
pub enum BuildLockError {
  #[error(
    "build root is locked by another process: {holder}\n\
     If no kiln process is running, remove the lock file:\n  {path}"
  )]
  Locked { holder: String, path: PathBuf },

  #[error("cannot lock {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// A held lock. Released when dropped.
pub struct BuildLock {
  _file: File,
  path: PathBuf,
}

impl BuildLock {
  /// Take the lock on `root` without waiting.
  ///
  /// An exclusive holder records one line naming `command` so a contending
  /// process can report who holds the root.
  pub fn acquire(root: &Path, mode: LockMode, command: &str) -> Result<Self, BuildLockError> {
    let state_dir = root.join(STATE_DIR);
    let path = state_dir.join(LOCK_FILENAME);
    let io_err = |source| BuildLockError::Io {
      path: path.clone(),
      source,
    };

    std::fs::create_dir_all(&state_dir).map_err(io_err)?;
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&path)
      .map_err(io_err)?;

    match try_lock(&file, mode) {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
        return Err(BuildLockError::Locked {
          holder: read_holder(&path),
          path: path.clone(),
        });
      }
      Err(e) => return Err(io_err(e)),
    }

    if mode == LockMode::Exclusive {
      let holder = format!(
        "kiln {} (PID {}, started {})\n",
        command,
        std::process::id(),
        humantime::format_rfc3339_seconds(SystemTime::now())
      );
      file.set_len(0).map_err(io_err)?;
      (&file).write_all(holder.as_bytes()).map_err(io_err)?;
    }

    debug!(path = %path.display(), ?mode, command, "acquired build lock");
    Ok(BuildLock { _file: file, path })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

/// Holder line left by the last exclusive holder.
///
/// Shared holders write nothing, so an empty file means readers hold the root.
fn read_holder(path: &Path) -> String {
  match std::fs::read_to_string(path) {
    Ok(line) if !line.trim().is_empty() => line.trim().to_string(),
    _ => "a read-only kiln command".to_string(),
  }
}

#[cfg(unix)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  let operation = match mode {
    LockMode::Shared => FlockOperation::NonBlockingLockShared,
    LockMode::Exclusive => FlockOperation::NonBlockingLockExclusive,
  };

  flock(file.as_fd(), operation).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;
  let flags = match mode {
    LockMode::Shared => LOCKFILE_FAIL_IMMEDIATELY,
    LockMode::Exclusive => LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
  };

  // SAFETY: OVERLAPPED is plain data and valid when zeroed; the handle is
  // owned by `file` for the duration of the call.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(handle, flags, 0, 1, 0, &mut overlapped)
  };

  if result == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}
