//! Exclusive advisory lock on the history log's sibling lock file

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use tracing::debug;

use crate::error::{Error, Result};

/// How to behave when another process holds the lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    /// Wait until the lock is released
    Blocking,
    /// Return [`Error::Lock`] immediately
    #[default]
    FailFast,
}

impl LockMode {
    fn flock_arg(self) -> FlockArg {
        match self {
            Self::Blocking => FlockArg::LockExclusive,
            Self::FailFast => FlockArg::LockExclusiveNonblock,
        }
    }
}

/// Held `flock(LOCK_EX)`; released on drop.
pub struct HistoryLock {
    _guard: Flock<File>,
    path: PathBuf,
}

impl HistoryLock {
    /// Acquire the lock at `path`, creating the lock file if needed
    pub fn acquire(path: &Path, mode: LockMode) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;

        let guard = loop {
            match Flock::lock(file, mode.flock_arg()) {
                Ok(guard) => break guard,
                Err((returned, Errno::EINTR)) => file = returned,
                Err((_, Errno::EWOULDBLOCK)) => {
                    return Err(Error::Lock {
                        path: path.to_path_buf(),
                    })
                }
                Err((_, errno)) => return Err(io::Error::from(errno).into()),
            }
        };

        debug!(path = %path.display(), ?mode, "Acquired history lock");
        Ok(Self {
            _guard: guard,
            path: path.to_path_buf(),
        })
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for HistoryLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryLock").field("path", &self.path).finish()
    }
}
