//! Exclusive run lock around the merge-and-publish sequence.

use std::fs::{self, File};
use std::path::Path;

use fs2::FileExt;
use tracing::debug;

use crate::error::{SchoolCalError, SchoolCalResult};

/// Releases the lock when dropped
#[derive(Debug)]
pub struct RunLock {
    _file: File,
}

impl RunLock {
    /// Take the lock at `path`, failing fast if another run holds it.
    pub fn acquire(path: &Path) -> SchoolCalResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;

        file.try_lock_exclusive()
            .map_err(|_| SchoolCalError::Locked(path.display().to_string()))?;

        debug!(lock = %path.display(), "Acquired run lock");
        Ok(RunLock { _file: file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".schoolcal.lock");

        let first = RunLock::acquire(&path).unwrap();
        assert!(matches!(
            RunLock::acquire(&path),
            Err(SchoolCalError::Locked(_))
        ));

        drop(first);
        assert!(RunLock::acquire(&path).is_ok());
    }
}
