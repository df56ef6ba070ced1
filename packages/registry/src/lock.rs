// ABOUTME: Project-scoped advisory lock serializing lifecycle operations
// ABOUTME: RAII guard over an fs2 exclusive file lock, released on every exit path

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use warren_core::constants::{LOCK_FILE, SANDBOXES_DIR};

use crate::{RegistryError, Result};

/// Exclusive lock over one project's sandbox state.
///
/// Held from the first registry read to the final registry write of a
/// lifecycle operation. Dropping the guard releases the lock, so early
/// returns and error paths cannot leak it.
#[derive(Debug)]
pub struct ProjectLock {
    file: File,
    path: PathBuf,
}

impl ProjectLock {
    fn lock_file(project_root: &Path) -> Result<(File, PathBuf)> {
        let dir = project_root.join(SANDBOXES_DIR);
        fs::create_dir_all(&dir)?;
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        Ok((file, path))
    }

    /// Acquire the lock, blocking until the holder releases it.
    pub fn acquire(project_root: &Path) -> Result<Self> {
        let (file, path) = Self::lock_file(project_root)?;
        file.lock_exclusive()?;
        debug!("Acquired project lock at {}", path.display());
        Ok(Self { file, path })
    }

    /// Acquire the lock without blocking; `LockHeld` when another process
    /// has it.
    pub fn try_acquire(project_root: &Path) -> Result<Self> {
        let (file, path) = Self::lock_file(project_root)?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired project lock at {}", path.display());
                Ok(Self { file, path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(RegistryError::LockHeld),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!("Failed to release project lock {}: {}", self.path.display(), e);
        } else {
            debug!("Released project lock at {}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_creates_lock_file() {
        let tmp = tempfile::tempdir().unwrap();
        let _guard = ProjectLock::acquire(tmp.path()).unwrap();
        assert!(tmp.path().join(".sandboxes/registry.lock").exists());
    }

    #[test]
    fn second_try_acquire_fails_while_held() {
        let tmp = tempfile::tempdir().unwrap();

        let guard = ProjectLock::acquire(tmp.path()).unwrap();
        assert!(matches!(
            ProjectLock::try_acquire(tmp.path()).unwrap_err(),
            RegistryError::LockHeld
        ));

        drop(guard);
        assert!(ProjectLock::try_acquire(tmp.path()).is_ok());
    }

    #[test]
    fn reacquire_after_drop() {
        let tmp = tempfile::tempdir().unwrap();
        for _ in 0..3 {
            let _guard = ProjectLock::acquire(tmp.path()).unwrap();
        }
    }
}
