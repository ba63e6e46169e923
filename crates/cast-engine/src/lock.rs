//! Cross-process advisory lock used by the orchestrator to serialize
//! reconciliations driven from the same vault (§5, §9: "advisory file lock
//! with bounded wait, not a mutex").

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{EngineError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A held advisory lock. Released (via `Drop`, i.e. file close) when it goes
/// out of scope.
pub struct SyncLock {
    _file: File,
    path: PathBuf,
}

impl SyncLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Acquire the exclusive advisory lock at `<driver>/.cast/locks/sync.lock`,
/// polling until `timeout` elapses.
pub fn acquire(driver_cast_dir: &Path, timeout: Duration) -> Result<SyncLock> {
    let locks_dir = driver_cast_dir.join("locks");
    std::fs::create_dir_all(&locks_dir)?;
    let path = locks_dir.join("sync.lock");

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&path)?;

    let deadline = Instant::now() + timeout;
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => {
                return Ok(SyncLock { _file: file, path });
            }
            Err(_) if Instant::now() < deadline => {
                sleep(POLL_INTERVAL);
            }
            Err(_) => {
                return Err(EngineError::LockBusy {
                    path,
                    timeout_secs: timeout.as_secs(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn acquire_creates_lock_file_and_directory() {
        let dir = TempDir::new().unwrap();
        let cast_dir = dir.path().join(".cast");
        let lock = acquire(&cast_dir, Duration::from_millis(200)).unwrap();
        assert!(lock.path().exists());
    }

    #[test]
    fn second_acquire_times_out_while_first_is_held() {
        let dir = TempDir::new().unwrap();
        let cast_dir = dir.path().join(".cast");
        let first = acquire(&cast_dir, Duration::from_millis(200)).unwrap();

        let result = acquire(&cast_dir, Duration::from_millis(150));
        assert!(matches!(result, Err(EngineError::LockBusy { .. })));

        drop(first);
        let third = acquire(&cast_dir, Duration::from_millis(200));
        assert!(third.is_ok());
    }
}
