use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;
use tracing::{error, info, warn};

use crate::rate_limit::GateError;

// Shared with every other process on this machine that runs a heartbeat.
const WINDOWS_LOCK_PATH: &str = r"C:\Windows\Temp\ping_pong.lock";
const UNIX_LOCK_PATH: &str = "/tmp/ping_pong.lock";

// Pick the lock file location for this platform family
pub fn default_lock_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(WINDOWS_LOCK_PATH)
    } else if cfg!(unix) {
        PathBuf::from(UNIX_LOCK_PATH)
    } else {
        warn!("unrecognized platform, falling back to the unix lock path");
        PathBuf::from(UNIX_LOCK_PATH)
    }
}

// Create the lock file if it does not exist yet. Safe to call on every
// startup; existing content is left alone.
pub fn init_lock_file(path: &Path) {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => info!(path = %path.display(), "lock file created"),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            info!(path = %path.display(), "lock file already exists")
        }
        Err(e) => error!(path = %path.display(), error = %e, "failed to create lock file"),
    }
}

// Exclusive hold on the lock file. Dropping the guard releases the OS
// advisory lock, so every exit path out of the critical section unlocks.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
}

impl LockGuard {
    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            warn!(error = %e, "failed to release file lock");
        }
    }
}

#[derive(Debug)]
pub enum LockAttempt {
    // Exclusive lock held, ready for one read-decide-write cycle
    Held(LockGuard),
    // Another process kept the lock through every attempt
    Unavailable,
    // Open or lock failed with a real I/O error (already logged)
    Failed,
}

// Try to take the exclusive lock, with a bounded number of attempts and a
// fixed sleep between them. The file must already exist; a missing file
// means init never ran and is a hard error.
pub fn acquire(path: &Path, retry_times: u32, retry_delay: Duration) -> Result<LockAttempt, GateError> {
    let file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(GateError::MissingLockFile { path: path.to_path_buf() });
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "failed to open lock file");
            return Ok(LockAttempt::Failed);
        }
    };

    for attempt in 1..=retry_times {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(LockAttempt::Held(LockGuard { file })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                info!(attempt, "lock held elsewhere, retrying");
                if attempt < retry_times {
                    std::thread::sleep(retry_delay);
                }
            }
            Err(e) => {
                error!(error = %e, "failed to lock file");
                return Ok(LockAttempt::Failed);
            }
        }
    }
    Ok(LockAttempt::Unavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    fn lock_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("ping_pong.lock")
    }

    #[test]
    fn init_creates_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);

        init_lock_file(&path);
        assert!(path.exists());

        // Existing content must survive a second init
        std::fs::write(&path, b"1700000000000").unwrap();
        init_lock_file(&path);
        let mut content = String::new();
        File::open(&path).unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "1700000000000");
    }

    #[test]
    fn acquire_fails_hard_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);

        let err = acquire(&path, 3, Duration::from_millis(1)).unwrap_err();
        assert!(matches!(err, GateError::MissingLockFile { .. }));
    }

    #[test]
    fn acquire_gives_up_after_retry_budget() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);
        init_lock_file(&path);

        // Competing holder on a separate descriptor
        let holder = OpenOptions::new().read(true).write(true).open(&path).unwrap();
        holder.lock_exclusive().unwrap();

        let attempt = acquire(&path, 3, Duration::from_millis(1)).unwrap();
        assert!(matches!(attempt, LockAttempt::Unavailable));
        fs2::FileExt::unlock(&holder).unwrap();
    }

    #[test]
    fn guard_releases_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);
        init_lock_file(&path);

        let first = acquire(&path, 3, Duration::from_millis(1)).unwrap();
        let mut guard = match first {
            LockAttempt::Held(g) => g,
            _ => panic!("expected to hold the lock"),
        };
        guard.file_mut().write_all(b"x").unwrap();
        drop(guard);

        let second = acquire(&path, 1, Duration::from_millis(1)).unwrap();
        assert!(matches!(second, LockAttempt::Held(_)));
    }
}
