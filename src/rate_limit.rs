use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::GateConfig;
use crate::lock_file::{self, LockAttempt};

// Outcome of one admission check. Exactly one of these per call; no state
// is carried between calls except what sits in the lock file itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    // Send the heartbeat; the window had room and the slot is now recorded
    Admitted,
    // Window is full, do not send
    RateLimited,
    // Could not take the file lock inside the retry budget
    LockUnavailable,
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("lock file {path} does not exist, init was never run")]
    MissingLockFile { path: PathBuf },
    #[error("lock file content length {len} is not a multiple of the timestamp width {width}")]
    CorruptContent { len: usize, width: usize },
    #[error("retained entry count must be at least 2, got {0}")]
    InvalidRetention(usize),
}

// Cross-process admission gate. All competing heartbeat processes on this
// machine serialize through an exclusive advisory lock on one shared file;
// the file holds the admitted timestamps, oldest first, as fixed-width
// decimal millis with no separators.
pub struct FileLockGate {
    config: GateConfig,
}

impl FileLockGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    pub fn check(&self) -> Result<Decision, GateError> {
        self.check_at(Utc::now().timestamp_millis())
    }

    // One read-decide-write cycle under the exclusive lock. I/O errors while
    // holding the lock are logged and fall through to an admit; only
    // structural problems (missing file, corrupt content, bad retention
    // config) abort the call.
    pub fn check_at(&self, now_millis: i64) -> Result<Decision, GateError> {
        let cfg = &self.config;
        let mut guard = match lock_file::acquire(&cfg.lock_path, cfg.lock_retry_times, cfg.lock_retry_delay)? {
            LockAttempt::Held(guard) => guard,
            LockAttempt::Unavailable => {
                info!("file lock unavailable, heartbeat cannot be submitted");
                return Ok(Decision::LockUnavailable);
            }
            LockAttempt::Failed => return Ok(Decision::Admitted),
        };

        let content = match read_content(guard.file_mut()) {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "failed to read lock file, admitting");
                return Ok(Decision::Admitted);
            }
        };
        debug!(%content, "lock file content");

        let oldest = parse_oldest(&content, cfg.timestamp_width);
        if now_millis - oldest > cfg.threshold_ms {
            if let Err(e) = guard.file_mut().set_len(0) {
                warn!(error = %e, "failed to truncate lock file, admitting");
                return Ok(Decision::Admitted);
            }
            // Eviction works off the content as it stood at read time
            let rewritten = rewrite_content(&content, now_millis, cfg.timestamp_width, cfg.retention)?;
            if let Err(e) = write_back(guard.file_mut(), &rewritten) {
                warn!(error = %e, "failed to write lock file, admitting");
            }
            Ok(Decision::Admitted)
        } else {
            info!("window request cap reached, holding back this heartbeat");
            Ok(Decision::RateLimited)
        }
    }
}

fn read_content(file: &mut File) -> io::Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content.trim().to_string())
}

fn write_back(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.seek(SeekFrom::Start(0))?;
    file.write_all(bytes)?;
    file.flush()
}

// First fixed-width slice of the file, i.e. the oldest admitted timestamp.
// Empty file means no history. A slice that does not parse is treated as
// epoch so the next check admits instead of erroring out.
fn parse_oldest(content: &str, width: usize) -> i64 {
    if content.is_empty() {
        return 0;
    }
    match content.get(..width).and_then(|slice| slice.parse::<i64>().ok()) {
        Some(ts) => ts,
        None => {
            warn!("unparseable oldest timestamp in lock file, treating as epoch");
            0
        }
    }
}

// Rebuild the file content for an admitted heartbeat: append the new
// timestamp, evicting the single oldest entry once the retained count is at
// the cap.
fn rewrite_content(old_content: &str, now_millis: i64, width: usize, retention: usize) -> Result<Vec<u8>, GateError> {
    if old_content.len() % width != 0 {
        return Err(GateError::CorruptContent { len: old_content.len(), width });
    }
    let count = old_content.len() / width;
    let now_str = now_millis.to_string();

    if count == 0 {
        Ok(now_str.into_bytes())
    } else if count < retention {
        Ok(format!("{old_content}{now_str}").into_bytes())
    } else {
        if retention < 2 {
            return Err(GateError::InvalidRetention(retention));
        }
        // Drop the oldest entry, keep the rest, append the new one
        let kept = &old_content[width * (retention - 1)..];
        Ok(format!("{kept}{now_str}").into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    use fs2::FileExt;

    use crate::lock_file::init_lock_file;

    // Realistic epoch-millis anchor; all test timestamps are 13 digits wide
    const T0: i64 = 1_700_000_000_000;
    const WIDTH: usize = 13;

    fn gate_for(path: &Path) -> FileLockGate {
        FileLockGate::new(GateConfig {
            lock_path: path.to_path_buf(),
            threshold_ms: 1000,
            retention: 2,
            lock_retry_times: 3,
            lock_retry_delay: Duration::from_millis(1),
            timestamp_width: WIDTH,
        })
    }

    fn setup() -> (tempfile::TempDir, FileLockGate, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ping_pong.lock");
        init_lock_file(&path);
        let gate = gate_for(&path);
        (dir, gate, path)
    }

    fn file_content(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn empty_file_admits_and_records_one_entry() {
        let (_dir, gate, path) = setup();

        assert_eq!(gate.check_at(T0).unwrap(), Decision::Admitted);
        assert_eq!(file_content(&path), T0.to_string());
    }

    #[test]
    fn call_inside_window_rejects_and_leaves_file_untouched() {
        let (_dir, gate, path) = setup();
        gate.check_at(T0).unwrap();

        assert_eq!(gate.check_at(T0 + 500).unwrap(), Decision::RateLimited);
        assert_eq!(file_content(&path), T0.to_string());
    }

    #[test]
    fn window_expiry_appends_until_cap_then_evicts_fifo() {
        let (_dir, gate, path) = setup();

        gate.check_at(T0).unwrap();

        // Second slot free, history kept
        assert_eq!(gate.check_at(T0 + 1200).unwrap(), Decision::Admitted);
        assert_eq!(file_content(&path), format!("{}{}", T0, T0 + 1200));

        // Cap reached, oldest entry dropped
        assert_eq!(gate.check_at(T0 + 2500).unwrap(), Decision::Admitted);
        assert_eq!(file_content(&path), format!("{}{}", T0 + 1200, T0 + 2500));
    }

    #[test]
    fn admission_gates_on_oldest_entry_even_with_free_slots() {
        let (_dir, gate, _path) = setup();
        gate.check_at(T0).unwrap();

        // One of two slots used, but the oldest entry is still inside the
        // window, so the check rejects
        assert_eq!(gate.check_at(T0 + 900).unwrap(), Decision::RateLimited);
    }

    #[test]
    fn content_length_stays_multiple_of_width() {
        let (_dir, gate, path) = setup();

        let mut now = T0;
        for _ in 0..5 {
            gate.check_at(now).unwrap();
            assert_eq!(file_content(&path).len() % WIDTH, 0);
            now += 1500;
        }
    }

    #[test]
    fn competing_holder_yields_lock_unavailable() {
        let (_dir, gate, path) = setup();
        gate.check_at(T0).unwrap();
        let before = file_content(&path);

        let holder = std::fs::OpenOptions::new().read(true).write(true).open(&path).unwrap();
        holder.lock_exclusive().unwrap();

        assert_eq!(gate.check_at(T0 + 5000).unwrap(), Decision::LockUnavailable);
        assert_eq!(file_content(&path), before);
        fs2::FileExt::unlock(&holder).unwrap();
    }

    #[test]
    fn corrupt_length_fails_the_call() {
        let (_dir, gate, path) = setup();
        std::fs::write(&path, "123").unwrap();

        let err = gate.check_at(T0).unwrap_err();
        assert!(matches!(err, GateError::CorruptContent { len: 3, width: WIDTH }));
    }

    #[test]
    fn unparseable_oldest_entry_fails_open() {
        let (_dir, gate, path) = setup();
        std::fs::write(&path, "notatimestamp").unwrap();

        // Garbage first slice reads as epoch, which forces an admit; the
        // garbage itself survives as history until evicted
        assert_eq!(gate.check_at(T0).unwrap(), Decision::Admitted);
        assert_eq!(file_content(&path), format!("notatimestamp{T0}"));
    }

    #[test]
    fn io_failure_fails_open_to_admit() {
        let dir = tempfile::tempdir().unwrap();
        // A directory opens with neither read nor write, which is an I/O
        // failure rather than a missing file
        let gate = gate_for(dir.path());

        assert_eq!(gate.check_at(T0).unwrap(), Decision::Admitted);
    }

    #[test]
    fn missing_file_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let gate = gate_for(&dir.path().join("never_created.lock"));

        assert!(matches!(gate.check_at(T0).unwrap_err(), GateError::MissingLockFile { .. }));
    }

    #[test]
    fn rewrite_starts_fresh_from_empty_content() {
        let out = rewrite_content("", T0, WIDTH, 2).unwrap();
        assert_eq!(out, T0.to_string().into_bytes());
    }

    #[test]
    fn rewrite_appends_below_cap() {
        let old = T0.to_string();
        let out = rewrite_content(&old, T0 + 1200, WIDTH, 3).unwrap();
        assert_eq!(out, format!("{}{}", T0, T0 + 1200).into_bytes());
    }

    #[test]
    fn rewrite_evicts_exactly_one_at_cap() {
        let old = format!("{}{}", T0, T0 + 1200);
        let out = rewrite_content(&old, T0 + 2500, WIDTH, 2).unwrap();
        assert_eq!(out, format!("{}{}", T0 + 1200, T0 + 2500).into_bytes());
    }

    #[test]
    fn rewrite_rejects_retention_below_two() {
        let old = T0.to_string();
        let err = rewrite_content(&old, T0 + 2500, WIDTH, 1).unwrap_err();
        assert!(matches!(err, GateError::InvalidRetention(1)));
    }

    #[test]
    fn rewrite_rejects_misaligned_content() {
        let err = rewrite_content("12345", T0, WIDTH, 2).unwrap_err();
        assert!(matches!(err, GateError::CorruptContent { len: 5, width: WIDTH }));
    }
}
