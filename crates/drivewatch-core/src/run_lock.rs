//! Cross-process lock that keeps two sweeps of the same purpose from overlapping.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    thread,
    time::{Duration, SystemTime},
};

use anyhow::{anyhow, bail, Context, Result};

#[derive(Debug)]
pub struct RunLockGuard {
    path: PathBuf,
}

impl RunLockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Creates `path` exclusively, waiting up to `timeout` and reclaiming locks older than `stale_after`.
pub fn acquire_run_lock(path: &Path, timeout: Duration, stale_after: Duration) -> Result<RunLockGuard> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create lock directory {}", parent.display()))?;
        }
    }

    let start = SystemTime::now();
    loop {
        match OpenOptions::new().create_new(true).write(true).open(path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                return Ok(RunLockGuard {
                    path: path.to_path_buf(),
                });
            }
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {
                if stale_after > Duration::ZERO && reclaim_stale_lock(path, stale_after) {
                    tracing::warn!(path = %path.display(), "reclaimed stale run lock");
                    continue;
                }
                let elapsed = SystemTime::now().duration_since(start).unwrap_or_default();
                if elapsed >= timeout {
                    bail!("another run holds {}", path.display());
                }
                thread::sleep(Duration::from_millis(50));
            }
            Err(error) => {
                return Err(anyhow!("failed to acquire lock {}: {error}", path.display()));
            }
        }
    }
}

fn reclaim_stale_lock(path: &Path, stale_after: Duration) -> bool {
    let Ok(modified) = fs::metadata(path).and_then(|metadata| metadata.modified()) else {
        return false;
    };
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO);
    if age < stale_after {
        return false;
    }
    fs::remove_file(path).is_ok()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::acquire_run_lock;

    #[test]
    fn functional_second_holder_times_out_until_first_releases() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("locks").join("check-update.lock");
        let guard = acquire_run_lock(&path, Duration::ZERO, Duration::ZERO).expect("first");
        assert!(guard.path().exists());

        let error = acquire_run_lock(&path, Duration::ZERO, Duration::ZERO)
            .expect_err("held lock");
        assert!(error.to_string().contains("another run holds"));

        drop(guard);
        assert!(!path.exists());
        acquire_run_lock(&path, Duration::ZERO, Duration::ZERO).expect("after release");
    }

    #[test]
    fn regression_stale_lock_is_reclaimed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("check-trello.lock");
        std::fs::write(&path, "12345\n").expect("write stale lock");
        std::thread::sleep(Duration::from_millis(20));
        let guard = acquire_run_lock(&path, Duration::ZERO, Duration::from_millis(5))
            .expect("reclaims stale lock");
        drop(guard);
    }
}
