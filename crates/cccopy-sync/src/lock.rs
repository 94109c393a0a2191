//! NFS-safe lock manager
//!
//! Mutual exclusion between users of the shared Production tree is built on
//! atomic directory creation: `mkdir` is atomic on compliant NFS servers,
//! unlike `O_EXCL` open semantics which some implementations fake. A lock
//! is the directory `<production_dir>/.cccopy/lock/<name>.lockdir/`
//! containing an `owner` file recording who holds it.
//!
//! A crashed holder leaves the directory behind; any later acquirer
//! reclaims it once the recorded timestamp is older than the stale
//! threshold.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use cccopy_types::{Error, Result};

/// Age beyond which a lock directory is considered abandoned
pub const STALE_THRESHOLD: Duration = Duration::from_secs(300);

/// Initial retry backoff
const BACKOFF_START: Duration = Duration::from_millis(100);

/// Backoff cap
const BACKOFF_CAP: Duration = Duration::from_secs(1);

/// Contents of a lock's `owner` file: `host:pid:epoch_ms:user`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOwner {
    /// Hostname of the holder
    pub host: String,
    /// Process id of the holder
    pub pid: u32,
    /// Acquisition time, milliseconds since the Unix epoch
    pub epoch_ms: u64,
    /// OS user name of the holder
    pub user: String,
}

impl LockOwner {
    /// Owner record for the current process.
    pub fn current() -> Self {
        let host = whoami::fallible::hostname().unwrap_or_else(|_| "unknown".into());
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Self {
            host,
            pid: std::process::id(),
            epoch_ms,
            user: whoami::username(),
        }
    }

    /// Serialize to the one-line `owner` file format.
    pub fn to_line(&self) -> String {
        format!("{}:{}:{}:{}", self.host, self.pid, self.epoch_ms, self.user)
    }

    /// Parse an `owner` file line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.trim().splitn(4, ':');
        let host = fields.next()?.to_string();
        let pid = fields.next()?.parse().ok()?;
        let epoch_ms = fields.next()?.parse().ok()?;
        let user = fields.next()?.to_string();
        Some(Self {
            host,
            pid,
            epoch_ms,
            user,
        })
    }

    /// Whether the recorded timestamp is older than the stale threshold.
    pub fn is_stale(&self, now: SystemTime) -> bool {
        let now_ms = now
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        now_ms.saturating_sub(self.epoch_ms) > u64::try_from(STALE_THRESHOLD.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Held lock; releases on [`LockGuard::release`] or drop.
#[derive(Debug)]
pub struct LockGuard {
    lock_dir: PathBuf,
    released: bool,
}

impl LockGuard {
    /// Lock directory path.
    pub fn path(&self) -> &Path {
        &self.lock_dir
    }

    /// Release the lock: unlink `owner`, then remove the directory.
    /// `ENOENT` is tolerated — a concurrent reclaim already cleaned up.
    pub fn release(mut self) -> Result<()> {
        self.release_inner()?;
        Ok(())
    }

    fn release_inner(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        for result in [
            std::fs::remove_file(self.lock_dir.join("owner")),
            std::fs::remove_dir(&self.lock_dir),
        ] {
            match result {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        info!(lock = %self.lock_dir.display(), "Lock released");
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.release_inner();
        }
    }
}

/// Lock directory for `name` under a Production tree.
pub fn lock_dir_path(production_dir: &Path, name: &str) -> PathBuf {
    production_dir
        .join(".cccopy")
        .join("lock")
        .join(format!("{name}.lockdir"))
}

/// Acquire the named Production lock, retrying until `timeout` elapses.
///
/// Stale lock directories are reclaimed best-effort; losing the race to
/// another reclaimer only costs one retry cycle.
pub async fn with_lock(production_dir: &Path, name: &str, timeout: Duration) -> Result<LockGuard> {
    let lock_dir = lock_dir_path(production_dir, name);
    if let Some(parent) = lock_dir.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let deadline = Instant::now() + timeout;
    let mut backoff = BACKOFF_START;

    loop {
        match std::fs::create_dir(&lock_dir) {
            Ok(()) => {
                let owner = LockOwner::current();
                std::fs::write(lock_dir.join("owner"), format!("{}\n", owner.to_line()))?;
                debug!(lock = %lock_dir.display(), owner = %owner.user, "Lock acquired");
                return Ok(LockGuard {
                    lock_dir,
                    released: false,
                });
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if let Some(owner) = read_owner(&lock_dir) {
                    if owner.is_stale(SystemTime::now()) {
                        warn!(
                            lock = %lock_dir.display(),
                            holder = %owner.user,
                            "Reclaiming stale lock"
                        );
                        let _ = std::fs::remove_dir_all(&lock_dir);
                        continue;
                    }
                } else if dir_mtime_stale(&lock_dir) {
                    // Holder died between mkdir and the owner write.
                    warn!(lock = %lock_dir.display(), "Reclaiming ownerless stale lock");
                    let _ = std::fs::remove_dir_all(&lock_dir);
                    continue;
                }
            }
            Err(e) => return Err(e.into()),
        }

        if Instant::now() >= deadline {
            let owner = read_owner(&lock_dir);
            return Err(Error::lock_timeout(
                name.to_string(),
                owner.map(|o| o.user),
                lock_dir.display().to_string(),
            ));
        }
        sleep(backoff.min(deadline.saturating_duration_since(Instant::now()))).await;
        backoff = (backoff * 2).min(BACKOFF_CAP);
    }
}

fn read_owner(lock_dir: &Path) -> Option<LockOwner> {
    let text = std::fs::read_to_string(lock_dir.join("owner")).ok()?;
    LockOwner::parse(text.lines().next()?)
}

fn dir_mtime_stale(lock_dir: &Path) -> bool {
    match std::fs::metadata(lock_dir).and_then(|m| m.modified()) {
        Ok(mtime) => SystemTime::now()
            .duration_since(mtime)
            .map(|age| age > STALE_THRESHOLD)
            .unwrap_or(false),
        // Already gone: the next create_dir attempt settles it.
        Err(_) => false,
    }
}
