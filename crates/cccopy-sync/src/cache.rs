//! TTL caches backing the refresh scheduler
//!
//! Two caches keep the file-state view responsive without re-running git
//! for every row: the per-path state cache (TTL 300 s, sharded per
//! project) and the tracked-files cache holding `ls-tree -r <rev>`
//! snapshots (TTL 60 s, keyed by revision so an advanced sync base is an
//! implicit invalidation). Expired entries are never returned. The sync
//! pipeline invalidates explicitly after every mutation it performs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cccopy_types::FileState;

/// Default TTL of the state cache
pub const STATE_TTL: Duration = Duration::from_secs(300);

/// Default TTL of the tracked-files cache
pub const TRACKED_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct StateEntry {
    state: FileState,
    computed_at: Instant,
}

/// Per-path state cache, sharded by project id so projects do not contend.
#[derive(Debug)]
pub struct StateCache {
    ttl: Duration,
    shards: Mutex<HashMap<u32, HashMap<String, StateEntry>>>,
}

impl StateCache {
    /// Create a cache with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(STATE_TTL)
    }

    /// Create a cache with a custom TTL (tests use short ones).
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            shards: Mutex::new(HashMap::new()),
        }
    }

    /// Fresh cached state for a path, if any.
    pub fn get(&self, project_id: u32, path: &str) -> Option<FileState> {
        let shards = self.shards.lock().ok()?;
        let entry = shards.get(&project_id)?.get(path)?;
        (entry.computed_at.elapsed() < self.ttl).then_some(entry.state)
    }

    /// Record a freshly computed state.
    pub fn insert(&self, project_id: u32, path: &str, state: FileState) {
        if let Ok(mut shards) = self.shards.lock() {
            shards.entry(project_id).or_default().insert(
                path.to_string(),
                StateEntry {
                    state,
                    computed_at: Instant::now(),
                },
            );
        }
    }

    /// Drop one path's entry.
    pub fn invalidate(&self, project_id: u32, path: &str) {
        if let Ok(mut shards) = self.shards.lock() {
            if let Some(shard) = shards.get_mut(&project_id) {
                shard.remove(path);
            }
        }
    }

    /// Drop every entry of a project (after Download/Upload/Save).
    pub fn invalidate_project(&self, project_id: u32) {
        if let Ok(mut shards) = self.shards.lock() {
            shards.remove(&project_id);
        }
    }
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
struct TrackedEntry {
    tree: Arc<HashMap<String, String>>,
    fetched_at: Instant,
}

/// Cache of `ls-tree -r <rev>` snapshots, keyed by repository root and
/// revision. A repository can hold several live snapshots at once (e.g.
/// successive sync-base commits).
#[derive(Debug)]
pub struct TrackedFilesCache {
    ttl: Duration,
    inner: Mutex<HashMap<(PathBuf, String), TrackedEntry>>,
}

impl TrackedFilesCache {
    /// Create a cache with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(TRACKED_TTL)
    }

    /// Create a cache with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Fresh snapshot for `repo` at `rev`, if any.
    pub fn get(&self, repo: &Path, rev: &str) -> Option<Arc<HashMap<String, String>>> {
        let inner = self.inner.lock().ok()?;
        let entry = inner.get(&(repo.to_path_buf(), rev.to_string()))?;
        if entry.fetched_at.elapsed() >= self.ttl {
            return None;
        }
        Some(Arc::clone(&entry.tree))
    }

    /// Record a snapshot.
    pub fn insert(&self, repo: &Path, rev: String, tree: HashMap<String, String>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.insert(
                (repo.to_path_buf(), rev),
                TrackedEntry {
                    tree: Arc::new(tree),
                    fetched_at: Instant::now(),
                },
            );
        }
    }

    /// Drop every snapshot of a repository (after commits).
    pub fn invalidate(&self, repo: &Path) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.retain(|(root, _), _| root != repo);
        }
    }
}

impl Default for TrackedFilesCache {
    fn default() -> Self {
        Self::new()
    }
}
