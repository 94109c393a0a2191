//! Work-tree change watcher
//!
//! Polls `status --porcelain` in the Work repository on a fixed interval.
//! Changed member paths get their state-cache entries invalidated; paths
//! inside the currently displayed directory are re-enqueued at the current
//! generation so the view catches up without a manual refresh.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use cccopy_git::GitRepo;
use cccopy_sync::{PatternSet, StateCache};

use crate::scheduler::RefreshScheduler;
use crate::task::RefreshTask;

/// Default poll interval
pub const WATCH_INTERVAL: Duration = Duration::from_secs(5);

/// Whether `rel_path` is an immediate child of the displayed directory.
pub(crate) fn in_directory(rel_path: &str, dir: &str) -> bool {
    let remainder = if dir.is_empty() {
        rel_path
    } else {
        match rel_path.strip_prefix(dir).and_then(|r| r.strip_prefix('/')) {
            Some(rest) => rest,
            None => return false,
        }
    };
    !remainder.is_empty() && !remainder.contains('/')
}

/// Spawn the watcher loop.
///
/// The loop stops when the scheduler shuts down, at the latest one
/// interval later.
pub fn spawn_watcher(
    work: GitRepo,
    patterns: PatternSet,
    scheduler: Arc<RefreshScheduler>,
    state_cache: Arc<StateCache>,
    display_dir: Arc<Mutex<String>>,
    project_id: u32,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so a fresh engine does
        // not race its own initial refresh.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if scheduler.is_shutdown() {
                break;
            }
            if !work.is_repo() {
                continue;
            }
            let entries = match work.status_porcelain().await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(error = %e, "Change watcher poll failed");
                    continue;
                }
            };
            let dir = display_dir.lock().map(|d| d.clone()).unwrap_or_default();
            let generation = scheduler.current_generation();
            for entry in entries {
                if !patterns.is_member(&entry.path) {
                    continue;
                }
                state_cache.invalidate(project_id, &entry.path);
                if in_directory(&entry.path, &dir) {
                    debug!(path = %entry.path, "Change detected, re-enqueueing");
                    scheduler.submit(RefreshTask {
                        project_id,
                        rel_path: entry.path,
                        generation,
                    });
                }
            }
        }
        debug!("Change watcher stopped");
    })
}
