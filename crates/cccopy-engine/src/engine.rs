//! Refresh engine facade
//!
//! Wires the scheduler, the worker pool and the change watcher together
//! behind the two-phase refresh contract: a bounded foreground scan that
//! returns rows immediately, then background classification whose results
//! arrive on the update queue. The consumer owns the receiving end and is
//! never called into.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use cccopy_config::ProjectConfig;
use cccopy_git::GitRepo;
use cccopy_sync::{Classifier, PatternSet, StateCache, TrackedFilesCache};
use cccopy_types::{FileState, Result};

use crate::executor::{RefreshExecutor, DEFAULT_WORKER_COUNT};
use crate::scheduler::RefreshScheduler;
use crate::task::{RefreshRow, RefreshTask, RefreshUpdate};
use crate::watcher::{spawn_watcher, WATCH_INTERVAL};

/// Configuration knobs for the refresh engine
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Number of background classification workers
    pub worker_count: usize,
    /// Change-watcher poll interval
    pub watch_interval: Duration,
    /// Whether to run the change watcher at all
    pub enable_watcher: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            watch_interval: WATCH_INTERVAL,
            enable_watcher: true,
        }
    }
}

/// Orchestrates partial refreshes for one project
#[derive(Debug)]
pub struct RefreshEngine {
    config: ProjectConfig,
    refresh_config: RefreshConfig,
    patterns: PatternSet,
    scheduler: Arc<RefreshScheduler>,
    state_cache: Arc<StateCache>,
    classifier: Classifier,
    update_tx: mpsc::UnboundedSender<RefreshUpdate>,
    display_dir: Arc<Mutex<String>>,
    executor: Option<RefreshExecutor>,
}

impl RefreshEngine {
    /// Create an engine sharing caches with the sync pipeline.
    ///
    /// Returns the engine and the receiving end of the update queue; the
    /// UI (or any consumer) applies updates in arrival order, dropping
    /// those whose generation is stale.
    pub fn new(
        config: ProjectConfig,
        refresh_config: RefreshConfig,
        state_cache: Arc<StateCache>,
        tracked_cache: Arc<TrackedFilesCache>,
    ) -> (Self, mpsc::UnboundedReceiver<RefreshUpdate>) {
        let patterns = PatternSet::new(config.sources.clone(), config.excludes.clone());
        let work = GitRepo::new(&config.working_dir);
        let prod = GitRepo::new(&config.production_dir);
        let classifier = Classifier::new(work, prod, tracked_cache);
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        let engine = Self {
            config,
            refresh_config,
            patterns,
            scheduler: Arc::new(RefreshScheduler::new()),
            state_cache,
            classifier,
            update_tx,
            display_dir: Arc::new(Mutex::new(String::new())),
            executor: None,
        };
        (engine, update_rx)
    }

    /// Spawn the worker pool and (optionally) the change watcher.
    pub fn start(&mut self) {
        if self.executor.is_some() {
            return;
        }
        self.executor = Some(RefreshExecutor::spawn(
            Arc::clone(&self.scheduler),
            self.classifier.clone(),
            Arc::clone(&self.state_cache),
            self.update_tx.clone(),
            self.refresh_config.worker_count,
        ));
        if self.refresh_config.enable_watcher {
            spawn_watcher(
                GitRepo::new(&self.config.working_dir),
                self.patterns.clone(),
                Arc::clone(&self.scheduler),
                Arc::clone(&self.state_cache),
                Arc::clone(&self.display_dir),
                self.config.project_id,
                self.refresh_config.watch_interval,
            );
        }
        info!("Refresh engine started");
    }

    /// The latest refresh generation.
    pub fn current_generation(&self) -> u64 {
        self.scheduler.current_generation()
    }

    /// Whether a generation is still live (for apply-time checks).
    pub fn is_current(&self, generation: u64) -> bool {
        self.scheduler.is_current(generation)
    }

    /// Two-phase refresh of `dir` (project-relative, `""` for the root).
    ///
    /// Phase one runs synchronously: the immediate children of `dir` in
    /// both trees are enumerated, filtered through the patterns, and
    /// returned as `Pending` rows (or fresh cached states). Phase two is
    /// queued: one classification task per row at a new generation, which
    /// supersedes every earlier batch.
    pub fn refresh(&self, dir: &str) -> Result<Vec<RefreshRow>> {
        let dir = dir.trim_matches('/');
        if let Ok(mut display) = self.display_dir.lock() {
            display.clear();
            display.push_str(dir);
        }
        let generation = self.scheduler.begin_generation();
        debug!(dir, generation, "Refresh requested");

        let mut names = BTreeSet::new();
        for root in [&self.config.working_dir, &self.config.production_dir] {
            let scan_dir = root.join(dir);
            let Ok(entries) = std::fs::read_dir(&scan_dir) else {
                continue;
            };
            for entry in entries.filter_map(std::result::Result::ok) {
                let Ok(file_type) = entry.file_type() else {
                    continue;
                };
                if !file_type.is_file() {
                    continue;
                }
                let Ok(name) = entry.file_name().into_string() else {
                    continue;
                };
                let rel_path = if dir.is_empty() {
                    name
                } else {
                    format!("{dir}/{name}")
                };
                if self.patterns.is_member(&rel_path) {
                    names.insert(rel_path);
                }
            }
        }

        let mut rows = Vec::with_capacity(names.len());
        for rel_path in names {
            let state = self
                .state_cache
                .get(self.config.project_id, &rel_path)
                .unwrap_or(FileState::Pending);
            // Fresh cached rows need no background pass; the watcher
            // invalidates them when the tree changes.
            if state == FileState::Pending {
                self.scheduler.submit(RefreshTask {
                    project_id: self.config.project_id,
                    rel_path: rel_path.clone(),
                    generation,
                });
            }
            rows.push(RefreshRow { rel_path, state });
        }
        Ok(rows)
    }

    /// Shut the engine down and wait for the workers to drain.
    pub async fn stop(&mut self) {
        self.scheduler.shutdown();
        if let Some(executor) = self.executor.take() {
            executor.join().await;
        }
        info!("Refresh engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::UpdateResult;
    use std::path::Path;

    async fn git_repo(dir: &Path) -> GitRepo {
        let repo = GitRepo::new(dir);
        repo.init().await.unwrap();
        repo.config_user("t", "t@example.com").await.unwrap();
        repo
    }

    async fn project(root: &Path) -> ProjectConfig {
        let work_dir = root.join("work");
        let prod_dir = root.join("prod");
        std::fs::create_dir_all(&work_dir).unwrap();
        std::fs::create_dir_all(&prod_dir).unwrap();
        git_repo(&work_dir).await;
        git_repo(&prod_dir).await;
        ProjectConfig {
            production_dir: prod_dir,
            working_dir: work_dir,
            sources: vec!["**".to_string()],
            excludes: Vec::new(),
            upload_group: None,
            project_id: 1,
            backup_count: 0,
            log_path: None,
        }
    }

    fn engine_for(
        config: ProjectConfig,
    ) -> (RefreshEngine, mpsc::UnboundedReceiver<RefreshUpdate>) {
        let refresh_config = RefreshConfig {
            enable_watcher: false,
            ..RefreshConfig::default()
        };
        RefreshEngine::new(
            config,
            refresh_config,
            Arc::new(StateCache::new()),
            Arc::new(TrackedFilesCache::new()),
        )
    }

    #[tokio::test]
    async fn test_foreground_scan_emits_pending_rows() {
        let root = tempfile::tempdir().unwrap();
        let config = project(root.path()).await;
        std::fs::write(config.working_dir.join("a.txt"), "a").unwrap();
        std::fs::write(config.production_dir.join("b.txt"), "b").unwrap();

        let (engine, _rx) = engine_for(config);
        let rows = engine.refresh("").unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.rel_path.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert!(rows.iter().all(|r| r.state == FileState::Pending));
    }

    #[tokio::test]
    async fn test_scan_is_not_recursive() {
        let root = tempfile::tempdir().unwrap();
        let config = project(root.path()).await;
        std::fs::create_dir_all(config.working_dir.join("sub")).unwrap();
        std::fs::write(config.working_dir.join("sub/deep.txt"), "d").unwrap();
        std::fs::write(config.working_dir.join("top.txt"), "t").unwrap();

        let (engine, _rx) = engine_for(config);
        let rows = engine.refresh("").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rel_path, "top.txt");

        let rows = engine.refresh("sub").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rel_path, "sub/deep.txt");
    }

    #[tokio::test]
    async fn test_background_classification_posts_updates() {
        let root = tempfile::tempdir().unwrap();
        let config = project(root.path()).await;
        std::fs::write(config.working_dir.join("a.txt"), "same").unwrap();
        std::fs::write(config.production_dir.join("a.txt"), "same").unwrap();

        let (mut engine, mut rx) = engine_for(config);
        engine.start();
        let generation = {
            let rows = engine.refresh("").unwrap();
            assert_eq!(rows.len(), 1);
            engine.current_generation()
        };

        let update = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out")
            .expect("queue closed");
        assert_eq!(update.generation, generation);
        assert_eq!(update.rel_path, "a.txt");
        assert_eq!(update.result, UpdateResult::State(FileState::Same));

        engine.stop().await;
    }

    #[tokio::test]
    async fn test_superseded_generation_results_are_dropped() {
        let root = tempfile::tempdir().unwrap();
        let config = project(root.path()).await;
        std::fs::write(config.working_dir.join("a.txt"), "x").unwrap();

        let (mut engine, mut rx) = engine_for(config);
        // No workers yet: the first batch sits in the queue.
        let first_rows = engine.refresh("").unwrap();
        assert_eq!(first_rows.len(), 1);
        let stale_generation = engine.current_generation();

        // A second refresh supersedes the first before any worker runs.
        let _ = engine.refresh("").unwrap();
        let live_generation = engine.current_generation();
        assert!(live_generation > stale_generation);

        engine.start();
        let update = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out")
            .expect("queue closed");
        // Only the live generation ever reaches the queue.
        assert_eq!(update.generation, live_generation);
        assert!(engine.is_current(update.generation));

        // No further updates: the stale task was discarded, not executed.
        let extra = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
        assert!(extra.is_err(), "stale generation produced an update");

        engine.stop().await;
    }
}
