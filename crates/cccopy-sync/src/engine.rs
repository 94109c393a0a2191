//! Download / Upload / Save synchronization engine
//!
//! Orchestrates the lock manager, privilege scope, pattern matcher and
//! classifier around git invocations. Every mutating Production operation
//! runs with the lock held and Production writes additionally inside the
//! privilege scope (lock outside, privilege inside). Failures unwind
//! without issuing the pending commit; partial file copies are left on
//! disk and a retry picks up the remaining work.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use cccopy_config::ProjectConfig;
use cccopy_git::{CommitAuthor, GitRepo};
use cccopy_types::{Error, FileState, Result, SyncStats};

use crate::backup::create_backup;
use crate::cache::{StateCache, TrackedFilesCache};
use crate::classify::Classifier;
use crate::lock::{with_lock, LockGuard};
use crate::pattern::PatternSet;
use crate::privilege::PrivilegeScope;
use crate::tag::ProductionTag;

/// Fixed Production committer name
pub const PRODUCTION_USER_NAME: &str = "cccopy_admin";
/// Fixed Production committer email
pub const PRODUCTION_USER_EMAIL: &str = "admin@cccopy.com";
/// Name of the single per-project Production lock
pub const PRODUCTION_LOCK: &str = "production";

/// Canned message for the Download auto-commit
pub const MSG_SYNC_NEW_FILES: &str = "auto: sync new files from production";
/// Canned message for the direct-edit salvage commit
pub const MSG_SALVAGE_DIRECT_EDITS: &str = "auto: salvage direct edits";
/// Canned message for the Production bootstrap commit
const MSG_INITIAL_PRODUCTION: &str = "auto: initial production repository";

/// How long a background refresh may skip the Production direct-edit check
const PRODUCTION_CHECK_INTERVAL: Duration = Duration::from_secs(300);

/// Default lock acquisition budget for pipeline operations
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one Download pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadOutcome {
    /// Per-state counters
    pub stats: SyncStats,
    /// Paths left for the external diff collaborator
    pub conflicts: Vec<String>,
    /// Paths that did not exist in Work before this pass
    pub new_files: Vec<String>,
    /// Whether the Work `.gitignore` was (re)written from Production
    pub gitignore_refreshed: bool,
}

/// Outcome of one Upload pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadOutcome {
    /// Per-state counters
    pub stats: SyncStats,
    /// Paths copied into Production and committed
    pub uploaded: Vec<String>,
    /// Whether a diverging Work `.gitignore` was restored from Production
    pub gitignore_violation: bool,
    /// Whether direct Production edits were salvaged first
    pub salvaged_direct_edits: bool,
}

/// Outcome of one Save pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveOutcome {
    /// Paths committed to the Work repository
    pub committed: Vec<String>,
    /// Changed paths outside the source patterns, left uncommitted
    pub skipped: Vec<String>,
}

/// The synchronization engine for one project
#[derive(Debug)]
pub struct SyncEngine {
    config: ProjectConfig,
    patterns: PatternSet,
    work: GitRepo,
    prod: GitRepo,
    privilege: PrivilegeScope,
    tag: ProductionTag,
    state_cache: Arc<StateCache>,
    tracked_cache: Arc<TrackedFilesCache>,
    lock_timeout: Duration,
    last_production_check: Mutex<Option<Instant>>,
}

impl SyncEngine {
    /// Create an engine with fresh caches.
    pub fn new(config: ProjectConfig) -> Self {
        Self::with_caches(
            config,
            Arc::new(StateCache::new()),
            Arc::new(TrackedFilesCache::new()),
        )
    }

    /// Create an engine sharing caches with a refresh scheduler.
    pub fn with_caches(
        config: ProjectConfig,
        state_cache: Arc<StateCache>,
        tracked_cache: Arc<TrackedFilesCache>,
    ) -> Self {
        let patterns = PatternSet::new(config.sources.clone(), config.excludes.clone());
        let work = GitRepo::new(&config.working_dir);
        let prod = GitRepo::new(&config.production_dir);
        let privilege = PrivilegeScope::new(
            config.upload_group.clone(),
            config.production_dir.join(".cccopy").join("audit.log"),
        );
        let tag = ProductionTag::new(&config.working_dir);
        Self {
            config,
            patterns,
            work,
            prod,
            privilege,
            tag,
            state_cache,
            tracked_cache,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            last_production_check: Mutex::new(None),
        }
    }

    /// Override the lock acquisition budget.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Project configuration backing this engine.
    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Pattern set backing this engine.
    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    /// Classifier bound to this engine's repositories and caches.
    pub fn classifier(&self) -> Classifier {
        Classifier::new(
            self.work.clone(),
            self.prod.clone(),
            Arc::clone(&self.tracked_cache),
        )
    }

    /// Relative paths belonging to the project: the union of both trees,
    /// filtered through the source/exclude patterns.
    pub fn collect_files(&self) -> Vec<String> {
        let mut members = BTreeSet::new();
        for root in [&self.config.production_dir, &self.config.working_dir] {
            if !root.is_dir() {
                continue;
            }
            for entry in WalkDir::new(root).into_iter().filter_map(std::result::Result::ok) {
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(rel) = entry.path().strip_prefix(root) else {
                    continue;
                };
                let rel = rel.to_string_lossy().replace('\\', "/");
                if self.patterns.is_member(&rel) {
                    members.insert(rel);
                }
            }
        }
        members.into_iter().collect()
    }

    /// Classify every member path. Used by the status view and tests;
    /// the refresh scheduler drives the classifier incrementally instead.
    pub async fn status(&self) -> Result<Vec<(String, FileState)>> {
        let classifier = self.classifier();
        let mut rows = Vec::new();
        for rel_path in self.collect_files() {
            if let Some(state) = classifier.state_of(&rel_path).await? {
                rows.push((rel_path, state));
            }
        }
        Ok(rows)
    }

    /// Save: commit source-pattern changes in the Work repository.
    pub async fn save(&self, message: &str) -> Result<SaveOutcome> {
        info!("=== SAVE (commit work repository) ===");
        self.require_work_repo()?;

        let mut outcome = SaveOutcome::default();
        for entry in self.work.status_porcelain().await? {
            if self.patterns.is_member(&entry.path) {
                outcome.committed.push(entry.path);
            } else {
                outcome.skipped.push(entry.path);
            }
        }
        if !outcome.skipped.is_empty() {
            warn!(
                count = outcome.skipped.len(),
                "Changed files outside the source patterns are not saved"
            );
        }
        if outcome.committed.is_empty() {
            info!("Nothing to save within the source patterns");
            return Ok(outcome);
        }

        self.work.add_paths(&outcome.committed).await?;
        self.work.commit(message, None).await?;
        info!(count = outcome.committed.len(), "Save committed");

        self.invalidate_after_mutation();
        Ok(outcome)
    }

    /// Download: Production → Work under the Production lock.
    pub async fn download(&self) -> Result<DownloadOutcome> {
        info!("=== DOWNLOAD (production -> work) ===");
        if !self.config.production_dir.is_dir() {
            return Err(Error::config(format!(
                "production directory does not exist: {}",
                self.config.production_dir.display()
            )));
        }

        let lock = self.acquire_production_lock().await?;
        let result = self.download_locked().await;
        lock.release()?;
        self.invalidate_after_mutation();
        result
    }

    async fn download_locked(&self) -> Result<DownloadOutcome> {
        let mut outcome = DownloadOutcome::default();

        // First-time bootstrap of either repository.
        if !self.prod.is_repo() {
            self.bootstrap_production().await?;
        } else {
            self.salvage_direct_edits_locked().await?;
        }
        if !self.work.is_repo() {
            info!("Initializing work repository");
            self.work.init().await?;
            let author = CommitAuthor::current_user();
            self.work.config_user(&author.name, &author.email).await?;
        }

        // `.gitignore` flows Production → Work, never the other way.
        outcome.gitignore_refreshed = self.sync_gitignore_to_work().await?;

        let classifier = self.classifier();
        for rel_path in self.collect_files() {
            if rel_path == ".gitignore" {
                continue;
            }
            let Some(state) = classifier.state_of(&rel_path).await? else {
                continue;
            };
            match state {
                state if state.needs_download() => {
                    let was_new = !self.config.working_dir.join(&rel_path).is_file();
                    self.copy_file(
                        &self.config.production_dir.join(&rel_path),
                        &self.config.working_dir.join(&rel_path),
                    )
                    .await?;
                    debug!(path = %rel_path, "Downloaded");
                    outcome.stats.updated += 1;
                    if was_new {
                        outcome.new_files.push(rel_path);
                    }
                }
                FileState::Same => outcome.stats.same += 1,
                FileState::Modified => outcome.stats.modified += 1,
                FileState::Conflicted => {
                    warn!(path = %rel_path, "Conflict detected, work copy left untouched");
                    outcome.stats.conflicted += 1;
                    outcome.conflicts.push(rel_path);
                }
                _ => {}
            }
        }

        if !outcome.new_files.is_empty() {
            info!(
                count = outcome.new_files.len(),
                "Committing new files from production"
            );
            self.work.add_paths(&outcome.new_files).await?;
            self.work.commit(MSG_SYNC_NEW_FILES, None).await?;
        }

        // The tag moves forward only when nothing was left unresolved;
        // a surviving conflict must keep classifying as one.
        if outcome.conflicts.is_empty() {
            if let Some(head) = self.prod.head_commit().await? {
                self.tag.save(&head)?;
            }
        } else {
            warn!(
                count = outcome.conflicts.len(),
                "Unresolved conflicts, production tag not advanced"
            );
        }

        info!(
            updated = outcome.stats.updated,
            modified = outcome.stats.modified,
            same = outcome.stats.same,
            conflicted = outcome.stats.conflicted,
            "Download finished"
        );
        Ok(outcome)
    }

    /// Upload: Work → Production under the lock and the privilege scope.
    pub async fn upload(&self, message: &str) -> Result<UploadOutcome> {
        info!("=== UPLOAD (work -> production) ===");
        self.require_work_repo()?;
        if !self.config.production_dir.is_dir() {
            return Err(Error::config(format!(
                "production directory does not exist: {}",
                self.config.production_dir.display()
            )));
        }

        let lock = self.acquire_production_lock().await?;
        let result = self.upload_locked(message).await;
        lock.release()?;
        self.invalidate_after_mutation();
        result
    }

    async fn upload_locked(&self, message: &str) -> Result<UploadOutcome> {
        let mut outcome = UploadOutcome::default();
        let guard = self.privilege.enter("upload")?;

        outcome.gitignore_violation = self.enforce_gitignore_guard().await?;
        outcome.salvaged_direct_edits = self.salvage_direct_edits_locked().await?;

        let classifier = self.classifier();
        let mut modified = Vec::new();
        let mut conflicted = Vec::new();
        for rel_path in self.collect_files() {
            if rel_path == ".gitignore" {
                continue;
            }
            if !self.config.working_dir.join(&rel_path).is_file() {
                continue;
            }
            match classifier.state_of(&rel_path).await? {
                Some(state) if state.is_uploadable() => modified.push(rel_path),
                Some(FileState::Conflicted) => conflicted.push(rel_path),
                _ => {}
            }
        }

        if !conflicted.is_empty() {
            warn!(count = conflicted.len(), "Upload refused, conflicts present");
            return Err(Error::Conflict { paths: conflicted });
        }
        if modified.is_empty() {
            info!("No modified files to upload");
            guard.leave()?;
            return Ok(outcome);
        }

        for rel_path in &modified {
            let production_file = self.config.production_dir.join(rel_path);
            create_backup(&production_file, self.config.backup_count)?;
            self.copy_file(&self.config.working_dir.join(rel_path), &production_file)
                .await?;
            self.apply_group_permissions(&production_file)?;
            debug!(path = %rel_path, "Uploaded");
        }
        outcome.stats.uploaded = modified.len() as u64;

        self.prod.add_paths(&modified).await?;
        self.prod
            .commit(message, Some(&CommitAuthor::current_user()))
            .await?;
        info!(count = modified.len(), "Upload committed");
        outcome.uploaded = modified;

        // The published content is the new sync base.
        if let Some(head) = self.prod.head_commit().await? {
            self.tag.save(&head)?;
        }

        guard.leave()?;
        Ok(outcome)
    }

    /// Commit direct edits made to Production outside this system.
    ///
    /// Background refreshes pass `force = false` and are throttled; the
    /// pipeline always forces the check. Returns whether a salvage commit
    /// was made.
    pub async fn salvage_production_edits(&self, force: bool) -> Result<bool> {
        if !force && !self.production_check_due() {
            debug!("Production direct-edit check throttled");
            return Ok(false);
        }
        if !self.prod.is_repo() {
            return Ok(false);
        }
        let lock = self.acquire_production_lock().await?;
        let salvaged = self.salvage_direct_edits_locked().await;
        lock.release()?;
        if matches!(salvaged, Ok(true)) {
            self.invalidate_after_mutation();
        }
        salvaged
    }

    /// Production commit history, read under the lock.
    pub async fn production_history(&self, limit: Option<usize>) -> Result<Vec<cccopy_git::CommitInfo>> {
        let lock = self.acquire_production_lock().await?;
        let log = self.prod.log(limit).await;
        lock.release()?;
        log
    }

    /// Work commit history. Reads are not locked.
    pub async fn work_history(&self, limit: Option<usize>) -> Result<Vec<cccopy_git::CommitInfo>> {
        self.require_work_repo()?;
        self.work.log(limit).await
    }

    async fn acquire_production_lock(&self) -> Result<LockGuard> {
        debug!("Acquiring production lock");
        with_lock(
            &self.config.production_dir,
            PRODUCTION_LOCK,
            self.lock_timeout,
        )
        .await
    }

    async fn bootstrap_production(&self) -> Result<()> {
        info!("Initializing production repository");
        let guard = self.privilege.enter("initialize production repository")?;

        self.prod.init().await?;
        self.prod
            .config_user(PRODUCTION_USER_NAME, PRODUCTION_USER_EMAIL)
            .await?;

        // Seed the central `.gitignore` from the exclude patterns.
        let mut gitignore = String::from("# cccopy internal directory\n.cccopy/\n");
        if !self.config.excludes.is_empty() {
            gitignore.push('\n');
            for pattern in &self.config.excludes {
                gitignore.push_str(pattern);
                gitignore.push('\n');
            }
        }
        tokio::fs::write(self.config.production_dir.join(".gitignore"), gitignore).await?;

        let mut initial: Vec<String> = self
            .collect_files()
            .into_iter()
            .filter(|rel| self.config.production_dir.join(rel).is_file())
            .collect();
        initial.push(".gitignore".to_string());
        self.prod.add_paths(&initial).await?;
        self.prod
            .commit(MSG_INITIAL_PRODUCTION, Some(&CommitAuthor::current_user()))
            .await?;

        guard.leave()?;
        Ok(())
    }

    async fn salvage_direct_edits_locked(&self) -> Result<bool> {
        let changed: Vec<String> = self
            .prod
            .status_porcelain()
            .await?
            .into_iter()
            .map(|entry| entry.path)
            .filter(|path| self.patterns.is_member(path))
            .collect();
        if changed.is_empty() {
            debug!("No direct production edits");
            return Ok(false);
        }

        warn!(count = changed.len(), "Salvaging direct production edits");
        let guard = self.privilege.enter("salvage direct edits")?;
        self.prod.add_paths(&changed).await?;
        self.prod
            .commit(MSG_SALVAGE_DIRECT_EDITS, Some(&CommitAuthor::current_user()))
            .await?;
        guard.leave()?;
        Ok(true)
    }

    /// Copy Production's `.gitignore` over Work's. A diverging Work copy is
    /// backed up beside it before being replaced. Returns whether Work's
    /// copy changed (which forces a Work index refresh).
    async fn sync_gitignore_to_work(&self) -> Result<bool> {
        let production_gitignore = self.config.production_dir.join(".gitignore");
        let work_gitignore = self.config.working_dir.join(".gitignore");

        let Ok(production_content) = tokio::fs::read_to_string(&production_gitignore).await else {
            debug!("Production has no .gitignore");
            return Ok(false);
        };

        let changed = match tokio::fs::read_to_string(&work_gitignore).await {
            Ok(work_content) if work_content == production_content => false,
            Ok(_) => {
                let backup = self.config.working_dir.join(".gitignore.backup");
                tokio::fs::copy(&work_gitignore, &backup).await?;
                let violation = Error::gitignore_violation(format!(
                    "work copy diverged; backed up to {} and replaced",
                    backup.display()
                ));
                warn!("{violation}");
                true
            }
            Err(_) => true,
        };
        if !changed {
            return Ok(false);
        }

        tokio::fs::write(&work_gitignore, production_content).await?;
        // Refresh the index so the new ignore rules take effect.
        if self.work.is_repo() {
            self.work.rm_cached_all().await?;
            self.work.add_all().await?;
        }
        Ok(true)
    }

    /// Upload-side `.gitignore` guard: a diverging Work copy is restored
    /// from Production and reported, never propagated.
    async fn enforce_gitignore_guard(&self) -> Result<bool> {
        let production_gitignore = self.config.production_dir.join(".gitignore");
        let work_gitignore = self.config.working_dir.join(".gitignore");

        let Ok(production_content) = tokio::fs::read_to_string(&production_gitignore).await else {
            return Ok(false);
        };
        match tokio::fs::read_to_string(&work_gitignore).await {
            Ok(work_content) if work_content != production_content => {
                // Not fatal: the production copy is restored and the
                // upload proceeds, but the violation is reported through
                // the error taxonomy so CLI and logs agree on the wording.
                let violation = Error::gitignore_violation(
                    "work copy was modified; restoring the production copy",
                );
                warn!("{violation}");
                tokio::fs::write(&work_gitignore, production_content).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(from, to).await?;
        Ok(())
    }

    /// chgrp to the upload group and make the file group-writable, so the
    /// next teammate's privilege scope can overwrite it.
    fn apply_group_permissions(&self, path: &Path) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            if let Some(group_name) = self.config.upload_group.as_deref() {
                let group = nix::unistd::Group::from_name(group_name)
                    .map_err(|e| Error::config(format!("group lookup failed: {e}")))?
                    .ok_or_else(|| Error::config(format!("unknown group '{group_name}'")))?;
                nix::unistd::chown(path, None, Some(group.gid))
                    .map_err(|e| Error::other(format!("chgrp failed for {}: {e}", path.display())))?;
            }

            let metadata = std::fs::metadata(path)?;
            let mut permissions = metadata.permissions();
            permissions.set_mode(permissions.mode() | 0o060);
            std::fs::set_permissions(path, permissions)?;
        }
        #[cfg(not(unix))]
        {
            let _ = path;
        }
        Ok(())
    }

    fn require_work_repo(&self) -> Result<()> {
        if self.work.is_repo() {
            Ok(())
        } else {
            Err(Error::other(
                "work repository not initialized, run download first",
            ))
        }
    }

    fn production_check_due(&self) -> bool {
        let Ok(mut last) = self.last_production_check.lock() else {
            return true;
        };
        match *last {
            Some(at) if at.elapsed() < PRODUCTION_CHECK_INTERVAL => false,
            _ => {
                *last = Some(Instant::now());
                true
            }
        }
    }

    fn invalidate_after_mutation(&self) {
        self.state_cache.invalidate_project(self.config.project_id);
        self.tracked_cache.invalidate(&self.config.working_dir);
        self.tracked_cache.invalidate(&self.config.production_dir);
    }
}
