//! File-state classification
//!
//! Labels every project path by comparing the Work and Production working
//! copies against the *sync base* — the blob recorded for the path at the
//! production commit this Work tree last synchronized at (the production
//! tag). The (work changed?, prod changed?) quadrants relative to that
//! base distinguish a remote-only advance (`Updated`) from a local edit
//! (`Modified`) and a double-sided one (`Conflicted`). Content equality
//! between the two working copies dominates everything else, so edits
//! that converge never report as conflicts.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use cccopy_git::GitRepo;
use cccopy_types::{FileState, PathRecord, Result};

use crate::cache::TrackedFilesCache;
use crate::tag::ProductionTag;

/// Derive the state for a comparison record.
///
/// Returns `None` for paths that exist in neither tree (no row emitted).
/// This is a pure function of the record; `Pending` is never produced
/// here.
pub fn classify(record: &PathRecord) -> Option<FileState> {
    if record.is_vacant() {
        return None;
    }
    if !record.exists_work {
        return Some(FileState::Deleted);
    }
    if !record.exists_prod {
        return Some(FileState::Modified);
    }
    if record.hash_work == record.hash_prod {
        return Some(FileState::Same);
    }
    if record.base_commit.is_none() {
        // Never synchronized: production is authoritative on the first
        // download.
        return Some(FileState::Updated);
    }
    // A path absent at the base has no agreed ancestor; both sides then
    // count as changed, which degrades safely to Conflicted.
    let base = record.hash_base.as_deref();
    let work_changed = base.is_none() || record.hash_work.as_deref() != base;
    let prod_changed = base.is_none() || record.hash_prod.as_deref() != base;
    Some(match (work_changed, prod_changed) {
        (false, true) => FileState::Updated,
        (true, false) => FileState::Modified,
        (true, true) => FileState::Conflicted,
        // Unreachable: equal to the base on both sides means equal
        // content, which the equality row already caught.
        (false, false) => FileState::Modified,
    })
}

/// Builds comparison records from the two working trees.
#[derive(Debug, Clone)]
pub struct Classifier {
    work: GitRepo,
    prod: GitRepo,
    tag: ProductionTag,
    tracked: Arc<TrackedFilesCache>,
}

impl Classifier {
    /// Create a classifier over the two repositories.
    pub fn new(work: GitRepo, prod: GitRepo, tracked: Arc<TrackedFilesCache>) -> Self {
        let tag = ProductionTag::new(work.root());
        Self {
            work,
            prod,
            tag,
            tracked,
        }
    }

    /// Assemble the comparison record for one relative path.
    pub async fn record_for(&self, rel_path: &str) -> Result<PathRecord> {
        let mut record = PathRecord::new(rel_path);
        record.exists_work = self.work.root().join(rel_path).is_file();
        record.exists_prod = self.prod.root().join(rel_path).is_file();
        record.hash_work = self.work.hash_object(rel_path).await?;
        record.hash_prod = self.prod.hash_object(rel_path).await?;

        record.base_commit = self.tag.load();
        if let Some(base_commit) = record.base_commit.as_deref() {
            let base_tree = self.rev_tree(&self.prod, base_commit).await?;
            record.hash_base = base_tree.get(rel_path).cloned();
        }
        Ok(record)
    }

    /// Classify one path; `None` when it exists in neither tree.
    pub async fn state_of(&self, rel_path: &str) -> Result<Option<FileState>> {
        let record = self.record_for(rel_path).await?;
        let state = classify(&record);
        debug!(path = rel_path, state = ?state, "Classified");
        Ok(state)
    }

    /// Snapshot of a repository at a specific revision, served from the
    /// tracked-files cache when fresh.
    async fn rev_tree(&self, repo: &GitRepo, rev: &str) -> Result<Arc<HashMap<String, String>>> {
        if let Some(tree) = self.tracked.get(repo.root(), rev) {
            return Ok(tree);
        }
        let tree = repo.ls_tree(rev).await?;
        self.tracked.insert(repo.root(), rev.to_string(), tree.clone());
        Ok(Arc::new(tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        work: Option<&str>,
        prod: Option<&str>,
        base: Option<&str>,
        base_commit: Option<&str>,
    ) -> PathRecord {
        PathRecord {
            rel_path: "src/a.txt".to_string(),
            exists_work: work.is_some(),
            exists_prod: prod.is_some(),
            hash_work: work.map(String::from),
            hash_prod: prod.map(String::from),
            base_commit: base_commit.map(String::from),
            hash_base: base.map(String::from),
        }
    }

    #[test]
    fn test_vacant_path_emits_no_row() {
        assert_eq!(classify(&record(None, None, None, None)), None);
    }

    #[test]
    fn test_missing_in_work_is_deleted() {
        let state = classify(&record(None, Some("p"), Some("p"), Some("c1")));
        assert_eq!(state, Some(FileState::Deleted));
    }

    #[test]
    fn test_new_local_file_is_modified() {
        let state = classify(&record(Some("w"), None, None, Some("c1")));
        assert_eq!(state, Some(FileState::Modified));
    }

    #[test]
    fn test_hash_equality_dominates_base_hashes() {
        // Both sides converged on the same content even though each
        // diverged from the base.
        let state = classify(&record(Some("x"), Some("x"), Some("a"), Some("c1")));
        assert_eq!(state, Some(FileState::Same));
    }

    #[test]
    fn test_never_synced_defaults_to_updated() {
        let state = classify(&record(Some("a"), Some("b"), None, None));
        assert_eq!(state, Some(FileState::Updated));
    }

    #[test]
    fn test_remote_only_change_is_updated() {
        let state = classify(&record(Some("a"), Some("a2"), Some("a"), Some("c1")));
        assert_eq!(state, Some(FileState::Updated));
    }

    #[test]
    fn test_local_only_change_is_modified() {
        let state = classify(&record(Some("edit"), Some("a"), Some("a"), Some("c1")));
        assert_eq!(state, Some(FileState::Modified));
    }

    #[test]
    fn test_double_sided_change_is_conflicted() {
        let state = classify(&record(Some("x"), Some("y"), Some("base"), Some("c1")));
        assert_eq!(state, Some(FileState::Conflicted));
    }

    #[test]
    fn test_path_absent_at_base_is_conflicted() {
        // Added independently on both sides after the last sync.
        let state = classify(&record(Some("a"), Some("b"), None, Some("c1")));
        assert_eq!(state, Some(FileState::Conflicted));
    }

    mod with_repos {
        use super::*;

        async fn repo(dir: &std::path::Path) -> GitRepo {
            let repo = GitRepo::new(dir);
            repo.init().await.unwrap();
            repo.config_user("t", "t@example.com").await.unwrap();
            repo
        }

        #[tokio::test]
        async fn test_record_builder_reads_both_trees() {
            let root = tempfile::tempdir().unwrap();
            let work_dir = root.path().join("work");
            let prod_dir = root.path().join("prod");
            std::fs::create_dir_all(&work_dir).unwrap();
            std::fs::create_dir_all(&prod_dir).unwrap();

            let work = repo(&work_dir).await;
            let prod = repo(&prod_dir).await;

            std::fs::write(prod_dir.join("a.txt"), "A").unwrap();
            prod.add_all().await.unwrap();
            prod.commit("init", None).await.unwrap();
            let head = prod.head_commit().await.unwrap().unwrap();
            ProductionTag::new(&work_dir).save(&head).unwrap();

            let classifier =
                Classifier::new(work.clone(), prod.clone(), Arc::new(TrackedFilesCache::new()));
            let record = classifier.record_for("a.txt").await.unwrap();

            assert!(!record.exists_work);
            assert!(record.exists_prod);
            assert!(record.hash_prod.is_some());
            assert_eq!(record.hash_prod, record.hash_base);
            assert_eq!(record.base_commit, Some(head));
            assert_eq!(classify(&record), Some(FileState::Deleted));
        }

        #[tokio::test]
        async fn test_same_content_classifies_same() {
            let root = tempfile::tempdir().unwrap();
            let work_dir = root.path().join("work");
            let prod_dir = root.path().join("prod");
            std::fs::create_dir_all(&work_dir).unwrap();
            std::fs::create_dir_all(&prod_dir).unwrap();

            let work = repo(&work_dir).await;
            let prod = repo(&prod_dir).await;

            for (repo, dir) in [(&work, &work_dir), (&prod, &prod_dir)] {
                std::fs::write(dir.join("a.txt"), "same").unwrap();
                repo.add_all().await.unwrap();
                repo.commit("c", None).await.unwrap();
            }

            let classifier = Classifier::new(work, prod, Arc::new(TrackedFilesCache::new()));
            let state = classifier.state_of("a.txt").await.unwrap();
            assert_eq!(state, Some(FileState::Same));
        }
    }
}
