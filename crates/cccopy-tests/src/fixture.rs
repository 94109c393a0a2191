//! Two-tree project fixture

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use cccopy_config::ProjectConfig;
use cccopy_git::{CommitAuthor, GitRepo};
use cccopy_sync::SyncEngine;

/// A disposable project: a Production tree and a Work tree under one
/// temporary directory, plus the configuration binding them.
///
/// Production starts as a plain directory (no repository) so tests cover
/// the first-download bootstrap exactly like a fresh deployment.
pub struct TestProject {
    root: TempDir,
    /// Configuration binding the two trees
    pub config: ProjectConfig,
}

impl TestProject {
    /// Create a fresh project with `**` sources and no excludes.
    pub fn new() -> Self {
        Self::with_patterns(vec!["**".to_string()], Vec::new())
    }

    /// Create a fresh project with explicit pattern lists.
    pub fn with_patterns(sources: Vec<String>, excludes: Vec<String>) -> Self {
        let root = TempDir::new().expect("tempdir");
        let production_dir = root.path().join("production");
        let working_dir = root.path().join("work");
        std::fs::create_dir_all(&production_dir).expect("production dir");
        std::fs::create_dir_all(&working_dir).expect("work dir");

        let config = ProjectConfig {
            production_dir,
            working_dir,
            sources,
            excludes,
            upload_group: None,
            project_id: 1,
            backup_count: 0,
            log_path: None,
        };
        Self { root, config }
    }

    /// Root temporary directory (kept alive by the fixture).
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// A sync engine over this project.
    pub fn engine(&self) -> SyncEngine {
        SyncEngine::new(self.config.clone())
    }

    /// Git handle on the Work repository.
    pub fn work_repo(&self) -> GitRepo {
        GitRepo::new(&self.config.working_dir)
    }

    /// Git handle on the Production repository.
    pub fn prod_repo(&self) -> GitRepo {
        GitRepo::new(&self.config.production_dir)
    }

    /// Write a file into the Production tree.
    pub fn write_prod(&self, rel_path: &str, content: &str) {
        write_file(&self.config.production_dir.join(rel_path), content);
    }

    /// Write a file into the Work tree.
    pub fn write_work(&self, rel_path: &str, content: &str) {
        write_file(&self.config.working_dir.join(rel_path), content);
    }

    /// Read a Production file.
    pub fn read_prod(&self, rel_path: &str) -> String {
        std::fs::read_to_string(self.config.production_dir.join(rel_path)).expect("read prod")
    }

    /// Read a Work file.
    pub fn read_work(&self, rel_path: &str) -> String {
        std::fs::read_to_string(self.config.working_dir.join(rel_path)).expect("read work")
    }

    /// Path of a Work file.
    pub fn work_path(&self, rel_path: &str) -> PathBuf {
        self.config.working_dir.join(rel_path)
    }

    /// Commit a change directly into Production as another team member
    /// would through their own upload (distinct author, committed).
    pub async fn teammate_upload(&self, rel_path: &str, content: &str, message: &str) {
        self.write_prod(rel_path, content);
        let prod = self.prod_repo();
        prod.add_paths([rel_path]).await.expect("teammate add");
        let author = CommitAuthor {
            name: "teammate".to_string(),
            email: "teammate@cccopy.com".to_string(),
        };
        prod.commit(message, Some(&author)).await.expect("teammate commit");
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("parent dir");
    }
    std::fs::write(path, content).expect("write file");
}
