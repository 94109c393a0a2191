//! Git repository handle and the closed command set

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use cccopy_types::{Error, Result};

use crate::git_binary;

/// Explicit commit author, used for Production commits where the committer
/// is the fixed dummy identity and the author records the real user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitAuthor {
    /// Author name
    pub name: String,
    /// Author email
    pub email: String,
}

impl CommitAuthor {
    /// Author for the current OS user: `<user> <user@cccopy.com>`.
    pub fn current_user() -> Self {
        let name = whoami::username();
        let email = format!("{name}@cccopy.com");
        Self { name, email }
    }

    /// `--author` argument value: `name <email>`.
    pub fn spec(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

/// One `status --porcelain` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    /// Index-side status character
    pub index: char,
    /// Worktree-side status character
    pub worktree: char,
    /// Path relative to the repository root (rename target for renames)
    pub path: String,
}

impl StatusEntry {
    /// Whether git reports the path as untracked (`??`)
    pub fn is_untracked(&self) -> bool {
        self.index == '?' && self.worktree == '?'
    }
}

/// One parsed `log --pretty=format:%h|%an|%ad|%s` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Abbreviated commit hash
    pub hash: String,
    /// Author name
    pub author: String,
    /// ISO date, timezone stripped
    pub date: String,
    /// Subject line
    pub message: String,
}

/// One file touched by a commit, from `show --name-status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitFileChange {
    /// Single-letter status (A, M, D, R, C)
    pub status: char,
    /// Path relative to the repository root
    pub path: String,
}

/// Handle to one Git working tree.
///
/// The handle is cheap to clone and holds no open resources; every
/// operation spawns a fresh `git` process.
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    /// Create a handle for the repository rooted at `root`.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Repository root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a `.git` directory exists at the root.
    pub fn is_repo(&self) -> bool {
        self.root.join(".git").exists()
    }

    /// Run a git subcommand and capture stdout.
    async fn run(&self, args: &[&str]) -> Result<String> {
        let subcommand = args.first().copied().unwrap_or_default().to_string();
        debug!(repo = %self.root.display(), command = %subcommand, "Running git");

        let output = Command::new(git_binary())
            .args(args)
            .current_dir(&self.root)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await
            .map_err(|e| Error::git(subcommand.clone(), -1, e.to_string()))?;

        if !output.status.success() {
            // Some git diagnostics ("nothing to commit") land on stdout.
            let mut detail = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if detail.is_empty() {
                detail = String::from_utf8_lossy(&output.stdout).trim().to_string();
            }
            return Err(Error::git(
                subcommand,
                output.status.code().unwrap_or(-1),
                detail,
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }

    /// `git init`
    pub async fn init(&self) -> Result<()> {
        self.run(&["init"]).await.map(|_| ())
    }

    /// `git config user.name <name>` and `git config user.email <email>`
    pub async fn config_user(&self, name: &str, email: &str) -> Result<()> {
        self.run(&["config", "user.name", name]).await?;
        self.run(&["config", "user.email", email]).await?;
        Ok(())
    }

    /// `git add --all .`
    pub async fn add_all(&self) -> Result<()> {
        self.run(&["add", "--all", "."]).await.map(|_| ())
    }

    /// `git add <path>` for each path.
    pub async fn add_paths<I, S>(&self, paths: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in paths {
            self.run(&["add", path.as_ref()]).await?;
        }
        Ok(())
    }

    /// `git rm -r --cached .` — drops the index so new ignore rules apply.
    /// Tolerates an empty index (nothing tracked yet).
    pub async fn rm_cached_all(&self) -> Result<()> {
        match self.run(&["rm", "-r", "--cached", "."]).await {
            Ok(_) => Ok(()),
            Err(Error::Git { stderr, .. }) if stderr.contains("did not match any files") => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// `git commit -m <message>`, optionally with an explicit `--author`.
    pub async fn commit(&self, message: &str, author: Option<&CommitAuthor>) -> Result<()> {
        match author {
            Some(author) => {
                let spec = author.spec();
                self.run(&["commit", "--author", &spec, "-m", message])
                    .await
                    .map(|_| ())
            }
            None => self.run(&["commit", "-m", message]).await.map(|_| ()),
        }
    }

    /// `git hash-object <path>` — the canonical content identifier.
    /// Returns `None` when the file does not exist in the working tree.
    pub async fn hash_object(&self, rel_path: &str) -> Result<Option<String>> {
        if !self.root.join(rel_path).is_file() {
            return Ok(None);
        }
        self.run(&["hash-object", rel_path]).await.map(Some)
    }

    /// `git rev-parse HEAD`; `None` on an unborn HEAD.
    pub async fn head_commit(&self) -> Result<Option<String>> {
        match self.run(&["rev-parse", "HEAD"]).await {
            Ok(hash) => Ok(Some(hash)),
            Err(Error::Git { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// `git ls-tree -r <rev>` parsed to path → blob hash.
    pub async fn ls_tree(&self, rev: &str) -> Result<HashMap<String, String>> {
        let output = self.run(&["ls-tree", "-r", rev]).await?;
        let mut tree = HashMap::new();
        for line in output.lines() {
            // "<mode> blob <hash>\t<path>"
            let Some((meta, path)) = line.split_once('\t') else {
                continue;
            };
            let mut fields = meta.split_whitespace();
            let (_mode, kind, hash) = (fields.next(), fields.next(), fields.next());
            if kind == Some("blob") {
                if let Some(hash) = hash {
                    tree.insert(path.to_string(), hash.to_string());
                }
            }
        }
        Ok(tree)
    }

    /// `git status --porcelain` parsed into entries.
    pub async fn status_porcelain(&self) -> Result<Vec<StatusEntry>> {
        let output = self.run(&["status", "--porcelain"]).await?;
        let mut entries = Vec::new();
        for line in output.lines() {
            let mut chars = line.chars();
            let (Some(index), Some(worktree)) = (chars.next(), chars.next()) else {
                continue;
            };
            let rest = chars.as_str().trim_start();
            if rest.is_empty() {
                continue;
            }
            // Renames report "old -> new"; the new path is the live one.
            let path = rest
                .rsplit_once(" -> ")
                .map_or(rest, |(_, new)| new)
                .to_string();
            entries.push(StatusEntry {
                index,
                worktree,
                path,
            });
        }
        Ok(entries)
    }

    /// Whether `status --porcelain` reports anything.
    pub async fn has_uncommitted_changes(&self) -> Result<bool> {
        Ok(!self.status_porcelain().await?.is_empty())
    }

    /// `git log --pretty=format:%h|%an|%ad|%s --date=iso`, newest first.
    pub async fn log(&self, limit: Option<usize>) -> Result<Vec<CommitInfo>> {
        self.log_inner(limit, None).await
    }

    /// History restricted to one path (`git log … -- <path>`).
    pub async fn log_for_path(
        &self,
        rel_path: &str,
        limit: Option<usize>,
    ) -> Result<Vec<CommitInfo>> {
        self.log_inner(limit, Some(rel_path)).await
    }

    async fn log_inner(
        &self,
        limit: Option<usize>,
        rel_path: Option<&str>,
    ) -> Result<Vec<CommitInfo>> {
        if self.head_commit().await?.is_none() {
            return Ok(Vec::new());
        }
        let limit_arg;
        let mut args = vec!["log", "--pretty=format:%h|%an|%ad|%s", "--date=iso"];
        if let Some(n) = limit {
            limit_arg = n.to_string();
            args.push("-n");
            args.push(&limit_arg);
        }
        if let Some(path) = rel_path {
            args.push("--");
            args.push(path);
        }
        let output = self.run(&args).await?;
        let mut commits = Vec::new();
        for line in output.lines() {
            let mut parts = line.splitn(4, '|');
            let (Some(hash), Some(author), Some(date), Some(message)) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            // "2026-08-02 10:15:00 +0900" → timezone stripped for display
            let date = date.rsplit_once(' ').map_or(date, |(d, _tz)| d);
            commits.push(CommitInfo {
                hash: hash.to_string(),
                author: author.to_string(),
                date: date.to_string(),
                message: message.to_string(),
            });
        }
        Ok(commits)
    }

    /// `git show <rev>:<path>` — file content at a revision.
    pub async fn show_at_rev(&self, rev: &str, rel_path: &str) -> Result<String> {
        let spec = format!("{rev}:{rel_path}");
        self.run(&["show", &spec]).await
    }

    /// `git show --name-status --pretty=format: <hash>` — files one commit touched.
    pub async fn commit_files(&self, hash: &str) -> Result<Vec<CommitFileChange>> {
        let output = self
            .run(&["show", "--name-status", "--pretty=format:", hash])
            .await?;
        let mut files = Vec::new();
        for line in output.lines() {
            let Some((status, path)) = line.split_once('\t') else {
                continue;
            };
            let Some(status) = status.chars().next() else {
                continue;
            };
            // Rename/copy lines carry "old\tnew"; keep the final path.
            let path = path.rsplit_once('\t').map_or(path, |(_, new)| new);
            files.push(CommitFileChange {
                status,
                path: path.to_string(),
            });
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn init_repo(dir: &Path) -> GitRepo {
        let repo = GitRepo::new(dir);
        repo.init().await.unwrap();
        repo.config_user("Test User", "test@example.com")
            .await
            .unwrap();
        repo
    }

    #[tokio::test]
    async fn test_init_and_detect_repo() {
        let dir = tempfile::tempdir().unwrap();
        let repo = GitRepo::new(dir.path());
        assert!(!repo.is_repo());
        repo.init().await.unwrap();
        assert!(repo.is_repo());
    }

    #[tokio::test]
    async fn test_unborn_head_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path()).await;
        assert_eq!(repo.head_commit().await.unwrap(), None);
        assert!(repo.log(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_and_ls_tree_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path()).await;
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.txt"), "A").unwrap();

        repo.add_all().await.unwrap();
        repo.commit("first", None).await.unwrap();

        let head = repo.head_commit().await.unwrap().unwrap();
        let tree = repo.ls_tree(&head).await.unwrap();
        let blob = repo.hash_object("src/a.txt").await.unwrap().unwrap();
        assert_eq!(tree.get("src/a.txt"), Some(&blob));
    }

    #[tokio::test]
    async fn test_hash_object_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path()).await;
        assert_eq!(repo.hash_object("nope.txt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_status_porcelain_parses_untracked() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path()).await;
        std::fs::write(dir.path().join("new.txt"), "x").unwrap();

        let entries = repo.status_porcelain().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_untracked());
        assert_eq!(entries[0].path, "new.txt");
        assert!(repo.has_uncommitted_changes().await.unwrap());
    }

    #[tokio::test]
    async fn test_explicit_author_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path()).await;
        std::fs::write(dir.path().join("f.txt"), "x").unwrap();
        repo.add_all().await.unwrap();

        let author = CommitAuthor {
            name: "alice".to_string(),
            email: "alice@cccopy.com".to_string(),
        };
        repo.commit("m", Some(&author)).await.unwrap();

        let log = repo.log(Some(1)).await.unwrap();
        assert_eq!(log[0].author, "alice");
        assert_eq!(log[0].message, "m");
    }

    #[tokio::test]
    async fn test_log_for_path_filters_history() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path()).await;
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        repo.add_all().await.unwrap();
        repo.commit("touch a", None).await.unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        repo.add_all().await.unwrap();
        repo.commit("touch b", None).await.unwrap();

        let only_a = repo.log_for_path("a.txt", None).await.unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].message, "touch a");
        assert_eq!(repo.log(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_commit_files_and_show_at_rev() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path()).await;
        std::fs::write(dir.path().join("a.txt"), "v1").unwrap();
        repo.add_all().await.unwrap();
        repo.commit("add a", None).await.unwrap();
        let head = repo.head_commit().await.unwrap().unwrap();

        let files = repo.commit_files(&head).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].status, 'A');
        assert_eq!(files[0].path, "a.txt");

        std::fs::write(dir.path().join("a.txt"), "v2").unwrap();
        assert_eq!(repo.show_at_rev("HEAD", "a.txt").await.unwrap(), "v1");
    }

    #[tokio::test]
    async fn test_git_error_carries_command_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path()).await;
        let err = repo.show_at_rev("HEAD", "missing.txt").await.unwrap_err();
        match err {
            Error::Git { command, code, .. } => {
                assert_eq!(command, "show");
                assert_ne!(code, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_rm_cached_all_tolerates_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path()).await;
        repo.rm_cached_all().await.unwrap();
    }
}
