//! Structured wrapper over the git CLI for CCCopy
//!
//! CCCopy manages two plain Git working trees (Work and Production) through
//! a closed set of `git` invocations. This crate owns those invocations:
//! every command runs with the repository as its working directory, captures
//! stdout/stderr as UTF-8, and maps non-zero exits to
//! [`cccopy_types::Error::Git`] carrying the subcommand, exit code and
//! stderr. Callers never retry git commands automatically.
//!
//! The git binary defaults to `git` on `PATH` and can be overridden with
//! the `CCCOPY_GIT_BIN_PATH` environment variable.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod repo;
pub mod version;

pub use repo::{CommitAuthor, CommitFileChange, CommitInfo, GitRepo, StatusEntry};
pub use version::{git_version, GitVersion};

/// Resolve the git binary, honoring `CCCOPY_GIT_BIN_PATH`.
pub fn git_binary() -> String {
    std::env::var("CCCOPY_GIT_BIN_PATH").unwrap_or_else(|_| "git".to_string())
}
