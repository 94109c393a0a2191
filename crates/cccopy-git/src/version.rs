//! Git version detection
//!
//! Some deployments still run very old git (1.8 era on shared servers).
//! The version is detected once per process and cached; detection failure
//! conservatively assumes 1.8.0.

use std::sync::OnceLock;

use tracing::warn;

use crate::git_binary;

/// Detected git version triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GitVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    /// Patch version
    pub patch: u32,
}

impl GitVersion {
    /// Whether this version is at least `major.minor`.
    pub fn is_at_least(self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

impl std::fmt::Display for GitVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

static GIT_VERSION: OnceLock<GitVersion> = OnceLock::new();

/// Detect the git version, cached for the process lifetime.
pub fn git_version() -> GitVersion {
    *GIT_VERSION.get_or_init(|| {
        detect().unwrap_or_else(|| {
            warn!("Failed to detect git version, assuming 1.8.0");
            GitVersion {
                major: 1,
                minor: 8,
                patch: 0,
            }
        })
    })
}

fn detect() -> Option<GitVersion> {
    let output = std::process::Command::new(git_binary())
        .arg("--version")
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    parse(&text)
}

fn parse(text: &str) -> Option<GitVersion> {
    // "git version 2.49.0" (possibly with a platform suffix)
    let version = text.split_whitespace().nth(2)?;
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let patch = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    Some(GitVersion {
        major,
        minor,
        patch,
    })
}
