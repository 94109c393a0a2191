//! Sync-base tag
//!
//! The classifier needs a third reference point beside the two working
//! copies: the production commit this Work tree last synchronized at.
//! Comparing both sides against that base is what separates a remote-only
//! advance (`Updated`) from a local edit (`Modified`) — neither tree's
//! own HEAD can carry that information, since Save moves Work HEAD and
//! every Upload moves Production HEAD.
//!
//! The tag is one line, the production commit hash, stored at
//! `<working_dir>/.cccopy/production_tag`. Download advances it only when
//! no conflict was left unresolved; Upload advances it after its commit.

use std::path::PathBuf;

use tracing::debug;

use cccopy_types::Result;

const TAG_FILE: &str = "production_tag";

/// Reads and writes the per-work-tree sync-base tag
#[derive(Debug, Clone)]
pub struct ProductionTag {
    working_dir: PathBuf,
}

impl ProductionTag {
    /// Tag accessor for a Work tree.
    pub fn new<P: Into<PathBuf>>(working_dir: P) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    /// Tag file path.
    pub fn path(&self) -> PathBuf {
        self.working_dir.join(".cccopy").join(TAG_FILE)
    }

    /// The recorded base commit, `None` before the first download.
    pub fn load(&self) -> Option<String> {
        let text = std::fs::read_to_string(self.path()).ok()?;
        let commit = text.lines().next()?.trim();
        (!commit.is_empty()).then(|| commit.to_string())
    }

    /// Record a new base commit.
    pub fn save(&self, commit: &str) -> Result<()> {
        let path = self.path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, format!("{commit}\n"))?;
        debug!(commit, "Production tag saved");
        Ok(())
    }
}
