//! Aggregate counters for synchronization operations

use serde::{Deserialize, Serialize};

/// Counters accumulated by one Download or Upload pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Paths copied Production → Work
    pub updated: u64,
    /// Paths with local modifications (left untouched by Download)
    pub modified: u64,
    /// Paths identical on both sides
    pub same: u64,
    /// Paths in conflicted state
    pub conflicted: u64,
    /// Paths copied Work → Production
    pub uploaded: u64,
}

impl SyncStats {
    /// Create a new zeroed statistics object
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge another statistics object into this one
    pub fn merge(&mut self, other: &Self) {
        self.updated += other.updated;
        self.modified += other.modified;
        self.same += other.same;
        self.conflicted += other.conflicted;
        self.uploaded += other.uploaded;
    }

    /// Total number of paths examined
    pub fn total(&self) -> u64 {
        self.updated + self.modified + self.same + self.conflicted + self.uploaded
    }
}
