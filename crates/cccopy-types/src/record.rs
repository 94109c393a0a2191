//! Per-path comparison record

use serde::{Deserialize, Serialize};

/// Comparison tuple for one relative path, assembled from both working
/// trees and the blob hash at the sync base (the production commit the
/// trees last synchronized at).
///
/// A missing file or an absent base leaves the corresponding hash `None`.
/// Records are rematerialized on every refresh; they are never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRecord {
    /// POSIX-normalized path relative to the project root
    pub rel_path: String,
    /// Whether the file exists in the Work tree
    pub exists_work: bool,
    /// Whether the file exists in the Production tree
    pub exists_prod: bool,
    /// Git blob hash of the Work copy
    pub hash_work: Option<String>,
    /// Git blob hash of the Production copy
    pub hash_prod: Option<String>,
    /// Production commit the trees last synchronized at, if any
    pub base_commit: Option<String>,
    /// Blob hash recorded for this path at [`Self::base_commit`]
    pub hash_base: Option<String>,
}

impl PathRecord {
    /// Create an empty record for a path (absent on both sides)
    pub fn new<S: Into<String>>(rel_path: S) -> Self {
        Self {
            rel_path: rel_path.into(),
            exists_work: false,
            exists_prod: false,
            hash_work: None,
            hash_prod: None,
            base_commit: None,
            hash_base: None,
        }
    }

    /// Whether the path exists in neither tree (such records are not emitted)
    pub fn is_vacant(&self) -> bool {
        !self.exists_work && !self.exists_prod
    }
}
