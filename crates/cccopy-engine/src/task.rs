//! Refresh tasks and the updates they produce

use serde::{Deserialize, Serialize};

use cccopy_types::FileState;

/// One queued classification task.
///
/// Tasks carry the generation of the refresh batch that created them;
/// results from superseded generations are discarded both at dequeue and
/// at apply time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTask {
    /// Project the task belongs to
    pub project_id: u32,
    /// Path to classify, relative to the project root
    pub rel_path: String,
    /// Refresh generation this task was created in
    pub generation: u64,
}

/// One row of the foreground scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRow {
    /// Path relative to the project root
    pub rel_path: String,
    /// `Pending`, or a fresh cached state
    pub state: FileState,
}

/// Result payload of a background classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateResult {
    /// The classified state
    State(FileState),
    /// The path exists in neither tree; its row should be dropped
    Vacant,
    /// Classification failed; workers post errors, they never panic
    Failed(String),
}

/// One update posted by a worker onto the result queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshUpdate {
    /// Generation the producing task belonged to
    pub generation: u64,
    /// Path the update is about
    pub rel_path: String,
    /// Classification result
    pub result: UpdateResult,
}
