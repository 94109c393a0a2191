//! The six-way file state classification

use serde::{Deserialize, Serialize};

/// State of a synchronized path, derived from comparing the Work copy and
/// the Production copy against the content the two trees last
/// synchronized at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    /// Work and Production contents are identical
    Same,
    /// The local user changed the file (or created it); Production is unchanged
    Modified,
    /// Production advanced while the local copy stayed at the last sync
    Updated,
    /// Both sides diverged from the last synchronized content
    Conflicted,
    /// The path exists in Production but not in Work
    Deleted,
    /// Classification has not run yet; placeholder published by the refresh scheduler
    Pending,
}

impl FileState {
    /// Lowercase wire/display name of this state
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Same => "same",
            Self::Modified => "modified",
            Self::Updated => "updated",
            Self::Conflicted => "conflicted",
            Self::Deleted => "deleted",
            Self::Pending => "pending",
        }
    }

    /// Whether this state marks the path as a candidate for Upload
    pub fn is_uploadable(self) -> bool {
        matches!(self, Self::Modified)
    }

    /// Whether Download should copy Production's content over the Work copy
    pub fn needs_download(self) -> bool {
        matches!(self, Self::Updated | Self::Deleted)
    }
}

impl std::fmt::Display for FileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names_round_trip() {
        for state in [
            FileState::Same,
            FileState::Modified,
            FileState::Updated,
            FileState::Conflicted,
            FileState::Deleted,
            FileState::Pending,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.as_str()));
        }
    }

    #[test]
    fn test_download_candidates() {
        assert!(FileState::Updated.needs_download());
        assert!(FileState::Deleted.needs_download());
        assert!(!FileState::Modified.needs_download());
        assert!(!FileState::Conflicted.needs_download());
    }
}
