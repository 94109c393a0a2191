//! Core type system and error handling for CCCopy
//!
//! This crate provides the foundational types shared by the CCCopy crates:
//!
//! - **Error handling**: the error taxonomy with severity levels and the
//!   process exit-code mapping
//! - **File states**: the six-way classification of a synchronized path
//! - **Path records**: the per-path comparison tuple built from both
//!   working trees and their Git HEADs
//!
//! # Examples
//!
//! ```rust
//! use cccopy_types::{FileState, PathRecord};
//!
//! let record = PathRecord::new("src/a.txt");
//! assert!(!record.exists_work);
//! assert_eq!(FileState::Pending.as_str(), "pending");
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod record;
pub mod result;
pub mod state;
pub mod stats;

// Re-export commonly used types
pub use error::{Error, ErrorSeverity};
pub use record::PathRecord;
pub use result::Result;
pub use state::FileState;
pub use stats::SyncStats;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_stats_merge() {
        let mut stats1 = SyncStats::new();
        stats1.updated = 3;
        stats1.same = 2;

        let mut stats2 = SyncStats::new();
        stats2.updated = 1;
        stats2.modified = 4;

        stats1.merge(&stats2);
        assert_eq!(stats1.updated, 4);
        assert_eq!(stats1.modified, 4);
        assert_eq!(stats1.same, 2);
        assert_eq!(stats1.total(), 10);
    }

    #[test]
    fn test_soft_failures_stay_low_severity() {
        let violation = Error::gitignore_violation("work copy diverged");
        assert_eq!(violation.severity(), ErrorSeverity::Low);
        assert!(violation.is_recoverable());
        assert_eq!(violation.exit_code(), 1);

        assert_eq!(Error::Cancelled.severity(), ErrorSeverity::Low);
        assert!(!Error::Cancelled.is_recoverable());
    }

    #[test]
    fn test_error_exit_codes() {
        let lock = Error::lock_timeout("production", None, "/tmp/lock");
        assert_eq!(lock.exit_code(), 2);

        let config = Error::config("missing PRODUCTION_DIR");
        assert_eq!(config.exit_code(), 5);
        assert!(!config.is_recoverable());
    }

    #[test]
    fn test_error_severity() {
        let io_error = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "test"));
        assert_eq!(io_error.severity(), ErrorSeverity::Medium);

        let fatal = Error::permission_fatal("failed to restore egid");
        assert_eq!(fatal.severity(), ErrorSeverity::Critical);
    }
}
