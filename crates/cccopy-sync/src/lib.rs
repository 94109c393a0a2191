//! Synchronization core for CCCopy
//!
//! This crate composes the pieces that keep a per-user Work tree and a
//! shared Production tree coordinated on a plain filesystem:
//!
//! - **Lock manager**: NFS-safe directory locks with stale reclamation
//! - **Privilege scope**: audited effective-group elevation for Production writes
//! - **Pattern matcher**: source/exclude glob membership
//! - **Classifier**: the six-way file-state decision table over the
//!   sync-base tag
//! - **Caches**: TTL state and tracked-files caches
//! - **Engine**: the Download / Upload / Save pipeline
//!
//! # Examples
//!
//! ```rust,no_run
//! use cccopy_config::ProjectConfig;
//! use cccopy_sync::SyncEngine;
//!
//! # async fn example() -> cccopy_types::Result<()> {
//! let config = ProjectConfig::load("project/alpha.ini")
//!     .map_err(cccopy_types::Error::from)?;
//! let engine = SyncEngine::new(config);
//! let outcome = engine.download().await?;
//! println!("updated {} files", outcome.stats.updated);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod backup;
pub mod cache;
pub mod classify;
pub mod engine;
pub mod lock;
pub mod pattern;
pub mod privilege;
pub mod tag;

pub use backup::create_backup;
pub use cache::{StateCache, TrackedFilesCache, STATE_TTL, TRACKED_TTL};
pub use classify::{classify, Classifier};
pub use engine::{
    DownloadOutcome, SaveOutcome, SyncEngine, UploadOutcome, MSG_SALVAGE_DIRECT_EDITS,
    MSG_SYNC_NEW_FILES, PRODUCTION_LOCK, PRODUCTION_USER_EMAIL, PRODUCTION_USER_NAME,
};
pub use lock::{with_lock, LockGuard, LockOwner, STALE_THRESHOLD};
pub use pattern::PatternSet;
pub use privilege::{PrivilegeGuard, PrivilegeScope};
pub use tag::ProductionTag;
