//! Partial-refresh scheduling for CCCopy
//!
//! Keeps the file-state view responsive by splitting every refresh into a
//! bounded synchronous filesystem scan (rows appear as `Pending`
//! immediately) and background Git-backed classification on a fixed
//! worker pool. Refresh batches carry a monotonically increasing
//! generation id; a newer batch supersedes everything queued before it,
//! and superseded results never reach the display.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cccopy_config::ProjectConfig;
//! use cccopy_engine::{RefreshConfig, RefreshEngine};
//! use cccopy_sync::{StateCache, TrackedFilesCache};
//!
//! # fn example(config: ProjectConfig) -> cccopy_types::Result<()> {
//! let (mut engine, mut updates) = RefreshEngine::new(
//!     config,
//!     RefreshConfig::default(),
//!     Arc::new(StateCache::new()),
//!     Arc::new(TrackedFilesCache::new()),
//! );
//! engine.start();
//! let rows = engine.refresh("src")?;
//! println!("{} rows pending classification", rows.len());
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod engine;
pub mod executor;
pub mod scheduler;
pub mod task;
pub mod watcher;

pub use engine::{RefreshConfig, RefreshEngine};
pub use executor::{RefreshExecutor, DEFAULT_WORKER_COUNT};
pub use scheduler::RefreshScheduler;
pub use task::{RefreshRow, RefreshTask, RefreshUpdate, UpdateResult};
pub use watcher::WATCH_INTERVAL;
