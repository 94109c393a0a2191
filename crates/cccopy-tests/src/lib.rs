//! End-to-end test suite for CCCopy
//!
//! Provides the two-tree project fixture shared by the integration tests:
//! a temporary Production tree, a Work tree and a ready-made
//! [`cccopy_sync::SyncEngine`] over them, driving a real `git` binary.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fixture;

pub use fixture::TestProject;
