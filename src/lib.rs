//! ZipRepo Core Library
//!
//! Versioned zip snapshots of a local directory, exchanged with plain
//! directories acting as replicas ("storages").
//! Provides the following capabilities:
//! - Pack a repository into `<name>_v<version>.ziprepo`, honoring exclusion globs
//! - Find the newest snapshot of a repository in a storage
//! - Push with a staleness guard, pull with optional backup of the local tree
//! - Clone a repository from a storage
//!
//! Every version is a full snapshot: there is no merging and no diffing.

pub mod archive;
pub mod config;
pub mod error;
pub mod filter;
pub mod registry;
pub mod repository;
pub mod storage;
pub mod sync;
pub mod version_store;

// Re-export main types
pub use config::{RepoConfig, StorageConfig, CONFIG_FILE_NAME};
pub use error::{Result, SyncError};
pub use filter::PathFilter;
pub use registry::AliasRegistry;
pub use repository::Repository;
pub use storage::ExternalStorage;
pub use sync::{
    clone_repository, PullAction, PullOptions, PullResult, PushResult, SyncEngine, Target,
    TargetOutcome,
};
pub use version_store::{extract_version, find_latest, Snapshot, SnapshotName};
