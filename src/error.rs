//! Error types shared by the sync core.
//!
//! `StorageNotFound`, `PushConflict` and `StorageInsideRepository` only fail
//! the storage they refer to;
//! the engine collects them per target. Everything else aborts the operation.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Unified error type for the sync core.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Alias is neither linked to the repository nor known to the global registry
    #[error("Storage '{alias}' wasn't found (not linked to this repository nor registered globally)")]
    StorageNotFound { alias: String },

    /// Storage already holds a version at least as new as the one being pushed
    #[error(
        "Detected newer version v{remote} in storage '{storage}' (local is v{local}). \
         Save your changes and pull before pushing"
    )]
    PushConflict {
        storage: String,
        local: u64,
        remote: u64,
    },

    /// Storage directory lies inside the repository tree it would receive
    #[error("Storage '{alias}' at {} is inside the repository", .path.display())]
    StorageInsideRepository { alias: String, path: PathBuf },

    /// Archive cannot be read or lacks the metadata entry
    #[error("Corrupt archive {}: {reason}", .path.display())]
    ArchiveCorrupt { path: PathBuf, reason: String },

    /// Named entry is absent from an otherwise readable archive
    #[error("Entry '{entry}' not found in archive {}", .archive.display())]
    EntryNotFound { archive: PathBuf, entry: String },

    /// Storage has no snapshot of the requested repository (clone only)
    #[error("No snapshot of '{repo}' in storage {}", .storage.display())]
    SnapshotNotFound { storage: PathBuf, repo: String },

    /// Filesystem access failure
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config document exists but cannot be used
    #[error("Invalid config document {}: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },
}

impl SyncError {
    /// Build an `Io` error tagged with the path being accessed.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Build an `ArchiveCorrupt` error from any displayable cause.
    pub fn corrupt(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        Self::ArchiveCorrupt {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error only affects a single target of a multi-storage call.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::StorageNotFound { .. }
                | Self::PushConflict { .. }
                | Self::StorageInsideRepository { .. }
        )
    }
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Attach a path to `std::io::Result` values.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| SyncError::io(path, e))
    }
}
