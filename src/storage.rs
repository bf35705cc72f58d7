//! External storage - a flat directory of snapshots shared by many repositories.

use crate::config::{document_path, load_document, save_document, DocumentKind, StorageConfig};
use crate::error::{IoResultExt, Result, SyncError};
use crate::version_store::{self, Snapshot};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A storage directory and its document.
#[derive(Debug, Clone)]
pub struct ExternalStorage {
    root: PathBuf,
    config: StorageConfig,
}

impl ExternalStorage {
    /// Create the directory if needed and make sure it has a storage document.
    pub fn init(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).at(root)?;
        Self::open(root)
    }

    /// Open an existing directory as a storage, writing its document on first use.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = fs::canonicalize(root.as_ref()).at(root.as_ref())?;
        if !root.is_dir() {
            return Err(SyncError::io(
                &root,
                io::Error::other("storage is not a directory"),
            ));
        }

        let path = document_path(&root);
        let existed = path.exists();
        let config: StorageConfig = load_document(&path, DocumentKind::Storage)?;
        if !existed {
            save_document(&path, DocumentKind::Storage, &config)?;
            info!("[storage] Initialized storage {} in {:?}", config.id, root);
        }

        Ok(Self { root, config })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Directory name, used as an alias when nothing better is known.
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "storage".to_string())
    }

    /// Newest snapshot of a repository by filename.
    pub fn find_latest(&self, repo_name: &str) -> Result<Option<Snapshot>> {
        version_store::find_latest(&self.root, repo_name)
    }

    /// Newest snapshot of a repository with its embedded version.
    pub fn latest_with_version(&self, repo_name: &str) -> Result<Option<(Snapshot, u64)>> {
        version_store::latest_with_version(&self.root, repo_name)
    }

    /// All snapshots stored here.
    pub fn snapshots(&self) -> Result<Vec<Snapshot>> {
        version_store::list_snapshots(&self.root)
    }

    /// Move an archive into the storage, keeping its file name.
    pub fn receive(&self, archive: &Path) -> Result<PathBuf> {
        let file_name = archive.file_name().ok_or_else(|| {
            SyncError::io(archive, io::Error::other("archive path has no file name"))
        })?;
        let target = self.root.join(file_name);
        move_file(archive, &target)?;
        debug!("[storage] Stored {:?}", target);
        Ok(target)
    }
}

/// Rename, or copy + remove when the rename crosses filesystems.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).at(to)?;
    fs::remove_file(from).at(from)
}
