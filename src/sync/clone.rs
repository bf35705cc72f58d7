//! Clone - materialize a repository from the newest snapshot in a storage.

use crate::archive;
use crate::error::{IoResultExt, Result, SyncError};
use crate::registry::AliasRegistry;
use crate::repository::Repository;
use crate::storage::ExternalStorage;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// Clone `repo_name` from `source` into `parent_dir/repo_name`.
///
/// `source` is a global alias or a storage directory. The new repository
/// keeps the snapshot's id and version and is linked to the source storage,
/// under the alias or, for a plain directory, under the directory name.
pub fn clone_repository(
    registry: &AliasRegistry,
    source: &str,
    repo_name: &str,
    parent_dir: &Path,
) -> Result<Repository> {
    let (alias, storage_path) = match registry.resolve(source) {
        Some(path) => (Some(source.to_string()), path.to_path_buf()),
        None if Path::new(source).is_dir() => (None, PathBuf::from(source)),
        None => {
            return Err(SyncError::StorageNotFound {
                alias: source.to_string(),
            })
        }
    };

    let storage = ExternalStorage::open(&storage_path)?;
    let Some((snapshot, version)) = storage.latest_with_version(repo_name)? else {
        return Err(SyncError::SnapshotNotFound {
            storage: storage.path().to_path_buf(),
            repo: repo_name.to_string(),
        });
    };

    let destination = parent_dir.join(repo_name);
    if destination.exists() && fs::read_dir(&destination).at(&destination)?.next().is_some() {
        return Err(SyncError::io(
            &destination,
            io::Error::new(io::ErrorKind::AlreadyExists, "destination is not empty"),
        ));
    }
    archive::unpack(&snapshot.path, &destination)?;

    let mut repo = Repository::init(&destination)?;
    repo.clear_links();
    let alias = alias.unwrap_or_else(|| storage.name());
    repo.link_storage(&alias, storage.path())?;

    info!(
        "[clone] Cloned {} v{} from {:?} into {:?}",
        repo_name,
        version,
        storage.path(),
        repo.root()
    );
    Ok(repo)
}
