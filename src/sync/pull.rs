//! Pull - replace the local tree with a newer snapshot from storage.

use super::{SyncEngine, Target, TargetOutcome};
use crate::archive::{self, ARCHIVE_EXTENSION};
use crate::config::{document_path, load_document, DocumentKind, RepoConfig};
use crate::error::{IoResultExt, Result, SyncError};
use crate::repository::Repository;
use crate::storage::ExternalStorage;
use chrono::Local;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Options for pull operations.
#[derive(Debug, Clone, Default)]
pub struct PullOptions {
    /// Pack the local tree here before it is replaced
    pub backup_dir: Option<PathBuf>,
}

/// What a pull did with one storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullAction {
    /// Nothing newer than the local version (`remote` is `None` when the
    /// storage has no snapshot of this repository)
    UpToDate { local: u64, remote: Option<u64> },
    /// Local tree replaced by the snapshot
    Updated {
        from: u64,
        to: u64,
        snapshot: PathBuf,
        backup: Option<PathBuf>,
    },
}

/// Result of a pull call.
#[derive(Debug)]
pub struct PullResult {
    /// Local version after the call
    pub version: u64,
    pub targets: Vec<TargetOutcome<PullAction>>,
}

impl PullResult {
    /// Whether any storage replaced the local tree.
    pub fn has_changes(&self) -> bool {
        self.targets
            .iter()
            .any(|t| matches!(t.result, Ok(PullAction::Updated { .. })))
    }

    pub fn is_success(&self) -> bool {
        self.targets.iter().all(|t| t.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &TargetOutcome<PullAction>> {
        self.targets.iter().filter(|t| t.result.is_err())
    }
}

impl SyncEngine<'_> {
    /// Pull from `target`, storage by storage.
    ///
    /// Each storage is compared with the local version as it stands when
    /// that storage is reached, so with several newer storages the last one
    /// processed wins.
    pub fn pull(
        &self,
        repo: &mut Repository,
        target: &Target,
        options: &PullOptions,
    ) -> Result<PullResult> {
        if let Some(dir) = &options.backup_dir {
            check_backup_dir(repo, dir)?;
        }

        let mut targets = Vec::new();
        for alias in self.aliases(repo, target) {
            let path = match repo.resolve_storage(&alias, self.registry()) {
                Ok(path) => path,
                Err(e) => {
                    warn!("[pull] {}", e);
                    targets.push(TargetOutcome {
                        alias,
                        result: Err(e),
                    });
                    continue;
                }
            };

            let action = match pull_from(repo, &alias, &path, options) {
                Ok(action) => action,
                Err(e) if e.is_recoverable() => {
                    warn!("[pull] {}", e);
                    targets.push(TargetOutcome {
                        alias,
                        result: Err(e),
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };
            if let PullAction::Updated { from, to, .. } = &action {
                info!("[pull] Updated {} v{} -> v{} from '{}'", repo.name(), from, to, alias);
            }
            targets.push(TargetOutcome {
                alias,
                result: Ok(action),
            });
        }

        Ok(PullResult {
            version: repo.version(),
            targets,
        })
    }
}

fn pull_from(
    repo: &mut Repository,
    alias: &str,
    storage_path: &Path,
    options: &PullOptions,
) -> Result<PullAction> {
    repo.ensure_outside(alias, storage_path)?;
    let storage = ExternalStorage::open(storage_path)?;
    let local = repo.version();

    let Some((snapshot, remote)) = storage.latest_with_version(&repo.name())? else {
        return Ok(PullAction::UpToDate {
            local,
            remote: None,
        });
    };
    if remote <= local {
        return Ok(PullAction::UpToDate {
            local,
            remote: Some(remote),
        });
    }

    let backup = match &options.backup_dir {
        Some(dir) => Some(backup_tree(repo, dir)?),
        None => None,
    };

    replace_tree(repo.root(), &snapshot.path)?;

    let pulled = match load_document::<RepoConfig>(&document_path(repo.root()), DocumentKind::Repo) {
        Ok(pulled) => pulled,
        Err(e) => {
            warn!("[pull] Keeping local settings, snapshot document unusable: {}", e);
            repo.config().clone()
        }
    };
    repo.adopt(pulled, remote)?;

    Ok(PullAction::Updated {
        from: local,
        to: remote,
        snapshot: snapshot.path,
        backup,
    })
}

/// Remove the tree, recreate it empty and unpack the snapshot into it.
fn replace_tree(root: &Path, snapshot: &Path) -> Result<()> {
    fs::remove_dir_all(root).at(root)?;
    fs::create_dir_all(root).at(root)?;
    archive::unpack(snapshot, root)
}

/// Backups must survive the tree replacement.
fn check_backup_dir(repo: &Repository, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).at(dir)?;
    let dir = fs::canonicalize(dir).at(dir)?;
    if dir.starts_with(repo.root()) {
        return Err(SyncError::io(
            &dir,
            io::Error::other("backup directory must be outside the repository"),
        ));
    }
    Ok(())
}

/// Pack the current tree as `<name>_v<version>_<timestamp>.ziprepo`.
fn backup_tree(repo: &Repository, dir: &Path) -> Result<PathBuf> {
    let file_name = format!(
        "{}_v{}_{}.{}",
        repo.name(),
        repo.version(),
        Local::now().format("%Y%m%d%H%M%S"),
        ARCHIVE_EXTENSION
    );
    let metadata = repo.metadata_bytes()?;
    let backup = archive::pack(repo.root(), repo.exclude(), dir, &file_name, &metadata)?;
    info!("[pull] Saved pre-pull state to {:?}", backup);
    Ok(backup)
}
