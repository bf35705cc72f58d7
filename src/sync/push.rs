//! Push - publish a new version of the repository to one or more storages.

use super::{SyncEngine, Target, TargetOutcome};
use crate::archive;
use crate::error::{Result, SyncError};
use crate::repository::Repository;
use crate::storage::ExternalStorage;
use crate::version_store::SnapshotName;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of a push call.
#[derive(Debug)]
pub struct PushResult {
    /// Version published by this call, `None` if no target could be resolved
    pub version: Option<u64>,
    /// Per storage: the stored snapshot path, or why it was skipped
    pub targets: Vec<TargetOutcome<PathBuf>>,
}

impl PushResult {
    /// True when every addressed storage received the snapshot.
    pub fn is_success(&self) -> bool {
        self.targets.iter().all(|t| t.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &TargetOutcome<PathBuf>> {
        self.targets.iter().filter(|t| t.result.is_err())
    }
}

impl SyncEngine<'_> {
    /// Publish the repository to `target`.
    ///
    /// The version is bumped once for the whole call, as soon as at least one
    /// storage resolves, and is not reverted when a storage rejects it.
    pub fn push(&self, repo: &mut Repository, target: &Target) -> Result<PushResult> {
        let resolved: Vec<(String, Result<PathBuf>)> = self
            .aliases(repo, target)
            .into_iter()
            .map(|alias| {
                let path = repo.resolve_storage(&alias, self.registry());
                (alias, path)
            })
            .collect();

        let mut targets = Vec::with_capacity(resolved.len());
        if !resolved.iter().any(|(_, path)| path.is_ok()) {
            for (alias, path) in resolved {
                if let Err(e) = &path {
                    warn!("[push] {}", e);
                }
                targets.push(TargetOutcome {
                    alias,
                    result: path,
                });
            }
            return Ok(PushResult {
                version: None,
                targets,
            });
        }

        let version = repo.publish_version()?;
        info!("[push] Publishing {} v{}", repo.name(), version);

        for (alias, path) in resolved {
            let result = match path {
                Ok(path) => push_to(repo, &alias, &path, version),
                Err(e) => Err(e),
            };
            match result {
                Err(e) if !e.is_recoverable() => return Err(e),
                Err(e) => {
                    warn!("[push] {}", e);
                    targets.push(TargetOutcome {
                        alias,
                        result: Err(e),
                    });
                }
                Ok(stored) => {
                    info!("[push] Stored v{} in '{}' ({:?})", version, alias, stored);
                    targets.push(TargetOutcome {
                        alias,
                        result: Ok(stored),
                    });
                }
            }
        }

        Ok(PushResult {
            version: Some(version),
            targets,
        })
    }
}

/// Pack and move one snapshot into one storage, unless it already holds
/// this version or a newer one.
fn push_to(repo: &Repository, alias: &str, storage_path: &Path, version: u64) -> Result<PathBuf> {
    repo.ensure_outside(alias, storage_path)?;
    let storage = ExternalStorage::open(storage_path)?;
    let name = repo.name();

    if let Some((_, remote)) = storage.latest_with_version(&name)? {
        if remote >= version {
            return Err(SyncError::PushConflict {
                storage: alias.to_string(),
                local: version,
                remote,
            });
        }
    }

    let metadata = repo.metadata_bytes()?;
    let archive = archive::pack(
        repo.root(),
        repo.exclude(),
        repo.root(),
        &SnapshotName::file_name(&name, version),
        &metadata,
    )?;
    storage.receive(&archive).inspect_err(|_| {
        let _ = std::fs::remove_file(&archive);
    })
}
