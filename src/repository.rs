//! Repository - a tracked local directory and its `ziprepo.json`.

use crate::config::{
    document_path, load_document, save_document, to_document_bytes, DocumentKind, RepoConfig,
};
use crate::error::{IoResultExt, Result, SyncError};
use crate::registry::AliasRegistry;
use crate::storage::ExternalStorage;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// A tracked directory. Owns its config document; every mutation is persisted.
#[derive(Debug, Clone)]
pub struct Repository {
    root: PathBuf,
    config: RepoConfig,
}

impl Repository {
    /// Initialize `root` as a repository, or load it if it already is one.
    ///
    /// Missing keys are filled with defaults and the document is written
    /// immediately, so the id is fixed from the first call on.
    pub fn init(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).at(root)?;
        let root = fs::canonicalize(root).at(root)?;

        let path = document_path(&root);
        let existed = path.exists();
        let config: RepoConfig = load_document(&path, DocumentKind::Repo)?;
        let repo = Self { root, config };
        repo.save()?;

        if !existed {
            info!(
                "[repo] Initialized repository {} ({}) in {:?}",
                repo.name(),
                repo.id(),
                repo.root
            );
        }
        Ok(repo)
    }

    /// Open a directory that already holds a repository document.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = fs::canonicalize(root.as_ref()).at(root.as_ref())?;
        let path = document_path(&root);
        if !path.is_file() {
            return Err(SyncError::Config {
                path,
                reason: "not a ziprepo repository (run `ziprepo init`)".to_string(),
            });
        }
        let config = load_document(&path, DocumentKind::Repo)?;
        Ok(Self { root, config })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final path segment of the root.
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "repository".to_string())
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn version(&self) -> u64 {
        self.config.version
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    /// Configured exclusion patterns (without the always-excluded ones).
    pub fn exclude(&self) -> &[String] {
        &self.config.exclude
    }

    /// Persist the document at the root.
    pub fn save(&self) -> Result<()> {
        save_document(&document_path(&self.root), DocumentKind::Repo, &self.config)
    }

    /// The document as it is embedded into snapshots.
    pub fn metadata_bytes(&self) -> Result<Vec<u8>> {
        to_document_bytes(&self.config, DocumentKind::Repo)
    }

    /// Bump the version counter and persist it. Returns the new version.
    pub fn publish_version(&mut self) -> Result<u64> {
        self.config.version += 1;
        self.save()?;
        Ok(self.config.version)
    }

    /// Take over a pulled snapshot's document.
    ///
    /// The version and exclusion rules come from the snapshot; the id and
    /// the storage links stay those of this checkout.
    pub(crate) fn adopt(&mut self, pulled: RepoConfig, version: u64) -> Result<()> {
        let RepoConfig { exclude, extra, .. } = pulled;
        self.config.version = version;
        self.config.exclude = exclude;
        self.config.extra = extra;
        self.save()
    }

    /// Drop every storage link without saving; used when a cloned document
    /// carries links from another host.
    pub(crate) fn clear_links(&mut self) {
        self.config.storages.clear();
    }

    /// Link a storage directory under `alias`, initializing it if needed.
    ///
    /// The storage must lie outside the repository: a pull wipes the tree.
    pub fn link_storage(&mut self, alias: &str, path: impl AsRef<Path>) -> Result<ExternalStorage> {
        let path = path.as_ref();
        let resolved = resolve_nearest(path).at(path)?;
        self.ensure_outside(alias, &resolved)?;

        let storage = ExternalStorage::init(path)?;
        self.config
            .storages
            .insert(alias.to_string(), storage.path().to_path_buf());
        self.save()?;
        info!("[repo] Linked storage '{}' -> {:?}", alias, storage.path());
        Ok(storage)
    }

    /// Refuse a storage directory located inside this repository's tree.
    pub(crate) fn ensure_outside(&self, alias: &str, storage_path: &Path) -> Result<()> {
        let resolved = resolve_nearest(storage_path).at(storage_path)?;
        if resolved.starts_with(&self.root) {
            return Err(SyncError::StorageInsideRepository {
                alias: alias.to_string(),
                path: resolved,
            });
        }
        Ok(())
    }

    /// Remove a storage link. Returns the path it pointed to.
    pub fn unlink_storage(&mut self, alias: &str) -> Result<Option<PathBuf>> {
        let removed = self.config.storages.remove(alias);
        if removed.is_some() {
            self.save()?;
        }
        Ok(removed)
    }

    /// Aliases linked to this repository, in alias order.
    pub fn linked_aliases(&self) -> impl Iterator<Item = &str> {
        self.config.storages.keys().map(String::as_str)
    }

    /// Resolve an alias locally first, then through the global registry.
    pub fn resolve_storage(&self, alias: &str, registry: &AliasRegistry) -> Result<PathBuf> {
        self.config
            .storages
            .get(alias)
            .cloned()
            .or_else(|| registry.resolve(alias).map(Path::to_path_buf))
            .ok_or_else(|| SyncError::StorageNotFound {
                alias: alias.to_string(),
            })
    }
}

/// Canonical form of `path`, even when its last components do not exist yet.
fn resolve_nearest(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = fs::canonicalize(existing)?;
    resolved.extend(missing.iter().rev());
    Ok(resolved)
}
