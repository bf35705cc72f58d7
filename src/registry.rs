//! Global alias registry - user-wide alias -> storage path mapping.
//!
//! Consulted only when a repository has no link with the requested alias.
//! The registry is an explicit object: callers load it, hand it to the sync
//! engine and save it back after mutating.

use crate::config::{default_global_path, load_document, save_document, DocumentKind};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct GlobalConfig {
    #[serde(default)]
    aliases: BTreeMap<String, PathBuf>,

    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Alias registry bound to the document it was loaded from.
#[derive(Debug, Clone)]
pub struct AliasRegistry {
    path: PathBuf,
    config: GlobalConfig,
}

impl AliasRegistry {
    /// Empty registry that will be saved to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: GlobalConfig::default(),
        }
    }

    /// Load the registry stored at `path` (empty if the file doesn't exist).
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = load_document(&path, DocumentKind::Global)?;
        Ok(Self { path, config })
    }

    /// Load the registry from the per-user default location.
    pub fn load_default() -> Result<Self> {
        Self::load(default_global_path())
    }

    /// Persist the registry.
    pub fn save(&self) -> Result<()> {
        save_document(&self.path, DocumentKind::Global, &self.config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Register (or re-point) an alias.
    pub fn add(&mut self, alias: &str, storage: impl Into<PathBuf>) {
        self.config.aliases.insert(alias.to_string(), storage.into());
    }

    /// Forget an alias, returning its previous path.
    pub fn remove(&mut self, alias: &str) -> Option<PathBuf> {
        self.config.aliases.remove(alias)
    }

    /// Path registered for `alias`.
    pub fn resolve(&self, alias: &str) -> Option<&Path> {
        self.config.aliases.get(alias).map(PathBuf::as_path)
    }

    /// All aliases in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.config
            .aliases
            .iter()
            .map(|(alias, path)| (alias.as_str(), path.as_path()))
    }
}
