//! Config documents - `ziprepo.json` for repositories, storages and the global registry.
//!
//! Every document is a JSON object carrying a `type` marker. A single
//! load/save pair handles all of them; the marker and the defaults come from
//! [`DocumentKind`] and the `serde(default)` attributes of each document struct.

use crate::error::{IoResultExt, Result, SyncError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of every config document, and of the metadata entry inside snapshots.
pub const CONFIG_FILE_NAME: &str = "ziprepo.json";

/// Which kind of document a `ziprepo.json` holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Repo,
    Storage,
    Global,
}

impl DocumentKind {
    /// Value of the `type` key.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Repo => "repo",
            Self::Storage => "storage",
            Self::Global => "global",
        }
    }
}

/// Path of the document living in `dir`.
pub fn document_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE_NAME)
}

/// Load a document, filling every missing key with its default.
///
/// A missing file yields the all-defaults document. A file whose `type`
/// differs from `kind` is rejected.
pub fn load_document<T: DeserializeOwned>(path: &Path, kind: DocumentKind) -> Result<T> {
    let mut object = if path.exists() {
        let content = fs::read_to_string(path).at(path)?;
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(object)) => object,
            Ok(_) => {
                return Err(SyncError::Config {
                    path: path.to_path_buf(),
                    reason: "document is not a JSON object".to_string(),
                })
            }
            Err(e) => {
                return Err(SyncError::Config {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        }
    } else {
        Map::new()
    };

    if let Some(found) = object.remove("type") {
        if found.as_str() != Some(kind.tag()) {
            return Err(SyncError::Config {
                path: path.to_path_buf(),
                reason: format!("expected type \"{}\", found {}", kind.tag(), found),
            });
        }
    }

    serde_json::from_value(Value::Object(object)).map_err(|e| SyncError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Serialize a document with its `type` marker.
pub fn to_document_bytes<T: Serialize>(doc: &T, kind: DocumentKind) -> Result<Vec<u8>> {
    let mut object = match serde_json::to_value(doc) {
        Ok(Value::Object(object)) => object,
        Ok(_) => Map::new(),
        Err(e) => {
            return Err(SyncError::Config {
                path: PathBuf::from(CONFIG_FILE_NAME),
                reason: e.to_string(),
            })
        }
    };
    object.insert("type".to_string(), Value::from(kind.tag()));

    serde_json::to_vec_pretty(&object).map_err(|e| SyncError::Config {
        path: PathBuf::from(CONFIG_FILE_NAME),
        reason: e.to_string(),
    })
}

/// Write a document to `path`, creating parent directories as needed.
pub fn save_document<T: Serialize>(path: &Path, kind: DocumentKind, doc: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).at(parent)?;
    }
    let bytes = to_document_bytes(doc, kind)?;
    fs::write(path, bytes).at(path)
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Repository document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Assigned once on first initialization
    #[serde(default = "new_id")]
    pub id: String,

    /// Published version counter
    #[serde(default)]
    pub version: u64,

    /// Storage links, alias -> directory
    #[serde(default)]
    pub storages: BTreeMap<String, PathBuf>,

    /// Extra exclusion globs on top of the always-excluded VCS directories
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Keys this crate doesn't know about, kept on save
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            id: new_id(),
            version: 0,
            storages: BTreeMap::new(),
            exclude: Vec::new(),
            extra: Map::new(),
        }
    }
}

/// Storage document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "new_id")]
    pub id: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            id: new_id(),
            extra: Map::new(),
        }
    }
}

/// Read only the `version` of a repository document, tolerating anything else.
///
/// Used on metadata embedded in snapshots: an unparsable document or a
/// missing field means version 0.
pub fn version_of(bytes: &[u8]) -> u64 {
    serde_json::from_slice::<Value>(bytes)
        .ok()
        .and_then(|doc| doc.get("version").and_then(Value::as_u64))
        .unwrap_or(0)
}

/// Get default config directory (~/.config/ziprepo/).
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("ziprepo"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get default path of the global alias registry.
pub fn default_global_path() -> PathBuf {
    default_config_dir().join(CONFIG_FILE_NAME)
}
