//! Version lookup inside a storage directory.
//!
//! Snapshots are named `<repo>_v<version>.ziprepo`. The filename is enough to
//! pick the newest candidate without opening anything; the `ziprepo.json`
//! entry inside the chosen archive is the authoritative version.

use crate::archive::{read_entry, ARCHIVE_EXTENSION};
use crate::config::{version_of, CONFIG_FILE_NAME};
use crate::error::{IoResultExt, Result, SyncError};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

fn snapshot_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // the name group is greedy: the last `_v<digits>` is the version
        Regex::new(&format!(
            r"^(?P<name>.+)_v(?P<version>[0-9]+)\.{}$",
            regex::escape(ARCHIVE_EXTENSION)
        ))
        .expect("snapshot pattern is valid")
    })
}

/// Repository name and version recovered from a snapshot filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotName {
    pub name: String,
    pub version: u64,
}

impl SnapshotName {
    /// Parse `<name>_v<version>.ziprepo`; anything else is `None`.
    pub fn parse(file_name: &str) -> Option<Self> {
        let caps = snapshot_pattern().captures(file_name)?;
        let version = caps["version"].parse().ok()?;
        Some(Self {
            name: caps["name"].to_string(),
            version,
        })
    }

    /// Filename of the snapshot for `name` at `version`.
    pub fn file_name(name: &str, version: u64) -> String {
        format!("{}_v{}.{}", name, version, ARCHIVE_EXTENSION)
    }
}

/// A snapshot file found in a storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub path: PathBuf,
    pub name: String,
    pub version: u64,
}

/// Version recorded in the archive's embedded repository document.
///
/// A document without a usable `version` counts as version 0; an archive
/// without the document at all is corrupt.
pub fn extract_version(archive_path: &Path) -> Result<u64> {
    let bytes = read_entry(archive_path, CONFIG_FILE_NAME).map_err(|e| match e {
        SyncError::EntryNotFound { archive, entry } => SyncError::ArchiveCorrupt {
            path: archive,
            reason: format!("missing metadata entry '{}'", entry),
        },
        other => other,
    })?;
    Ok(version_of(&bytes))
}

/// Every snapshot directly inside `storage_dir`, sorted by name then version.
pub fn list_snapshots(storage_dir: &Path) -> Result<Vec<Snapshot>> {
    let mut snapshots = Vec::new();
    for entry in fs::read_dir(storage_dir).at(storage_dir)? {
        let entry = entry.at(storage_dir)?;
        if !entry.file_type().at(entry.path())?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if let Some(parsed) = SnapshotName::parse(file_name) {
            snapshots.push(Snapshot {
                path: entry.path(),
                name: parsed.name,
                version: parsed.version,
            });
        }
    }

    snapshots.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then(a.version.cmp(&b.version))
            .then(a.path.cmp(&b.path))
    });
    Ok(snapshots)
}

/// Newest snapshot of `repo_name` in `storage_dir`, judged by filename.
///
/// `None` is a normal answer: the storage simply has nothing for this repository.
pub fn find_latest(storage_dir: &Path, repo_name: &str) -> Result<Option<Snapshot>> {
    let latest = list_snapshots(storage_dir)?
        .into_iter()
        .filter(|s| s.name == repo_name)
        .max_by(|a, b| a.version.cmp(&b.version).then(a.path.cmp(&b.path)));

    match &latest {
        Some(snapshot) => debug!(
            "[store] Latest {} in {:?} is v{}",
            repo_name, storage_dir, snapshot.version
        ),
        None => debug!("[store] No snapshot of {} in {:?}", repo_name, storage_dir),
    }
    Ok(latest)
}

/// Newest snapshot together with its embedded version.
///
/// Warns when the filename and the embedded document disagree, which only
/// happens with archives renamed by hand.
pub fn latest_with_version(storage_dir: &Path, repo_name: &str) -> Result<Option<(Snapshot, u64)>> {
    let Some(snapshot) = find_latest(storage_dir, repo_name)? else {
        return Ok(None);
    };
    let version = extract_version(&snapshot.path)?;
    if version != snapshot.version {
        warn!(
            "[store] {:?} is named v{} but contains v{}",
            snapshot.path, snapshot.version, version
        );
    }
    Ok(Some((snapshot, version)))
}
