//! Snapshot archives - pack a repository tree into a zip file and back.
//!
//! Layout of a snapshot:
//! - `ziprepo.json`: repository document at pack time (always the first entry)
//! - every kept directory as an explicit entry, so empty ones survive
//! - every kept file, deflated at level 9

use crate::config::CONFIG_FILE_NAME;
use crate::error::{IoResultExt, Result, SyncError};
use crate::filter::PathFilter;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Extension of snapshot archives.
pub const ARCHIVE_EXTENSION: &str = "ziprepo";

/// Fixed Deflate level used for every entry.
const COMPRESSION_LEVEL: i64 = 9;

fn file_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL))
}

/// Entry name for a root-relative path, always `/`-separated.
///
/// Names that are not valid UTF-8 are refused; a lossy conversion could map
/// two files onto the same entry.
fn entry_name(root: &Path, relative: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            let part = part.to_str().ok_or_else(|| {
                SyncError::io(
                    root.join(relative),
                    io::Error::new(io::ErrorKind::InvalidData, "file name is not valid UTF-8"),
                )
            })?;
            parts.push(part);
        }
    }
    Ok(parts.join("/"))
}

/// Pack `root` into `output_dir/archive_name`.
///
/// `metadata` becomes the `ziprepo.json` entry; the document lying at the
/// root of the tree is not packed a second time. A partially written archive
/// is removed on failure.
pub fn pack(
    root: &Path,
    patterns: &[String],
    output_dir: &Path,
    archive_name: &str,
    metadata: &[u8],
) -> Result<PathBuf> {
    let meta = fs::metadata(root).at(root)?;
    if !meta.is_dir() {
        return Err(SyncError::io(
            root,
            io::Error::other("repository root is not a directory"),
        ));
    }

    fs::create_dir_all(output_dir).at(output_dir)?;
    let archive_path = output_dir.join(archive_name);
    let filter = PathFilter::new(root, patterns).with_archive_name(archive_name);

    match write_archive(root, &filter, &archive_path, metadata) {
        Ok((dirs, files)) => {
            debug!(
                "[archive] Packed {} dirs, {} files into {:?}",
                dirs, files, archive_path
            );
            Ok(archive_path)
        }
        Err(e) => {
            let _ = fs::remove_file(&archive_path);
            Err(e)
        }
    }
}

fn write_archive(
    root: &Path,
    filter: &PathFilter,
    archive_path: &Path,
    metadata: &[u8],
) -> Result<(usize, usize)> {
    let file = File::create(archive_path).at(archive_path)?;
    let mut zip = ZipWriter::new(file);
    let options = file_options();
    let zip_err = |e: ZipError| match e {
        ZipError::Io(e) => SyncError::io(archive_path, e),
        other => SyncError::corrupt(archive_path, other),
    };

    zip.start_file(CONFIG_FILE_NAME, options).map_err(zip_err)?;
    zip.write_all(metadata).at(archive_path)?;

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| match entry.path().strip_prefix(root) {
            Ok(relative) => !filter.matches_entry(relative, entry.file_type().is_dir()),
            Err(_) => false,
        });

    let (mut dirs, mut files) = (0, 0);
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            SyncError::io(path, e.into())
        })?;
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let name = entry_name(root, relative)?;
        let file_type = entry.file_type();

        if file_type.is_dir() {
            zip.add_directory(name.as_str(), options).map_err(zip_err)?;
            dirs += 1;
        } else if file_type.is_file() || links_to_file(entry.path(), file_type) {
            if entry.depth() == 1 && name == CONFIG_FILE_NAME {
                continue;
            }
            // opening through a symlink stores the target's content
            zip.start_file(name.as_str(), options).map_err(zip_err)?;
            let mut source = File::open(entry.path()).at(entry.path())?;
            io::copy(&mut source, &mut zip).at(entry.path())?;
            files += 1;
        } else if file_type.is_symlink() {
            warn!("[archive] Skipping dangling or directory symlink {:?}", entry.path());
        } else {
            warn!("[archive] Skipping special file {:?}", entry.path());
        }
    }

    zip.finish().map_err(zip_err)?;
    Ok((dirs, files))
}

fn links_to_file(path: &Path, file_type: fs::FileType) -> bool {
    file_type.is_symlink() && fs::metadata(path).is_ok_and(|meta| meta.is_file())
}

fn open_archive(archive_path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(archive_path).at(archive_path)?;
    ZipArchive::new(file).map_err(|e| SyncError::corrupt(archive_path, e))
}

/// Extract every entry of the archive into `destination`.
pub fn unpack(archive_path: &Path, destination: &Path) -> Result<()> {
    let mut archive = open_archive(archive_path)?;
    fs::create_dir_all(destination).at(destination)?;

    archive.extract(destination).map_err(|e| match e {
        ZipError::Io(e) => SyncError::io(destination, e),
        other => SyncError::corrupt(archive_path, other),
    })?;

    debug!(
        "[archive] Unpacked {} entries from {:?} into {:?}",
        archive.len(),
        archive_path,
        destination
    );
    Ok(())
}

/// Read a single entry without extracting the rest of the archive.
pub fn read_entry(archive_path: &Path, entry: &str) -> Result<Vec<u8>> {
    let mut archive = open_archive(archive_path)?;
    let mut file = archive.by_name(entry).map_err(|e| match e {
        ZipError::FileNotFound => SyncError::EntryNotFound {
            archive: archive_path.to_path_buf(),
            entry: entry.to_string(),
        },
        other => SyncError::corrupt(archive_path, other),
    })?;

    let mut content = Vec::new();
    file.read_to_end(&mut content)
        .map_err(|e| SyncError::corrupt(archive_path, e))?;
    Ok(content)
}

/// Names of all entries, in stored order.
pub fn entry_names(archive_path: &Path) -> Result<Vec<String>> {
    let mut archive = open_archive(archive_path)?;
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive
            .by_index_raw(i)
            .map_err(|e| SyncError::corrupt(archive_path, e))?;
        names.push(file.name().to_string());
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_entry_name_uses_forward_slashes() -> Result<()> {
        let root = Path::new("/repo");
        assert_eq!(entry_name(root, Path::new("a/b/c.txt"))?, "a/b/c.txt");
        assert_eq!(entry_name(root, Path::new("./top"))?, "top");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_is_refused() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let relative = Path::new(OsStr::from_bytes(b"bad\xffname.txt"));
        assert!(matches!(
            entry_name(Path::new("/repo"), relative),
            Err(SyncError::Io { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_symlinks_store_target_content() -> Result<()> {
        use std::os::unix::fs::symlink;

        let temp = TempDir::new().unwrap();
        let root = temp.path().join("repo");
        write(&root, "real.txt", "payload");
        symlink(root.join("real.txt"), root.join("link.txt")).unwrap();
        symlink(root.join("gone.txt"), root.join("dangling.txt")).unwrap();

        let archive = pack(&root, &[], temp.path(), "repo_v1.ziprepo", b"{}")?;
        assert_eq!(
            entry_names(&archive)?,
            vec!["ziprepo.json", "link.txt", "real.txt"]
        );

        let dest = temp.path().join("restored");
        unpack(&archive, &dest)?;
        assert_eq!(fs::read_to_string(dest.join("link.txt")).unwrap(), "payload");
        assert!(!dest.join("dangling.txt").exists());
        Ok(())
    }

    #[test]
    fn test_pack_skips_vcs_and_keeps_empty_dirs() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("repo");
        write(&root, ".git/objects/abc", "blob");
        write(&root, "README.md", "hello");
        fs::create_dir_all(root.join("empty")).unwrap();

        let out = temp.path().join("out");
        let archive = pack(&root, &[], &out, "repo_v1.ziprepo", br#"{"version":1}"#)?;

        let names = entry_names(&archive)?;
        assert_eq!(names, vec!["ziprepo.json", "README.md", "empty/"]);
        Ok(())
    }

    #[test]
    fn test_metadata_entry_replaces_root_document() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("repo");
        write(&root, "ziprepo.json", r#"{"version": 1}"#);
        write(&root, "nested/ziprepo.json", "kept");

        let archive = pack(&root, &[], &root, "repo_v2.ziprepo", br#"{"version": 2}"#)?;

        let names = entry_names(&archive)?;
        assert_eq!(
            names.iter().filter(|n| n.as_str() == CONFIG_FILE_NAME).count(),
            1
        );
        assert!(names.contains(&"nested/ziprepo.json".to_string()));
        assert_eq!(read_entry(&archive, CONFIG_FILE_NAME)?, br#"{"version": 2}"#);
        Ok(())
    }

    #[test]
    fn test_pack_excludes_its_own_output() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("repo");
        write(&root, "data.txt", "data");
        // a stale archive with the same name lying in the tree
        write(&root, "repo_v3.ziprepo", "stale");

        let archive = pack(&root, &[], &root, "repo_v3.ziprepo", b"{}")?;
        let names = entry_names(&archive)?;
        assert_eq!(names, vec!["ziprepo.json", "data.txt"]);
        Ok(())
    }

    #[test]
    fn test_unpack_round_trip() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("repo");
        write(&root, "src/main.rs", "fn main() {}");
        write(&root, "target/debug/app", "binary");
        write(&root, "notes/todo.log", "later");
        fs::create_dir_all(root.join("assets/empty")).unwrap();

        let patterns = vec!["target".to_string(), "*.log".to_string()];
        let archive = pack(&root, &patterns, temp.path(), "repo_v1.ziprepo", b"{}")?;

        let dest = temp.path().join("restored");
        unpack(&archive, &dest)?;

        assert_eq!(fs::read_to_string(dest.join("src/main.rs")).unwrap(), "fn main() {}");
        assert!(dest.join("assets/empty").is_dir());
        assert!(dest.join("notes").is_dir());
        assert!(!dest.join("notes/todo.log").exists());
        assert!(!dest.join("target").exists());
        assert!(dest.join(CONFIG_FILE_NAME).is_file());
        Ok(())
    }

    #[test]
    fn test_read_missing_entry() -> Result<()> {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("repo");
        write(&root, "a.txt", "a");
        let archive = pack(&root, &[], temp.path(), "repo_v1.ziprepo", b"{}")?;

        let result = read_entry(&archive, "missing.txt");
        assert!(matches!(result, Err(SyncError::EntryNotFound { .. })));
        Ok(())
    }

    #[test]
    fn test_pack_missing_root_is_io_error() {
        let temp = TempDir::new().unwrap();
        let result = pack(
            &temp.path().join("nope"),
            &[],
            temp.path(),
            "nope_v1.ziprepo",
            b"{}",
        );
        assert!(matches!(result, Err(SyncError::Io { .. })));
    }

    #[test]
    fn test_corrupt_archive() {
        let temp = TempDir::new().unwrap();
        let bogus = temp.path().join("repo_v1.ziprepo");
        fs::write(&bogus, "definitely not a zip").unwrap();

        assert!(matches!(
            read_entry(&bogus, CONFIG_FILE_NAME),
            Err(SyncError::ArchiveCorrupt { .. })
        ));
        assert!(matches!(
            unpack(&bogus, &temp.path().join("dest")),
            Err(SyncError::ArchiveCorrupt { .. })
        ));
    }
}
