//! Exclusion rules applied while packing a repository.
//!
//! Patterns use gitignore-flavoured shell globs relative to the repository
//! root: a pattern without a slash matches any path segment (`*.log`,
//! `target`), a pattern with a slash is anchored at the root (`docs/*.pdf`),
//! and a trailing slash restricts it to directories (`.git/`).
//!
//! These are gitignore rules, not plain shell globs: `*` never crosses a `/`
//! (use `**` for that), a leading `!` re-includes what an earlier pattern
//! excluded, and a leading `#` makes the line a comment. Write `\#` or `\!`
//! to match those characters literally.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;
use tracing::{debug, warn};

/// Version-control metadata directories that are never packed.
pub const ALWAYS_EXCLUDED: &[&str] = &[".git/", ".hg/", ".svn/"];

/// Compiled exclusion rules for one repository.
pub struct PathFilter {
    matcher: Gitignore,
    archive_name: Option<String>,
}

impl PathFilter {
    /// Build a filter from the repository's configured patterns plus [`ALWAYS_EXCLUDED`].
    ///
    /// Invalid patterns are skipped with a warning rather than failing the pack.
    pub fn new(root: &Path, patterns: &[String]) -> Self {
        let mut builder = GitignoreBuilder::new(root);
        let all = ALWAYS_EXCLUDED
            .iter()
            .copied()
            .chain(patterns.iter().map(String::as_str));

        for pattern in all {
            if pattern.starts_with('#') {
                warn!("[filter] Pattern {:?} is a comment and excludes nothing", pattern);
            } else if pattern.starts_with('!') {
                debug!("[filter] Pattern {:?} re-includes matching paths", pattern);
            }
            if let Err(e) = builder.add_line(None, pattern) {
                warn!("[filter] Ignoring invalid pattern {:?}: {}", pattern, e);
            }
        }

        let matcher = builder.build().unwrap_or_else(|e| {
            warn!("[filter] Cannot compile exclusion rules: {}", e);
            Gitignore::empty()
        });

        Self {
            matcher,
            archive_name: None,
        }
    }

    /// Also exclude every file named like the archive being written.
    pub fn with_archive_name(mut self, name: impl Into<String>) -> Self {
        self.archive_name = Some(name.into());
        self
    }

    /// Whether the entry itself matches a rule, without looking at its parents.
    ///
    /// This is what the walker asks at every level; an excluded directory is
    /// never descended into, so its children are never asked about.
    pub fn matches_entry(&self, relative: &Path, is_dir: bool) -> bool {
        if !is_dir && self.is_archive_name(relative) {
            return true;
        }
        self.matcher.matched(relative, is_dir).is_ignore()
    }

    /// Whether `relative` must be left out of an archive, including because
    /// one of its parent directories is excluded.
    pub fn should_exclude(&self, relative: &Path, is_dir: bool) -> bool {
        if relative.as_os_str().is_empty() || relative.has_root() {
            return false;
        }
        if !is_dir && self.is_archive_name(relative) {
            return true;
        }
        self.matcher
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
    }

    fn is_archive_name(&self, relative: &Path) -> bool {
        match (&self.archive_name, relative.file_name()) {
            (Some(archive), Some(name)) => name == archive.as_str(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(patterns: &[&str]) -> PathFilter {
        let patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        PathFilter::new(Path::new("/repo"), &patterns)
    }

    #[test]
    fn test_vcs_dirs_always_excluded() {
        let f = filter(&[]);
        assert!(f.should_exclude(Path::new(".git"), true));
        assert!(f.should_exclude(Path::new(".git/objects/abc"), false));
        assert!(f.should_exclude(Path::new("vendor/lib/.hg"), true));
        assert!(!f.should_exclude(Path::new("README.md"), false));
        // a plain file called .git is not a VCS directory
        assert!(!f.should_exclude(Path::new(".git"), false));
    }

    #[test]
    fn test_bare_name_matches_any_segment() {
        let f = filter(&["target", "*.log"]);
        assert!(f.should_exclude(Path::new("target"), true));
        assert!(f.should_exclude(Path::new("crates/core/target"), true));
        assert!(f.should_exclude(Path::new("crates/core/target/debug/app"), false));
        assert!(f.should_exclude(Path::new("logs/today.log"), false));
        assert!(!f.should_exclude(Path::new("src/target.rs"), false));
    }

    #[test]
    fn test_anchored_and_class_patterns() {
        let f = filter(&["docs/*.pdf", "tmp?", "build[0-9]"]);
        assert!(f.should_exclude(Path::new("docs/manual.pdf"), false));
        assert!(!f.should_exclude(Path::new("other/docs/manual.pdf"), false));
        assert!(f.should_exclude(Path::new("tmp1"), true));
        assert!(f.should_exclude(Path::new("build7/out.bin"), false));
        assert!(!f.should_exclude(Path::new("buildx/out.bin"), false));
    }

    #[test]
    fn test_gitignore_specific_rules() {
        let f = filter(&["docs/*.pdf", "*.log", "!keep.log", "#notes", "\\#draft"]);
        // `*` stays within one segment
        assert!(!f.should_exclude(Path::new("docs/old/manual.pdf"), false));
        assert!(f.should_exclude(Path::new("debug.log"), false));
        assert!(!f.should_exclude(Path::new("keep.log"), false));
        assert!(!f.should_exclude(Path::new("#notes"), false));
        assert!(f.should_exclude(Path::new("#draft"), false));
    }

    #[test]
    fn test_matches_entry_ignores_parents() {
        let f = filter(&["cache"]);
        assert!(f.matches_entry(Path::new("cache"), true));
        assert!(!f.matches_entry(Path::new("cache/data.bin"), false));
        assert!(f.should_exclude(Path::new("cache/data.bin"), false));
    }

    #[test]
    fn test_archive_name_excluded_anywhere() {
        let f = filter(&[]).with_archive_name("repo_v3.ziprepo");
        assert!(f.should_exclude(Path::new("repo_v3.ziprepo"), false));
        assert!(f.matches_entry(Path::new("nested/repo_v3.ziprepo"), false));
        assert!(!f.should_exclude(Path::new("repo_v2.ziprepo"), false));
    }
}
