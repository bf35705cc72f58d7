//! Command implementations for the ZipRepo CLI.
//!
//! Main commands:
//! - init / status: set up and inspect the repository
//! - ext: link, unlink, initialize, clone from and list storages
//! - push / pull: exchange snapshots with storages
//! - global storage: user-wide aliases

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use ziprepo::{
    clone_repository, AliasRegistry, ExternalStorage, PullAction, PullOptions, Repository,
    SyncEngine, Target,
};

fn repo_dir(repo: Option<PathBuf>) -> Result<PathBuf> {
    match repo {
        Some(dir) => Ok(dir),
        None => std::env::current_dir().context("Cannot determine current directory"),
    }
}

fn open_repo(repo: Option<PathBuf>) -> Result<Repository> {
    let dir = repo_dir(repo)?;
    Repository::open(&dir).with_context(|| format!("Cannot open repository {}", dir.display()))
}

fn load_registry() -> Result<AliasRegistry> {
    AliasRegistry::load_default().context("Cannot load global settings")
}

/// Initialize (or re-read) the repository document.
pub fn init(repo: Option<PathBuf>) -> Result<()> {
    let dir = repo_dir(repo)?;
    let repo = Repository::init(&dir)
        .with_context(|| format!("Cannot initialize repository in {}", dir.display()))?;

    println!(
        "{} Repository {} at v{}",
        "✓".green(),
        repo.name().bold(),
        repo.version()
    );
    println!("  {}", repo.root().display().to_string().dimmed());
    Ok(())
}

/// Print the repository state.
pub fn status(repo: Option<PathBuf>) -> Result<()> {
    let repo = open_repo(repo)?;
    let registry = load_registry()?;

    println!("{} {}", "Repository".cyan().bold(), repo.name().bold());
    println!("  id:      {}", repo.id().dimmed());
    println!("  version: {}", repo.version().to_string().green());
    println!("  path:    {}", repo.root().display().to_string().dimmed());

    if repo.exclude().is_empty() {
        println!("  exclude: {}", "(none)".dimmed());
    } else {
        println!("  exclude: {}", repo.exclude().join(", "));
    }

    println!();
    println!("{}", "Storages".cyan().bold());
    if repo.config().storages.is_empty() {
        println!("  {}", "No linked storages".dimmed());
    }
    for (alias, path) in &repo.config().storages {
        let latest = ExternalStorage::open(path)
            .and_then(|s| s.find_latest(&repo.name()))
            .map(|found| match found {
                Some(snapshot) => format!("v{}", snapshot.version),
                None => "empty".to_string(),
            })
            .unwrap_or_else(|e| format!("unavailable: {}", e));
        println!(
            "  {} -> {} [{}]",
            alias.bold(),
            path.display().to_string().dimmed(),
            latest
        );
    }

    let globals: Vec<_> = registry.iter().collect();
    if !globals.is_empty() {
        println!();
        println!("{}", "Global aliases".cyan().bold());
        for (alias, path) in globals {
            println!("  {} -> {}", alias.bold(), path.display().to_string().dimmed());
        }
    }
    Ok(())
}

/// Initialize a storage directory.
pub fn ext_init(path: Option<PathBuf>) -> Result<()> {
    let dir = repo_dir(path)?;
    let storage = ExternalStorage::init(&dir)
        .with_context(|| format!("Cannot initialize storage in {}", dir.display()))?;
    println!(
        "{} Storage {} ({})",
        "✓".green(),
        storage.path().display().to_string().bold(),
        storage.id().dimmed()
    );
    Ok(())
}

/// Link a storage to the repository.
pub fn ext_add(repo: Option<PathBuf>, name: &str, path: &Path) -> Result<()> {
    let mut repo = open_repo(repo)?;
    let storage = repo
        .link_storage(name, path)
        .with_context(|| format!("Cannot link storage {}", path.display()))?;
    println!(
        "{} Linked {} -> {}",
        "✓".green(),
        name.bold(),
        storage.path().display().to_string().dimmed()
    );
    Ok(())
}

/// Unlink a storage from the repository.
pub fn ext_remove(repo: Option<PathBuf>, name: &str) -> Result<()> {
    let mut repo = open_repo(repo)?;
    match repo.unlink_storage(name)? {
        Some(path) => println!(
            "{} Unlinked {} ({})",
            "✓".green(),
            name.bold(),
            path.display().to_string().dimmed()
        ),
        None => println!("{}", format!("Storage '{}' is not linked", name).yellow()),
    }
    Ok(())
}

/// Clone a repository from a storage into the current (or `--repo`) directory.
pub fn ext_clone(parent: Option<PathBuf>, source: &str, repo_name: &str) -> Result<()> {
    let parent = repo_dir(parent)?;
    let registry = load_registry()?;
    let repo = clone_repository(&registry, source, repo_name, &parent)
        .with_context(|| format!("Cannot clone '{}' from '{}'", repo_name, source))?;

    println!(
        "{} Cloned {} at v{}",
        "✓".green(),
        repo.name().bold(),
        repo.version()
    );
    println!("  {}", repo.root().display().to_string().dimmed());
    Ok(())
}

/// List the snapshots of a storage given by alias or path.
pub fn ext_list(repo: Option<PathBuf>, storage: &str) -> Result<()> {
    let registry = load_registry()?;
    let local = open_repo(repo)
        .ok()
        .and_then(|r| r.resolve_storage(storage, &registry).ok());
    let path = local
        .or_else(|| registry.resolve(storage).map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from(storage));

    let storage = ExternalStorage::open(&path)
        .with_context(|| format!("Cannot open storage {}", path.display()))?;
    let snapshots = storage.snapshots()?;

    println!(
        "{} {}",
        "Storage".cyan().bold(),
        storage.path().display().to_string().bold()
    );
    if snapshots.is_empty() {
        println!("  {}", "No snapshots".dimmed());
    }
    for snapshot in snapshots {
        let file_name = snapshot
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!(
            "  {} v{}  {}",
            snapshot.name.bold(),
            snapshot.version,
            file_name.dimmed()
        );
    }
    Ok(())
}

/// Publish a new version.
pub fn push(repo: Option<PathBuf>, storage: &str) -> Result<()> {
    let mut repo = open_repo(repo)?;
    let registry = load_registry()?;
    let target = Target::parse(storage);

    if target == Target::All && repo.config().storages.is_empty() {
        println!("{}", "No linked storages, nothing to push".yellow());
        return Ok(());
    }

    let result = SyncEngine::new(&registry)
        .push(&mut repo, &target)
        .context("Push failed")?;

    if let Some(version) = result.version {
        println!("Publishing {} v{}", repo.name().bold(), version);
    }
    for outcome in &result.targets {
        match &outcome.result {
            Ok(path) => println!(
                "  {} {} {}",
                "✓".green(),
                outcome.alias.bold(),
                path.display().to_string().dimmed()
            ),
            Err(e) => eprintln!("  {} {}: {}", "✗".red(), outcome.alias.bold(), e),
        }
    }

    let failed = result.failures().count();
    if failed > 0 {
        bail!("{} of {} storage(s) rejected the push", failed, result.targets.len());
    }
    Ok(())
}

/// Adopt a newer version from storage.
pub fn pull(repo: Option<PathBuf>, storage: &str, backup: Option<PathBuf>) -> Result<()> {
    let mut repo = open_repo(repo)?;
    let registry = load_registry()?;
    let target = Target::parse(storage);
    let options = PullOptions { backup_dir: backup };

    let result = SyncEngine::new(&registry)
        .pull(&mut repo, &target, &options)
        .context("Pull failed")?;

    for outcome in &result.targets {
        match &outcome.result {
            Ok(PullAction::Updated {
                from, to, backup, ..
            }) => {
                println!(
                    "  {} {}: v{} -> v{}",
                    "✓".green(),
                    outcome.alias.bold(),
                    from,
                    to.to_string().green()
                );
                if let Some(backup) = backup {
                    println!("    backup: {}", backup.display().to_string().dimmed());
                }
            }
            Ok(PullAction::UpToDate { local, remote }) => {
                let remote = remote
                    .map(|v| format!("v{}", v))
                    .unwrap_or_else(|| "no snapshot".to_string());
                println!(
                    "  {} {}: up to date (local v{}, remote {})",
                    "=".dimmed(),
                    outcome.alias.bold(),
                    local,
                    remote
                );
            }
            Err(e) => eprintln!("  {} {}: {}", "✗".red(), outcome.alias.bold(), e),
        }
    }

    if !result.has_changes() {
        println!("{}", "No new changes from storage".dimmed());
    }

    let failed = result.failures().count();
    if failed > 0 {
        bail!("{} storage(s) could not be pulled from", failed);
    }
    Ok(())
}

/// Register a global alias.
pub fn global_storage_add(alias: &str, path: &Path) -> Result<()> {
    let mut registry = load_registry()?;
    let storage = ExternalStorage::init(path)
        .with_context(|| format!("Cannot initialize storage {}", path.display()))?;
    registry.add(alias, storage.path());
    registry.save().context("Cannot save global settings")?;

    println!(
        "{} Global alias {} -> {}",
        "✓".green(),
        alias.bold(),
        storage.path().display().to_string().dimmed()
    );
    Ok(())
}

/// Forget a global alias.
pub fn global_storage_remove(alias: &str) -> Result<()> {
    let mut registry = load_registry()?;
    if registry.remove(alias).is_none() {
        println!("{}", format!("Global alias '{}' is not registered", alias).yellow());
        return Ok(());
    }
    registry.save().context("Cannot save global settings")?;
    println!("{} Removed global alias {}", "✓".green(), alias.bold());
    Ok(())
}

/// Print global aliases.
pub fn global_storage_list() -> Result<()> {
    let registry = load_registry()?;
    println!(
        "{} {}",
        "Global aliases".cyan().bold(),
        registry.path().display().to_string().dimmed()
    );
    let mut empty = true;
    for (alias, path) in registry.iter() {
        empty = false;
        println!("  {} -> {}", alias.bold(), path.display().to_string().dimmed());
    }
    if empty {
        println!("  {}", "(none)".dimmed());
    }
    Ok(())
}
