//! CLI definitions and command implementations for ZipRepo.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ZipRepo - Sync your data between remote directories
#[derive(Parser)]
#[command(name = "ziprepo")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Repository directory (default: current directory)
    #[arg(long, global = true)]
    pub repo: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the repository in the current directory
    Init,

    /// Show version, exclusions and linked storages
    Status,

    /// Manage external storages
    Ext {
        #[command(subcommand)]
        command: ExtCommands,
    },

    /// Publish a new version to a storage (or `all` linked storages)
    Push {
        /// Storage alias, or `all`
        storage: String,
    },

    /// Replace the local tree with a newer version from a storage (or `all`)
    Pull {
        /// Storage alias, or `all`
        storage: String,

        /// Save the current tree into this directory before replacing it
        #[arg(long)]
        backup: Option<PathBuf>,
    },

    /// Manage user-wide settings
    Global {
        #[command(subcommand)]
        command: GlobalCommands,
    },
}

#[derive(Subcommand)]
pub enum ExtCommands {
    /// Initialize a directory as a storage
    Init {
        /// Storage directory (default: current directory)
        path: Option<PathBuf>,
    },

    /// Link a storage to the repository
    Add { name: String, path: PathBuf },

    /// Unlink a storage from the repository
    Remove { name: String },

    /// Create a repository from the newest snapshot in a storage
    Clone {
        /// Global alias or storage directory
        source: String,
        /// Name of the repository to clone
        repo_name: String,
    },

    /// List snapshots kept in a storage
    List {
        /// Alias (local or global) or storage directory
        storage: String,
    },
}

#[derive(Subcommand)]
pub enum GlobalCommands {
    /// Manage global storage aliases
    Storage {
        #[command(subcommand)]
        command: GlobalStorageCommands,
    },
}

#[derive(Subcommand)]
pub enum GlobalStorageCommands {
    /// Register a storage alias for every repository
    Add { alias: String, path: PathBuf },

    /// Forget a global storage alias
    Remove { alias: String },

    /// Show global storage aliases
    List,
}
