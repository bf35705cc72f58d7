//! ZipRepo CLI - Sync your data between remote directories
//!
//! Usage:
//!   ziprepo init                          - Track the current directory
//!   ziprepo ext add <name> <path>         - Link a storage directory
//!   ziprepo push <storage|all>            - Publish a new version
//!   ziprepo pull <storage|all>            - Adopt a newer version
//!   ziprepo global storage add <a> <path> - Register a user-wide alias

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, ExtCommands, GlobalCommands, GlobalStorageCommands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("ziprepo={}", log_level).parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let repo = cli.repo;
    match cli.command {
        Commands::Init => cli::commands::init(repo),
        Commands::Status => cli::commands::status(repo),
        Commands::Ext { command } => match command {
            ExtCommands::Init { path } => cli::commands::ext_init(path),
            ExtCommands::Add { name, path } => cli::commands::ext_add(repo, &name, &path),
            ExtCommands::Remove { name } => cli::commands::ext_remove(repo, &name),
            ExtCommands::Clone { source, repo_name } => {
                cli::commands::ext_clone(repo, &source, &repo_name)
            }
            ExtCommands::List { storage } => cli::commands::ext_list(repo, &storage),
        },
        Commands::Push { storage } => cli::commands::push(repo, &storage),
        Commands::Pull { storage, backup } => cli::commands::pull(repo, &storage, backup),
        Commands::Global { command } => match command {
            GlobalCommands::Storage { command } => match command {
                GlobalStorageCommands::Add { alias, path } => {
                    cli::commands::global_storage_add(&alias, &path)
                }
                GlobalStorageCommands::Remove { alias } => {
                    cli::commands::global_storage_remove(&alias)
                }
                GlobalStorageCommands::List => cli::commands::global_storage_list(),
            },
        },
    }
}
