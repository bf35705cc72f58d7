//! Sync module - push snapshots to storages and pull newer ones back.
//!
//! Each call runs to completion against the config documents on disk; no
//! state is kept between calls. Per-target failures (unknown alias, push
//! conflict) end up in the returned result, everything else aborts the call.

pub mod clone;
pub mod pull;
pub mod push;

pub use clone::clone_repository;
pub use pull::{PullAction, PullOptions, PullResult};
pub use push::PushResult;

use crate::error::SyncError;
use crate::registry::AliasRegistry;
use crate::repository::Repository;

/// Which storages a push or pull addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// One alias, resolved locally then globally
    Storage(String),
    /// Every storage linked to the repository
    All,
}

impl Target {
    /// `all` means every linked storage, anything else is an alias.
    pub fn parse(value: &str) -> Self {
        if value == "all" {
            Self::All
        } else {
            Self::Storage(value.to_string())
        }
    }
}

/// Result of one push or pull against a single storage.
#[derive(Debug)]
pub struct TargetOutcome<T> {
    pub alias: String,
    pub result: Result<T, SyncError>,
}

/// Push/pull orchestration bound to an alias registry.
pub struct SyncEngine<'a> {
    registry: &'a AliasRegistry,
}

impl<'a> SyncEngine<'a> {
    pub fn new(registry: &'a AliasRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &AliasRegistry {
        self.registry
    }

    /// Aliases addressed by `target`, in a stable order.
    fn aliases(&self, repo: &Repository, target: &Target) -> Vec<String> {
        match target {
            Target::Storage(alias) => vec![alias.clone()],
            Target::All => repo.linked_aliases().map(str::to_string).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target() {
        assert_eq!(Target::parse("all"), Target::All);
        assert_eq!(Target::parse("usb"), Target::Storage("usb".to_string()));
        assert_eq!(Target::parse("All"), Target::Storage("All".to_string()));
    }
}
