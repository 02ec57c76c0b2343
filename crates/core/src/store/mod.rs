//! Storage abstraction layer.
//!
//! The host framework owns users, roles, content, and option persistence.
//! This library consumes them through the traits below; all reads treat
//! "not found" as a negative or empty result rather than an error. The
//! Postgres implementation lives in [`postgres`], and the test-utils crate
//! ships in-memory implementations.

mod postgres;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

pub use postgres::PgStore;

use crate::models::{ContentItem, User};

/// Capability set attached to a role: capability name to grant flag.
pub type CapabilitySet = BTreeMap<String, bool>;

/// Content item storage and lookups.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Load an item by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ContentItem>>;

    /// Read the item's explicit block metadata, if set.
    async fn block_meta(&self, id: Uuid) -> Result<Option<String>>;

    /// Write the item's explicit block metadata.
    async fn set_block_meta(&self, id: Uuid, block: &str) -> Result<()>;

    /// Whether a slug is already claimed by a non-trashed post or page
    /// other than `exclude`.
    async fn slug_in_use(&self, slug: &str, exclude: Uuid) -> Result<bool>;

    /// Overwrite an item's slug after the original save completed.
    async fn update_slug(&self, id: Uuid, slug: &str) -> Result<()>;

    /// Character set the storage layer persists text in.
    ///
    /// Implementations issue a diagnostic query; any failure or
    /// unrecognized answer maps to `None` ("unknown"), which callers
    /// treat as "no conversion needed".
    async fn storage_charset(&self) -> Result<Option<String>>;
}

/// User lookups and the per-user block attribute.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Load a user by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Read the user's assigned block, defaulting to the empty string.
    async fn block_of(&self, user_id: Uuid) -> Result<String>;

    /// Assign the user's block.
    async fn set_block(&self, user_id: Uuid, block: &str) -> Result<()>;
}

/// Role registry owned by the host.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Whether a role with this machine name exists.
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Capability set of an existing role, or `None` if absent.
    async fn capabilities(&self, name: &str) -> Result<Option<CapabilitySet>>;

    /// Create a role. Callers guarantee the name is not taken.
    async fn create(&self, name: &str, display_name: &str, capabilities: CapabilitySet)
    -> Result<()>;

    /// Remove a role. Removing an absent role is not an error.
    async fn remove(&self, name: &str) -> Result<()>;
}

/// Persisted key-value configuration.
#[async_trait]
pub trait VariableStore: Send + Sync {
    /// Read a configuration value.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Write a configuration value.
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()>;
}
