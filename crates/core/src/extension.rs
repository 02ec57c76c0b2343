//! Integration seams for embedding hosts.
//!
//! A host wires these traits into its own save path, query builder, and
//! permission checks instead of this library reaching into the host. Each
//! trait covers one seam; [`SlugPipeline`] and [`AccessControl`] implement
//! the ones they participate in.

use anyhow::Result;
use async_trait::async_trait;
use sea_query::Condition;
use uuid::Uuid;

use crate::access::{AccessControl, CapabilityCheck, CapabilityDecision, ListingContext};
use crate::models::{CreateItem, User};
use crate::pipeline::SlugPipeline;

/// Participates in the item save path.
#[async_trait]
pub trait SaveStage: Send + Sync {
    /// Called with the pending item before it is first persisted. The
    /// stage may mutate it.
    async fn on_insert(&self, item: &mut CreateItem) -> Result<()>;

    /// Called after an item was persisted.
    async fn after_save(&self, id: Uuid) -> Result<()>;
}

/// Contributes restriction predicates to host-built listing queries.
#[async_trait]
pub trait QueryPredicateProvider: Send + Sync {
    /// Predicate for an admin content listing, or `None` when the user is
    /// unrestricted.
    async fn listing_predicate(
        &self,
        user: Option<&User>,
        ctx: ListingContext,
    ) -> Result<Option<Condition>>;

    /// Predicate for the media library, or `None` when unrestricted.
    async fn media_predicate(&self, user: &User) -> Result<Option<Condition>>;
}

/// Vetoes capability checks the host is about to grant.
#[async_trait]
pub trait CapabilityOverrideProvider: Send + Sync {
    async fn override_check(
        &self,
        user: &User,
        check: &CapabilityCheck,
    ) -> Result<CapabilityDecision>;
}

#[async_trait]
impl SaveStage for SlugPipeline {
    async fn on_insert(&self, item: &mut CreateItem) -> Result<()> {
        self.prepare_insert(item).await
    }

    async fn after_save(&self, id: Uuid) -> Result<()> {
        self.refresh_on_update(id).await
    }
}

#[async_trait]
impl SaveStage for AccessControl {
    async fn on_insert(&self, _item: &mut CreateItem) -> Result<()> {
        Ok(())
    }

    async fn after_save(&self, id: Uuid) -> Result<()> {
        let Some(item) = self.content().find_by_id(id).await? else {
            return Ok(());
        };
        self.stamp_block_meta(&item).await?;
        Ok(())
    }
}

#[async_trait]
impl QueryPredicateProvider for AccessControl {
    async fn listing_predicate(
        &self,
        user: Option<&User>,
        ctx: ListingContext,
    ) -> Result<Option<Condition>> {
        let Some(mut filter) = self.listing_filter(user, ctx).await? else {
            return Ok(None);
        };
        Ok(filter.take())
    }

    async fn media_predicate(&self, user: &User) -> Result<Option<Condition>> {
        self.media_filter(user).await
    }
}

#[async_trait]
impl CapabilityOverrideProvider for AccessControl {
    async fn override_check(
        &self,
        user: &User,
        check: &CapabilityCheck,
    ) -> Result<CapabilityDecision> {
        self.override_capability(user, check).await
    }
}
