//! Block-based access decisions.
//!
//! Stateless per-request decision procedures: whether a content item belongs
//! to a block, whether a user may edit it, and the SQL predicates the host
//! applies to admin listings and the media library.

use std::sync::Arc;

use anyhow::Result;
use sea_query::{Cond, Condition, Expr, Iden, Query};
use tracing::debug;
use uuid::Uuid;

use crate::models::{ContentItem, User};
use crate::roles::{is_block_officer, is_pta_admin};
use crate::settings::Settings;
use crate::store::{ContentStore, UserStore, VariableStore};

/// Capability names subject to block-based overrides.
pub const EDIT_CAPABILITIES: &[&str] = &[
    "edit_post",
    "edit_page",
    "delete_post",
    "delete_page",
    "publish_post",
    "publish_page",
];

/// Ancestry walk limit; protects against parent cycles in bad data.
const MAX_ANCESTRY_DEPTH: usize = 64;

#[derive(Iden)]
enum Item {
    Table,
    Id,
    Kind,
    Status,
    Slug,
    Url,
}

#[derive(Iden)]
enum ItemMeta {
    Table,
    ItemId,
    MetaKey,
    MetaValue,
}

/// A capability check forwarded by the host.
#[derive(Debug, Clone)]
pub struct CapabilityCheck {
    /// The primitive capability being checked (e.g. `edit_post`).
    pub capability: String,
    /// Target content id, when the check carries one.
    pub target: Option<Uuid>,
}

/// Outcome of a capability override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityDecision {
    /// Leave the host's own resolution in place.
    Unchanged,
    /// Force every requested capability in this check to false.
    Deny,
}

/// Where a listing query is being built.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListingContext {
    /// The host's admin area is rendering the listing.
    pub admin_area: bool,
    /// This is the request's main query, not a secondary one.
    pub main_query: bool,
}

/// Presentational restrictions for a single-item view.
///
/// Read access stays; only the edit affordances are hidden. The capability
/// override is the actual authorization boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayRestrictions {
    pub hide_admin_bar: bool,
    pub hide_edit_link: bool,
}

/// One-shot holder for the admin listing predicate.
///
/// The predicate applies to exactly one query per request; taking it
/// consumes it, replacing the old pattern of a mutable component field that
/// detached its own filter.
#[derive(Debug)]
pub struct ListingFilter {
    condition: Option<Condition>,
}

impl ListingFilter {
    fn new(condition: Condition) -> Self {
        ListingFilter {
            condition: Some(condition),
        }
    }

    /// Yield the predicate; subsequent calls return `None`.
    pub fn take(&mut self) -> Option<Condition> {
        self.condition.take()
    }
}

/// Escape LIKE wildcards in user-supplied text.
fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Predicate restricting an item listing to one block.
///
/// Matches when the slug contains the block, the recorded URL contains
/// `/block/`, or the id appears among non-auto-draft posts/pages whose slug
/// starts with the block.
pub fn block_listing_condition(block: &str) -> Condition {
    let escaped = escape_like(block);

    let descendants = Query::select()
        .column(Item::Id)
        .from(Item::Table)
        .and_where(Expr::col(Item::Kind).is_in(["post", "page"]))
        .and_where(Expr::col(Item::Status).ne("auto-draft"))
        .and_where(Expr::col(Item::Slug).like(format!("{escaped}%")))
        .take();

    Cond::any()
        .add(Expr::col((Item::Table, Item::Slug)).like(format!("%{escaped}%")))
        .add(Expr::col((Item::Table, Item::Url)).like(format!("%/{escaped}/%")))
        .add(Expr::col((Item::Table, Item::Id)).in_subquery(descendants))
}

/// Predicate restricting the media library to one block.
///
/// An attachment is visible when its attached-file path contains `/block/`
/// OR its explicit block metadata equals the block exactly.
pub fn media_library_condition(block: &str) -> Condition {
    let escaped = escape_like(block);

    let file_match = Query::select()
        .expr(Expr::val(1))
        .from(ItemMeta::Table)
        .and_where(
            Expr::col((ItemMeta::Table, ItemMeta::ItemId)).equals((Item::Table, Item::Id)),
        )
        .and_where(Expr::col(ItemMeta::MetaKey).eq("_attached_file"))
        .and_where(Expr::col(ItemMeta::MetaValue).like(format!("%/{escaped}/%")))
        .take();

    let meta_match = Query::select()
        .expr(Expr::val(1))
        .from(ItemMeta::Table)
        .and_where(
            Expr::col((ItemMeta::Table, ItemMeta::ItemId)).equals((Item::Table, Item::Id)),
        )
        .and_where(Expr::col(ItemMeta::MetaKey).eq("pta_block"))
        .and_where(Expr::col(ItemMeta::MetaValue).eq(block))
        .take();

    Cond::any()
        .add(Expr::exists(file_match))
        .add(Expr::exists(meta_match))
}

/// In-memory form of the media-library predicate.
pub fn attachment_matches_block(
    attached_file: Option<&str>,
    block_meta: Option<&str>,
    block: &str,
) -> bool {
    let needle = format!("/{block}/");
    attached_file.is_some_and(|f| f.contains(&needle)) || block_meta == Some(block)
}

/// Access decision service.
#[derive(Clone)]
pub struct AccessControl {
    content: Arc<dyn ContentStore>,
    users: Arc<dyn UserStore>,
    variables: Arc<dyn VariableStore>,
}

impl AccessControl {
    pub fn new(
        content: Arc<dyn ContentStore>,
        users: Arc<dyn UserStore>,
        variables: Arc<dyn VariableStore>,
    ) -> Self {
        AccessControl {
            content,
            users,
            variables,
        }
    }

    pub fn content(&self) -> &Arc<dyn ContentStore> {
        &self.content
    }

    /// Compute an item's permalink from its ancestry chain.
    pub async fn permalink(&self, item: &ContentItem) -> Result<String> {
        let mut segments = vec![item.slug.clone()];
        let mut parent = item.parent;

        for _ in 0..MAX_ANCESTRY_DEPTH {
            let Some(id) = parent else { break };
            let Some(ancestor) = self.content.find_by_id(id).await? else {
                break;
            };
            segments.push(ancestor.slug.clone());
            parent = ancestor.parent;
        }

        segments.reverse();
        Ok(format!("/{}/", segments.join("/")))
    }

    /// Whether an item belongs to a block.
    ///
    /// Signals, in order: block as a slug substring, `/block/` in the
    /// recorded URL or the ancestry permalink, the same checks up the
    /// parent chain, and finally the root ancestor's explicit block
    /// metadata.
    pub async fn post_belongs_to_block(&self, item: &ContentItem, block: &str) -> Result<bool> {
        let needle = format!("/{block}/");
        let mut current = item.clone();

        for _ in 0..MAX_ANCESTRY_DEPTH {
            if current.slug.contains(block) {
                return Ok(true);
            }
            if current.url.contains(&needle) {
                return Ok(true);
            }
            if self.permalink(&current).await?.contains(&needle) {
                return Ok(true);
            }

            match current.parent {
                Some(parent_id) => match self.content.find_by_id(parent_id).await? {
                    Some(parent) => current = parent,
                    // Dangling parent: fall through to the metadata check.
                    None => break,
                },
                None => break,
            }
        }

        let meta = self.content.block_meta(current.id).await?;
        Ok(meta.as_deref() == Some(block))
    }

    /// Whether a user may edit an item.
    pub async fn user_can_edit(&self, user: &User, item: &ContentItem) -> Result<bool> {
        if is_pta_admin(user) {
            return Ok(true);
        }

        if !is_block_officer(user) {
            return Ok(false);
        }

        let block = self.users.block_of(user.id).await?;
        if block.is_empty() {
            return Ok(false);
        }

        self.post_belongs_to_block(item, &block).await
    }

    /// Override a capability check against a target item.
    ///
    /// Evaluated per check, never cached. Only the edit/delete/publish
    /// capabilities with a target are considered.
    pub async fn override_capability(
        &self,
        user: &User,
        check: &CapabilityCheck,
    ) -> Result<CapabilityDecision> {
        if !EDIT_CAPABILITIES.contains(&check.capability.as_str()) {
            return Ok(CapabilityDecision::Unchanged);
        }
        let Some(target) = check.target else {
            return Ok(CapabilityDecision::Unchanged);
        };

        if is_pta_admin(user) {
            return Ok(CapabilityDecision::Unchanged);
        }

        let Some(item) = self.content.find_by_id(target).await? else {
            return Ok(CapabilityDecision::Unchanged);
        };

        if self.user_can_edit(user, &item).await? {
            Ok(CapabilityDecision::Unchanged)
        } else {
            debug!(user = %user.id, item = %item.id, capability = %check.capability,
                "stripping capabilities outside user's block");
            Ok(CapabilityDecision::Deny)
        }
    }

    /// Build the one-shot admin listing filter for this request, if the
    /// user is a non-admin block officer with an assigned block.
    pub async fn listing_filter(
        &self,
        user: Option<&User>,
        ctx: ListingContext,
    ) -> Result<Option<ListingFilter>> {
        if !ctx.admin_area || !ctx.main_query {
            return Ok(None);
        }
        let Some(user) = user else {
            return Ok(None);
        };
        if is_pta_admin(user) || !is_block_officer(user) {
            return Ok(None);
        }

        let block = self.users.block_of(user.id).await?;
        if block.is_empty() {
            return Ok(None);
        }

        debug!(user = %user.id, block = %block, "restricting admin listing to block");
        Ok(Some(ListingFilter::new(block_listing_condition(&block))))
    }

    /// Build the media library predicate for this user, if restricted.
    pub async fn media_filter(&self, user: &User) -> Result<Option<Condition>> {
        if is_pta_admin(user) || !is_block_officer(user) {
            return Ok(None);
        }

        let block = self.users.block_of(user.id).await?;
        if block.is_empty() {
            return Ok(None);
        }

        Ok(Some(media_library_condition(&block)))
    }

    /// Presentational restrictions for a single-item view.
    pub async fn display_restrictions(
        &self,
        user: Option<&User>,
        item: &ContentItem,
    ) -> Result<DisplayRestrictions> {
        let Some(user) = user else {
            return Ok(DisplayRestrictions::default());
        };
        if is_pta_admin(user) || !is_block_officer(user) {
            return Ok(DisplayRestrictions::default());
        }

        let block = self.users.block_of(user.id).await?;
        if block.is_empty() {
            return Ok(DisplayRestrictions::default());
        }

        if self.post_belongs_to_block(item, &block).await? {
            Ok(DisplayRestrictions::default())
        } else {
            Ok(DisplayRestrictions {
                hide_admin_bar: true,
                hide_edit_link: true,
            })
        }
    }

    /// First configured block whose `/block/` form appears in the path.
    pub async fn block_from_path(&self, path: &str) -> Result<Option<String>> {
        let settings = Settings::load(self.variables.as_ref()).await?;

        Ok(settings
            .blocks
            .into_iter()
            .find(|block| path.contains(&format!("/{block}/"))))
    }

    /// Stamp an item's explicit block metadata from its resolved permalink.
    ///
    /// When no block resolves, the metadata is left untouched. Returns the
    /// stamped block, if any.
    pub async fn stamp_block_meta(&self, item: &ContentItem) -> Result<Option<String>> {
        let permalink = self.permalink(item).await?;
        let Some(block) = self.block_from_path(&permalink).await? else {
            return Ok(None);
        };

        self.content.set_block_meta(item.id, &block).await?;
        debug!(item = %item.id, block = %block, "stamped block metadata");
        Ok(Some(block))
    }
}

impl std::fmt::Debug for AccessControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessControl").finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use sea_query::PostgresQueryBuilder;

    use super::*;

    fn condition_sql(condition: Condition) -> String {
        Query::select()
            .column(Item::Id)
            .from(Item::Table)
            .cond_where(condition)
            .to_string(PostgresQueryBuilder)
    }

    #[test]
    fn listing_condition_sql_shape() {
        let sql = condition_sql(block_listing_condition("ward-1"));
        assert!(sql.contains(r#""item"."slug" LIKE '%ward-1%'"#), "{sql}");
        assert!(sql.contains(r#""item"."url" LIKE '%/ward-1/%'"#), "{sql}");
        assert!(sql.contains(r#""item"."id" IN (SELECT "id" FROM "item""#), "{sql}");
        assert!(sql.contains(r#""slug" LIKE 'ward-1%'"#), "{sql}");
        assert!(sql.contains("auto-draft"), "{sql}");
    }

    #[test]
    fn listing_condition_escapes_like_wildcards() {
        let sql = condition_sql(block_listing_condition("100%_ward"));
        // The raw wildcard pattern must not survive into the SQL.
        assert!(!sql.contains("'%100%_ward%'"), "{sql}");
        assert!(sql.contains("ward"), "{sql}");
    }

    #[test]
    fn media_condition_sql_shape() {
        let sql = condition_sql(media_library_condition("ward-2"));
        assert!(sql.contains("_attached_file"), "{sql}");
        assert!(sql.contains("'%/ward-2/%'"), "{sql}");
        assert!(sql.contains("pta_block"), "{sql}");
        assert!(sql.contains("= 'ward-2'"), "{sql}");
        assert!(sql.contains(" OR "), "{sql}");
    }

    #[test]
    fn attachment_predicate_or_semantics() {
        assert!(attachment_matches_block(
            Some("2026/08/ward-1/photo.jpg"),
            None,
            "ward-1"
        ));
        assert!(attachment_matches_block(None, Some("ward-1"), "ward-1"));
        assert!(!attachment_matches_block(
            Some("2026/08/general/photo.jpg"),
            Some("ward-2"),
            "ward-1"
        ));
        // Exact match only on the metadata side.
        assert!(!attachment_matches_block(None, Some("ward-10"), "ward-1"));
    }

    #[test]
    fn listing_filter_is_one_shot() {
        let mut filter = ListingFilter::new(block_listing_condition("ward-1"));
        assert!(filter.take().is_some());
        assert!(filter.take().is_none());
    }

    #[test]
    fn edit_capabilities_cover_posts_and_pages() {
        for cap in ["edit_post", "delete_page", "publish_post"] {
            assert!(EDIT_CAPABILITIES.contains(&cap));
        }
        assert!(!EDIT_CAPABILITIES.contains(&"read"));
        assert!(!EDIT_CAPABILITIES.contains(&"manage_options"));
    }
}
