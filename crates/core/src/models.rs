//! Content and user models.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content kinds tracked by the host.
///
/// Only `Post` and `Page` participate in slug generation and block
/// filtering. Autosaves arrive as `Revision`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Post,
    Page,
    Attachment,
    Revision,
    #[serde(untagged)]
    Other(String),
}

impl ItemKind {
    /// Machine name as stored by the host.
    pub fn as_str(&self) -> &str {
        match self {
            ItemKind::Post => "post",
            ItemKind::Page => "page",
            ItemKind::Attachment => "attachment",
            ItemKind::Revision => "revision",
            ItemKind::Other(s) => s,
        }
    }

    /// Parse a stored machine name.
    pub fn parse(s: &str) -> Self {
        match s {
            "post" => ItemKind::Post,
            "page" => ItemKind::Page,
            "attachment" => ItemKind::Attachment,
            "revision" => ItemKind::Revision,
            other => ItemKind::Other(other.to_string()),
        }
    }

    /// Whether this kind is governed by the block/slug machinery.
    pub fn is_managed(&self) -> bool {
        matches!(self, ItemKind::Post | ItemKind::Page)
    }
}

/// Content publication status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemStatus {
    Publish,
    Draft,
    Pending,
    Private,
    Future,
    AutoDraft,
    Trash,
    Inherit,
    #[serde(untagged)]
    Other(String),
}

impl ItemStatus {
    /// Machine name as stored by the host.
    pub fn as_str(&self) -> &str {
        match self {
            ItemStatus::Publish => "publish",
            ItemStatus::Draft => "draft",
            ItemStatus::Pending => "pending",
            ItemStatus::Private => "private",
            ItemStatus::Future => "future",
            ItemStatus::AutoDraft => "auto-draft",
            ItemStatus::Trash => "trash",
            ItemStatus::Inherit => "inherit",
            ItemStatus::Other(s) => s,
        }
    }

    /// Parse a stored machine name.
    pub fn parse(s: &str) -> Self {
        match s {
            "publish" => ItemStatus::Publish,
            "draft" => ItemStatus::Draft,
            "pending" => ItemStatus::Pending,
            "private" => ItemStatus::Private,
            "future" => ItemStatus::Future,
            "auto-draft" => ItemStatus::AutoDraft,
            "trash" => ItemStatus::Trash,
            "inherit" => ItemStatus::Inherit,
            other => ItemStatus::Other(other.to_string()),
        }
    }

    pub fn is_trash(&self) -> bool {
        matches!(self, ItemStatus::Trash)
    }

    pub fn is_auto_draft(&self) -> bool {
        matches!(self, ItemStatus::AutoDraft)
    }
}

/// Content item record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub kind: ItemKind,
    pub status: ItemStatus,
    pub title: String,
    /// URL-safe identifier, unique among non-trashed posts and pages.
    pub slug: String,
    /// Canonical URL as recorded by the host at creation time.
    pub url: String,
    pub parent: Option<Uuid>,
}

/// Insert record handed to the save pipeline before a new item is written.
///
/// Pipeline A mutates `slug` in place; the host applies the returned record
/// as part of the same save.
#[derive(Debug, Clone)]
pub struct CreateItem {
    pub id: Uuid,
    pub kind: ItemKind,
    pub status: ItemStatus,
    pub title: String,
    pub slug: String,
}

/// User record as seen by the decision procedures.
///
/// Role assignment is owned by the host; only the role machine names are
/// carried here. The block attribute lives in user metadata and is read
/// through [`crate::store::UserStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub roles: Vec<String>,
}

impl User {
    /// Check whether the user holds a role by machine name.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trip() {
        for name in ["post", "page", "attachment", "revision"] {
            assert_eq!(ItemKind::parse(name).as_str(), name);
        }
        assert_eq!(ItemKind::parse("nav_menu_item").as_str(), "nav_menu_item");
    }

    #[test]
    fn only_posts_and_pages_are_managed() {
        assert!(ItemKind::Post.is_managed());
        assert!(ItemKind::Page.is_managed());
        assert!(!ItemKind::Attachment.is_managed());
        assert!(!ItemKind::Revision.is_managed());
        assert!(!ItemKind::Other("menu".into()).is_managed());
    }

    #[test]
    fn status_round_trip() {
        for name in ["publish", "auto-draft", "trash", "inherit"] {
            assert_eq!(ItemStatus::parse(name).as_str(), name);
        }
        assert!(ItemStatus::parse("trash").is_trash());
        assert!(ItemStatus::parse("auto-draft").is_auto_draft());
    }
}
