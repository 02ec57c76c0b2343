//! Postgres-backed storage implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{CapabilitySet, ContentStore, RoleStore, UserStore, VariableStore};
use crate::models::{ContentItem, ItemKind, ItemStatus, User};

/// Metadata key carrying an item's or user's explicit block association.
pub const BLOCK_META_KEY: &str = "pta_block";

/// Postgres store over the host schema.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    kind: String,
    status: String,
    title: String,
    slug: String,
    url: String,
    parent: Option<Uuid>,
}

impl From<ItemRow> for ContentItem {
    fn from(row: ItemRow) -> Self {
        ContentItem {
            id: row.id,
            kind: ItemKind::parse(&row.kind),
            status: ItemStatus::parse(&row.status),
            title: row.title,
            slug: row.slug,
            url: row.url,
            parent: row.parent,
        }
    }
}

impl PgStore {
    /// Create a new store over a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ContentItem>> {
        let row = sqlx::query_as::<_, ItemRow>(
            "SELECT id, kind, status, title, slug, url, parent FROM item WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch item by id")?;

        Ok(row.map(ContentItem::from))
    }

    async fn block_meta(&self, id: Uuid) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>(
            "SELECT meta_value FROM item_meta WHERE item_id = $1 AND meta_key = $2",
        )
        .bind(id)
        .bind(BLOCK_META_KEY)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch item block meta")?;

        Ok(value)
    }

    async fn set_block_meta(&self, id: Uuid, block: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO item_meta (item_id, meta_key, meta_value)
            VALUES ($1, $2, $3)
            ON CONFLICT (item_id, meta_key) DO UPDATE SET meta_value = $3
            "#,
        )
        .bind(id)
        .bind(BLOCK_META_KEY)
        .bind(block)
        .execute(&self.pool)
        .await
        .context("failed to set item block meta")?;

        Ok(())
    }

    async fn slug_in_use(&self, slug: &str, exclude: Uuid) -> Result<bool> {
        let in_use = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM item
                WHERE slug = $1
                  AND id <> $2
                  AND status <> 'trash'
                  AND kind IN ('post', 'page')
            )
            "#,
        )
        .bind(slug)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await
        .context("failed to check slug uniqueness")?;

        Ok(in_use)
    }

    async fn update_slug(&self, id: Uuid, slug: &str) -> Result<()> {
        sqlx::query("UPDATE item SET slug = $1 WHERE id = $2")
            .bind(slug)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to update item slug")?;

        Ok(())
    }

    async fn storage_charset(&self) -> Result<Option<String>> {
        // Diagnostic query; an unreachable or unexpected answer is treated
        // as "unknown" rather than an error.
        let encoding = sqlx::query_scalar::<_, String>("SHOW server_encoding")
            .fetch_one(&self.pool)
            .await;

        match encoding {
            Ok(e) => Ok(Some(normalize_encoding(&e))),
            Err(e) => {
                debug!(error = %e, "charset detection failed, treating as unknown");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, (Uuid, String)>("SELECT id, name FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch user by id")?;

        let Some((id, name)) = row else {
            return Ok(None);
        };

        let roles = sqlx::query_scalar::<_, String>(
            "SELECT role_name FROM user_roles WHERE user_id = $1 ORDER BY role_name",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch user roles")?;

        Ok(Some(User { id, name, roles }))
    }

    async fn block_of(&self, user_id: Uuid) -> Result<String> {
        let value = sqlx::query_scalar::<_, String>(
            "SELECT meta_value FROM user_meta WHERE user_id = $1 AND meta_key = $2",
        )
        .bind(user_id)
        .bind(BLOCK_META_KEY)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch user block")?;

        Ok(value.unwrap_or_default())
    }

    async fn set_block(&self, user_id: Uuid, block: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_meta (user_id, meta_key, meta_value)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, meta_key) DO UPDATE SET meta_value = $3
            "#,
        )
        .bind(user_id)
        .bind(BLOCK_META_KEY)
        .bind(block)
        .execute(&self.pool)
        .await
        .context("failed to set user block")?;

        Ok(())
    }
}

#[async_trait]
impl RoleStore for PgStore {
    async fn exists(&self, name: &str) -> Result<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM roles WHERE name = $1)")
                .bind(name)
                .fetch_one(&self.pool)
                .await
                .context("failed to check role existence")?;

        Ok(exists)
    }

    async fn capabilities(&self, name: &str) -> Result<Option<CapabilitySet>> {
        let value = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT capabilities FROM roles WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch role capabilities")?;

        let Some(value) = value else {
            return Ok(None);
        };

        let caps = serde_json::from_value(value).context("malformed capability set")?;
        Ok(Some(caps))
    }

    async fn create(
        &self,
        name: &str,
        display_name: &str,
        capabilities: CapabilitySet,
    ) -> Result<()> {
        let caps = serde_json::to_value(capabilities).context("failed to encode capabilities")?;

        sqlx::query(
            "INSERT INTO roles (name, display_name, capabilities) VALUES ($1, $2, $3)",
        )
        .bind(name)
        .bind(display_name)
        .bind(caps)
        .execute(&self.pool)
        .await
        .context("failed to create role")?;

        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM roles WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .context("failed to remove role")?;

        Ok(())
    }
}

#[async_trait]
impl VariableStore for PgStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let value = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT value FROM variable WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .context("failed to get variable")?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO variable (key, value, updated)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET value = $2, updated = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .context("failed to set variable")?;

        Ok(())
    }
}

/// Map a Postgres `server_encoding` into the charset vocabulary the
/// conversion gate uses. Postgres's native UTF8 stores supplementary-plane
/// characters, unlike the 3-byte MySQL `utf8` family, so it reports as the
/// wide variant; other encodings pass through lowercased.
fn normalize_encoding(encoding: &str) -> String {
    let lowered = encoding.to_lowercase();
    match lowered.as_str() {
        "utf8" | "unicode" => "utf8mb4".to_string(),
        _ => lowered,
    }
}

impl std::fmt::Debug for PgStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStore").finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::charset::needs_conversion;

    #[test]
    fn native_utf8_never_triggers_conversion() {
        assert!(!needs_conversion(&normalize_encoding("UTF8")));
        assert!(!needs_conversion(&normalize_encoding("unicode")));
    }

    #[test]
    fn other_encodings_pass_through_lowercased() {
        assert_eq!(normalize_encoding("SQL_ASCII"), "sql_ascii");
        assert_eq!(normalize_encoding("LATIN1"), "latin1");
        assert!(!needs_conversion(&normalize_encoding("LATIN1")));
    }
}
