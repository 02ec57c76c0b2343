//! Test utilities for the PTA content tools.
//!
//! In-memory storage backends, fixture builders, and a counting
//! translation provider, so integration tests run without a database or
//! network access.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use pta_core::Stores;
use pta_core::models::{ContentItem, CreateItem, ItemKind, ItemStatus, User};
use pta_core::store::{CapabilitySet, ContentStore, RoleStore, UserStore, VariableStore};
use pta_core::translate::TranslationProvider;

/// Initialize logging for a test run, honoring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs the
/// subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Create a test item with default values.
pub fn test_item(kind: &str, title: &str) -> TestItem {
    TestItem {
        id: Uuid::now_v7(),
        kind: ItemKind::parse(kind),
        status: ItemStatus::Publish,
        title: title.to_string(),
        slug: String::new(),
        url: String::new(),
        parent: None,
    }
}

/// A test item builder for creating fixtures.
#[derive(Debug, Clone)]
pub struct TestItem {
    pub id: Uuid,
    pub kind: ItemKind,
    pub status: ItemStatus,
    pub title: String,
    pub slug: String,
    pub url: String,
    pub parent: Option<Uuid>,
}

impl TestItem {
    /// Set a custom ID.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Set the slug.
    pub fn with_slug(mut self, slug: &str) -> Self {
        self.slug = slug.to_string();
        self
    }

    /// Set the recorded URL.
    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    /// Set the parent item.
    pub fn with_parent(mut self, parent: Uuid) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set an arbitrary status.
    pub fn with_status(mut self, status: &str) -> Self {
        self.status = ItemStatus::parse(status);
        self
    }

    /// Mark as an autosave placeholder.
    pub fn auto_draft(mut self) -> Self {
        self.status = ItemStatus::AutoDraft;
        self
    }

    /// Mark as trashed.
    pub fn trashed(mut self) -> Self {
        self.status = ItemStatus::Trash;
        self
    }

    /// Finish as a stored content item.
    pub fn build(self) -> ContentItem {
        ContentItem {
            id: self.id,
            kind: self.kind,
            status: self.status,
            title: self.title,
            slug: self.slug,
            url: self.url,
            parent: self.parent,
        }
    }

    /// Finish as a pending insert record.
    pub fn build_create(self) -> CreateItem {
        CreateItem {
            id: self.id,
            kind: self.kind,
            status: self.status,
            title: self.title,
            slug: self.slug,
        }
    }
}

/// Create a test user holding the given roles.
pub fn test_user(name: &str, roles: &[&str]) -> User {
    User {
        id: Uuid::now_v7(),
        name: name.to_string(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
    }
}

#[derive(Default)]
struct ContentState {
    items: HashMap<Uuid, ContentItem>,
    block_meta: HashMap<Uuid, String>,
    charset: Option<String>,
}

/// In-memory [`ContentStore`].
#[derive(Clone, Default)]
pub struct MemoryContentStore {
    state: Arc<Mutex<ContentState>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an item.
    pub fn insert(&self, item: ContentItem) {
        self.state.lock().items.insert(item.id, item);
    }

    /// Set the charset reported by [`ContentStore::storage_charset`].
    pub fn set_charset(&self, charset: Option<&str>) {
        self.state.lock().charset = charset.map(String::from);
    }

    /// Read back an item's current slug.
    pub fn slug_of(&self, id: Uuid) -> Option<String> {
        self.state.lock().items.get(&id).map(|i| i.slug.clone())
    }

    /// Read back an item's block metadata.
    pub fn block_meta_of(&self, id: Uuid) -> Option<String> {
        self.state.lock().block_meta.get(&id).cloned()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ContentItem>> {
        Ok(self.state.lock().items.get(&id).cloned())
    }

    async fn block_meta(&self, id: Uuid) -> Result<Option<String>> {
        Ok(self.state.lock().block_meta.get(&id).cloned())
    }

    async fn set_block_meta(&self, id: Uuid, block: &str) -> Result<()> {
        self.state.lock().block_meta.insert(id, block.to_string());
        Ok(())
    }

    async fn slug_in_use(&self, slug: &str, exclude: Uuid) -> Result<bool> {
        Ok(self.state.lock().items.values().any(|item| {
            item.id != exclude
                && item.kind.is_managed()
                && !item.status.is_trash()
                && item.slug == slug
        }))
    }

    async fn update_slug(&self, id: Uuid, slug: &str) -> Result<()> {
        if let Some(item) = self.state.lock().items.get_mut(&id) {
            item.slug = slug.to_string();
        }
        Ok(())
    }

    async fn storage_charset(&self) -> Result<Option<String>> {
        Ok(self.state.lock().charset.clone())
    }
}

#[derive(Default)]
struct UserState {
    users: HashMap<Uuid, User>,
    blocks: HashMap<Uuid, String>,
}

/// In-memory [`UserStore`].
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    state: Arc<Mutex<UserState>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User) {
        self.state.lock().users.insert(user.id, user);
    }

    /// Insert a user and assign them a block in one step.
    pub fn insert_with_block(&self, user: User, block: &str) {
        let mut state = self.state.lock();
        state.blocks.insert(user.id, block.to_string());
        state.users.insert(user.id, user);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.state.lock().users.get(&id).cloned())
    }

    async fn block_of(&self, user_id: Uuid) -> Result<String> {
        Ok(self
            .state
            .lock()
            .blocks
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_block(&self, user_id: Uuid, block: &str) -> Result<()> {
        self.state.lock().blocks.insert(user_id, block.to_string());
        Ok(())
    }
}

/// In-memory [`RoleStore`].
#[derive(Clone, Default)]
pub struct MemoryRoleStore {
    roles: Arc<Mutex<HashMap<String, (String, CapabilitySet)>>>,
}

impl MemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of every registered role, sorted.
    pub fn role_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.roles.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl RoleStore for MemoryRoleStore {
    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.roles.lock().contains_key(name))
    }

    async fn capabilities(&self, name: &str) -> Result<Option<CapabilitySet>> {
        Ok(self.roles.lock().get(name).map(|(_, caps)| caps.clone()))
    }

    async fn create(
        &self,
        name: &str,
        display_name: &str,
        capabilities: CapabilitySet,
    ) -> Result<()> {
        self.roles
            .lock()
            .insert(name.to_string(), (display_name.to_string(), capabilities));
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.roles.lock().remove(name);
        Ok(())
    }
}

/// In-memory [`VariableStore`].
#[derive(Clone, Default)]
pub struct MemoryVariableStore {
    values: Arc<Mutex<HashMap<String, JsonValue>>>,
}

impl MemoryVariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value outside the trait, for fixture setup.
    pub fn seed(&self, key: &str, value: JsonValue) {
        self.values.lock().insert(key.to_string(), value);
    }
}

#[async_trait]
impl VariableStore for MemoryVariableStore {
    async fn get(&self, key: &str) -> Result<Option<JsonValue>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: JsonValue) -> Result<()> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }
}

/// All four in-memory backends, with handles kept for assertions.
#[derive(Clone, Default)]
pub struct MemoryStores {
    pub content: MemoryContentStore,
    pub users: MemoryUserStore,
    pub roles: MemoryRoleStore,
    pub variables: MemoryVariableStore,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundle the backends for application wiring.
    pub fn stores(&self) -> Stores {
        Stores {
            content: Arc::new(self.content.clone()),
            users: Arc::new(self.users.clone()),
            roles: Arc::new(self.roles.clone()),
            variables: Arc::new(self.variables.clone()),
        }
    }
}

/// Translation provider that counts calls and returns a fixed reply.
pub struct CountingProvider {
    calls: AtomicUsize,
    reply: Option<String>,
}

impl CountingProvider {
    pub fn new(reply: Option<&str>) -> Self {
        CountingProvider {
            calls: AtomicUsize::new(0),
            reply: reply.map(String::from),
        }
    }

    /// How many times the provider was asked to translate.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationProvider for CountingProvider {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn translate(&self, _text: &str) -> Result<Option<String>, pta_core::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}
