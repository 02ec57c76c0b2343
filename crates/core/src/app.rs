//! Application wiring.
//!
//! [`App`] owns every service and is constructed explicitly by the host;
//! there is no global instance. Activation registers roles and seeds
//! default settings, deactivation removes the roles again and leaves all
//! content and settings in place.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::info;

use crate::access::AccessControl;
use crate::charset::Converter;
use crate::pipeline::SlugPipeline;
use crate::roles::RoleRegistry;
use crate::settings::{DEFAULT_CITY_NAME, Settings, TranslationProviderKind, keys};
use crate::store::{ContentStore, PgStore, RoleStore, UserStore, VariableStore};

/// Number of ward blocks seeded on first activation.
const SEED_BLOCK_COUNT: usize = 10;

/// The storage backends the services run against.
#[derive(Clone)]
pub struct Stores {
    pub content: Arc<dyn ContentStore>,
    pub users: Arc<dyn UserStore>,
    pub roles: Arc<dyn RoleStore>,
    pub variables: Arc<dyn VariableStore>,
}

impl Stores {
    /// All four backends served by one Postgres pool.
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Stores {
            content: store.clone(),
            users: store.clone(),
            roles: store.clone(),
            variables: store,
        }
    }
}

/// The assembled application.
#[derive(Clone)]
pub struct App {
    stores: Stores,
    registry: RoleRegistry,
    access: AccessControl,
    pipeline: SlugPipeline,
}

impl App {
    pub fn new(stores: Stores) -> Result<Self> {
        let registry = RoleRegistry::new(stores.roles.clone(), stores.users.clone());
        let access = AccessControl::new(
            stores.content.clone(),
            stores.users.clone(),
            stores.variables.clone(),
        );
        let converter = Converter::new(stores.content.clone(), stores.variables.clone());
        let pipeline = SlugPipeline::new(stores.content.clone(), stores.variables.clone(), converter)
            .context("failed to assemble slug pipeline")?;

        Ok(App {
            stores,
            registry,
            access,
            pipeline,
        })
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn roles(&self) -> &RoleRegistry {
        &self.registry
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn pipeline(&self) -> &SlugPipeline {
        &self.pipeline
    }

    /// One-time setup: register the roles and seed any missing defaults.
    ///
    /// Safe to run repeatedly. Existing roles and settings are never
    /// overwritten, so a reactivation keeps operator customizations.
    pub async fn activate(&self) -> Result<()> {
        self.registry.register_roles().await?;
        self.seed_defaults().await?;
        info!("activated");
        Ok(())
    }

    /// Remove the registered roles. Content, metadata, and settings stay.
    pub async fn deactivate(&self) -> Result<()> {
        self.registry.remove_roles().await?;
        info!("deactivated");
        Ok(())
    }

    async fn seed_defaults(&self) -> Result<()> {
        let variables = self.stores.variables.as_ref();

        if variables.get(keys::CITY_NAME).await?.is_none() {
            variables
                .set(keys::CITY_NAME, json!(DEFAULT_CITY_NAME))
                .await?;
        }

        if variables.get(keys::BLOCKS).await?.is_none() {
            let blocks: Vec<String> = (1..=SEED_BLOCK_COUNT)
                .map(|n| format!("ward-{n}"))
                .collect();
            variables.set(keys::BLOCKS, json!(blocks)).await?;
        }

        if variables.get(keys::TRANSLATION_PROVIDER).await?.is_none() {
            variables
                .set(
                    keys::TRANSLATION_PROVIDER,
                    json!(TranslationProviderKind::MyMemory.as_str()),
                )
                .await?;
        }

        if variables.get(keys::ASCII_FALLBACK).await?.is_none() {
            variables.set(keys::ASCII_FALLBACK, json!(true)).await?;
        }

        if variables.get(keys::CHARSET_CONVERSION_ENABLED).await?.is_none() {
            variables
                .set(keys::CHARSET_CONVERSION_ENABLED, json!(true))
                .await?;
        }

        Ok(())
    }

    /// Current settings snapshot.
    pub async fn settings(&self) -> Result<Settings> {
        Settings::load(self.stores.variables.as_ref()).await
    }

    /// Persist new settings and drop cached translations, since a provider
    /// or key change invalidates them.
    pub async fn update_settings(&self, settings: &Settings) -> Result<()> {
        settings.save(self.stores.variables.as_ref()).await?;
        self.pipeline.clear_translation_cache().await;
        Ok(())
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App").finish()
    }
}
