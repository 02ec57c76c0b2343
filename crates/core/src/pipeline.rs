//! Slug generation pipeline.
//!
//! Wires charset safety, translation, romanization, and sanitization into
//! the two save paths: filling the slug before an insert, and refreshing
//! an empty slug after an update. Also enforces slug uniqueness among
//! live posts and pages.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::charset::Converter;
use crate::models::CreateItem;
use crate::settings::{Settings, TranslationProviderKind};
use crate::slug::{romanize, slugify};
use crate::store::{ContentStore, VariableStore};
use crate::translate::{Deepl, MyMemory, NoTranslation, TranslationProvider, Translator};

/// How many numeric suffixes to probe before falling back to a random one.
const MAX_UNIQUE_ATTEMPTS: u32 = 100;

/// Generates and maintains slugs for posts and pages.
#[derive(Clone)]
pub struct SlugPipeline {
    content: Arc<dyn ContentStore>,
    variables: Arc<dyn VariableStore>,
    converter: Converter,
    translator: Translator,
    mymemory: Arc<MyMemory>,
    deepl: Deepl,
    passthrough: NoTranslation,
    provider_override: Option<Arc<dyn TranslationProvider>>,
}

impl SlugPipeline {
    pub fn new(
        content: Arc<dyn ContentStore>,
        variables: Arc<dyn VariableStore>,
        converter: Converter,
    ) -> Result<Self> {
        let mymemory = MyMemory::new(variables.clone()).context("failed to build http client")?;

        Ok(SlugPipeline {
            content,
            variables,
            converter,
            translator: Translator::default(),
            mymemory: Arc::new(mymemory),
            deepl: Deepl,
            passthrough: NoTranslation,
            provider_override: None,
        })
    }

    /// Replace the configured provider, regardless of settings.
    pub fn with_provider(mut self, provider: Arc<dyn TranslationProvider>) -> Self {
        self.provider_override = Some(provider);
        self
    }

    fn provider_for(&self, kind: TranslationProviderKind) -> &dyn TranslationProvider {
        if let Some(provider) = &self.provider_override {
            return provider.as_ref();
        }
        match kind {
            TranslationProviderKind::MyMemory => self.mymemory.as_ref(),
            TranslationProviderKind::Deepl => &self.deepl,
            TranslationProviderKind::None => &self.passthrough,
        }
    }

    /// Fill in a slug before the item is first persisted.
    ///
    /// Only posts and pages are touched, and only when the slug is still
    /// empty. Autosave drafts keep their placeholder slug and get a real
    /// one once they are properly saved.
    pub async fn prepare_insert(&self, item: &mut CreateItem) -> Result<()> {
        if !item.kind.is_managed() || item.status.is_auto_draft() {
            return Ok(());
        }
        if !item.slug.is_empty() || item.title.is_empty() {
            return Ok(());
        }

        let slug = self.generate_from_title(&item.title).await?;
        if slug.is_empty() {
            return Ok(());
        }

        let slug = self.ensure_unique(&slug, item.id).await?;
        debug!(item = %item.id, slug, "generated slug on insert");
        item.slug = slug;
        Ok(())
    }

    /// Backfill the slug of an already-saved item that still lacks one.
    pub async fn refresh_on_update(&self, id: Uuid) -> Result<()> {
        let Some(item) = self.content.find_by_id(id).await? else {
            return Ok(());
        };
        if !item.kind.is_managed() || item.status.is_auto_draft() {
            return Ok(());
        }
        if !item.slug.is_empty() || item.title.is_empty() {
            return Ok(());
        }

        let slug = self.generate_from_title(&item.title).await?;
        if slug.is_empty() {
            return Ok(());
        }

        let slug = self.ensure_unique(&slug, id).await?;
        info!(item = %id, slug, "backfilled missing slug");
        self.content.update_slug(id, &slug).await
    }

    /// Produce a slug candidate from a title. May be empty when the title
    /// carries nothing usable.
    ///
    /// The title is first made safe for storage, then run through the
    /// configured translation provider. When nothing comes back and the
    /// romanization fallback is enabled, the title is transliterated to
    /// ASCII instead. Either result is sanitized; if that leaves nothing,
    /// the storage-safe title itself is sanitized as the last resort.
    pub async fn generate_from_title(&self, title: &str) -> Result<String> {
        let safe_title = self.converter.prepare_for_database(title).await?;
        let settings = Settings::load(self.variables.as_ref()).await?;

        let provider = self.provider_for(settings.translation_provider);
        let mut text = self.translator.translate(provider, &safe_title).await;

        if text.is_empty() && settings.ascii_fallback {
            text = romanize(&safe_title);
        }

        let mut slug = slugify(&text);
        if slug.is_empty() {
            slug = slugify(&safe_title);
        }

        self.converter.prepare_for_display(&slug).await
    }

    /// Resolve collisions with existing posts and pages by appending a
    /// numeric suffix. When the probe limit is reached, a random fragment
    /// is used instead of looping further.
    pub async fn ensure_unique(&self, slug: &str, exclude: Uuid) -> Result<String> {
        if !self.content.slug_in_use(slug, exclude).await? {
            return Ok(slug.to_string());
        }

        for suffix in 2..=MAX_UNIQUE_ATTEMPTS {
            let candidate = format!("{slug}-{suffix}");
            if !self.content.slug_in_use(&candidate, exclude).await? {
                return Ok(candidate);
            }
        }

        let fragment = Uuid::now_v7().simple().to_string();
        let candidate = format!("{slug}-{}", &fragment[..8]);
        warn!(slug, candidate, "slug suffix probe exhausted, using random fragment");
        Ok(candidate)
    }

    /// Drop every cached translation.
    pub async fn clear_translation_cache(&self) {
        self.translator.clear_cache().await;
    }
}

impl std::fmt::Debug for SlugPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlugPipeline").finish()
    }
}
