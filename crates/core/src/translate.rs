//! Title translation providers and cache.
//!
//! A provider turns a Japanese title into English text for slug use. Any
//! provider failure collapses to "no translation produced"; the pipeline
//! then falls through to romanization. Results are cached for 24 hours,
//! keyed by a hash of the source text, independent of provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::Error;
use crate::settings::Settings;
use crate::store::VariableStore;

/// MyMemory API endpoint.
const MYMEMORY_ENDPOINT: &str = "https://api.mymemory.translated.net/get";

/// Fixed language pair: Japanese to English.
const LANG_PAIR: &str = "ja|en";

/// Outbound request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Cache TTL: 24 hours.
const CACHE_TTL_SECS: u64 = 24 * 60 * 60;

/// Maximum cached translations.
const CACHE_MAX_CAPACITY: u64 = 10_000;

/// Cache key prefix shared by every entry.
const CACHE_KEY_PREFIX: &str = "pta_translation_";

/// A translation backend.
///
/// `Ok(None)` means "no translation produced" and the caller falls through
/// to its fallback chain. Errors are reported but treated the same way.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Provider machine name, for logging.
    fn name(&self) -> &'static str;

    /// Translate Japanese text to English.
    async fn translate(&self, text: &str) -> Result<Option<String>, Error>;
}

#[derive(Debug, Deserialize)]
struct MyMemoryResponse {
    #[serde(rename = "responseData")]
    response_data: Option<MyMemoryResponseData>,
}

#[derive(Debug, Deserialize)]
struct MyMemoryResponseData {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
}

/// MyMemory remote translation provider.
///
/// Issues a GET with the source text and fixed `ja|en` language pair; the
/// API key is optional and read from settings per request. TLS certificate
/// verification stays enabled.
pub struct MyMemory {
    client: reqwest::Client,
    endpoint: String,
    variables: Arc<dyn VariableStore>,
}

impl MyMemory {
    pub fn new(variables: Arc<dyn VariableStore>) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(MyMemory {
            client,
            endpoint: MYMEMORY_ENDPOINT.to_string(),
            variables,
        })
    }

    /// Point the provider at a different endpoint.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }
}

#[async_trait]
impl TranslationProvider for MyMemory {
    fn name(&self) -> &'static str {
        "mymemory"
    }

    async fn translate(&self, text: &str) -> Result<Option<String>, Error> {
        let settings = Settings::load(self.variables.as_ref())
            .await
            .map_err(Error::Other)?;

        let mut params = vec![("q", text.to_string()), ("langpair", LANG_PAIR.to_string())];
        if !settings.mymemory_api_key.is_empty() {
            params.push(("key", settings.mymemory_api_key));
        }

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await?;

        let body: MyMemoryResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                debug!(error = %e, "unexpected translation response shape");
                return Ok(None);
            }
        };

        Ok(body.response_data.and_then(|d| d.translated_text))
    }
}

/// Placeholder for a second remote provider; always falls through.
#[derive(Debug, Default, Clone)]
pub struct Deepl;

#[async_trait]
impl TranslationProvider for Deepl {
    fn name(&self) -> &'static str {
        "deepl"
    }

    async fn translate(&self, _text: &str) -> Result<Option<String>, Error> {
        Ok(None)
    }
}

/// Pass the text through unchanged.
#[derive(Debug, Default, Clone)]
pub struct NoTranslation;

#[async_trait]
impl TranslationProvider for NoTranslation {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn translate(&self, text: &str) -> Result<Option<String>, Error> {
        Ok(Some(text.to_string()))
    }
}

/// Cache key for a source text: shared prefix plus a content hash.
pub fn cache_key(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("{CACHE_KEY_PREFIX}{}", hex::encode(digest))
}

/// Provider-agnostic translation cache with a 24-hour TTL.
#[derive(Clone)]
pub struct TranslationCache {
    cache: Cache<String, String>,
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::with_ttl(Duration::from_secs(CACHE_TTL_SECS))
    }
}

impl TranslationCache {
    /// Build a cache with a custom entry lifetime.
    pub fn with_ttl(ttl: Duration) -> Self {
        TranslationCache {
            cache: Cache::builder()
                .max_capacity(CACHE_MAX_CAPACITY)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, text: &str) -> Option<String> {
        self.cache.get(&cache_key(text)).await
    }

    pub async fn insert(&self, text: &str, translated: &str) {
        self.cache.insert(cache_key(text), translated.to_string()).await;
    }

    /// Drop every cached translation (all entries share the key prefix).
    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}

/// Cache-through translation front end.
///
/// Failures never surface: an unreachable provider or malformed response
/// yields an empty string and the caller's fallback chain takes over.
#[derive(Clone, Default)]
pub struct Translator {
    cache: TranslationCache,
}

impl Translator {
    /// Build a translator whose cache entries expire after `ttl`.
    pub fn with_cache_ttl(ttl: Duration) -> Self {
        Translator {
            cache: TranslationCache::with_ttl(ttl),
        }
    }

    /// Translate through the cache with the given provider.
    pub async fn translate(&self, provider: &dyn TranslationProvider, text: &str) -> String {
        if let Some(cached) = self.cache.get(text).await {
            debug!(provider = provider.name(), "translation cache hit");
            return cached;
        }

        match provider.translate(text).await {
            Ok(Some(translated)) if !translated.is_empty() => {
                self.cache.insert(text, &translated).await;
                translated
            }
            Ok(_) => String::new(),
            Err(e) => {
                debug!(provider = provider.name(), error = %e, "translation failed");
                String::new()
            }
        }
    }

    /// Drop every cached translation.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }
}

impl std::fmt::Debug for Translator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Translator").finish()
    }
}
