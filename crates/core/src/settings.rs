//! Persisted plugin settings.
//!
//! Every key is independently defaulted: an absent or malformed value never
//! fails a load, it just resolves to the default.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::slug::slugify;
use crate::store::VariableStore;

/// Variable keys.
pub mod keys {
    pub const CITY_NAME: &str = "pta_city_name";
    pub const BLOCKS: &str = "pta_blocks";
    pub const TRANSLATION_PROVIDER: &str = "pta_translation_provider";
    pub const MYMEMORY_API_KEY: &str = "pta_mymemory_api_key";
    pub const ASCII_FALLBACK: &str = "pta_ascii_fallback";
    pub const CHARSET_CONVERSION_ENABLED: &str = "pta_charset_conversion_enabled";
}

/// Default city display name.
pub const DEFAULT_CITY_NAME: &str = "XXXX市";

/// Translation provider selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProviderKind {
    MyMemory,
    Deepl,
    None,
}

impl TranslationProviderKind {
    /// Stored machine name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationProviderKind::MyMemory => "mymemory",
            TranslationProviderKind::Deepl => "deepl",
            TranslationProviderKind::None => "none",
        }
    }

    /// Parse a stored value; unknown selectors fall back to MyMemory.
    pub fn parse(s: &str) -> Self {
        match s {
            "deepl" => TranslationProviderKind::Deepl,
            "none" => TranslationProviderKind::None,
            _ => TranslationProviderKind::MyMemory,
        }
    }
}

/// Plugin settings snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// City display name.
    pub city_name: String,
    /// Ordered block slugs (de-duplicated on save).
    pub blocks: Vec<String>,
    /// Active translation provider.
    pub translation_provider: TranslationProviderKind,
    /// Optional MyMemory API key.
    pub mymemory_api_key: String,
    /// Romanize the title when translation produced nothing.
    pub ascii_fallback: bool,
    /// Master switch for character-reference conversion.
    pub charset_conversion_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            city_name: DEFAULT_CITY_NAME.to_string(),
            blocks: Vec::new(),
            translation_provider: TranslationProviderKind::MyMemory,
            mymemory_api_key: String::new(),
            ascii_fallback: true,
            charset_conversion_enabled: true,
        }
    }
}

impl Settings {
    /// Load settings, resolving absent or malformed keys to defaults.
    pub async fn load(variables: &dyn VariableStore) -> Result<Self> {
        let defaults = Settings::default();

        let city_name = variables
            .get(keys::CITY_NAME)
            .await?
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or(defaults.city_name);

        let blocks = variables
            .get(keys::BLOCKS)
            .await?
            .and_then(|v| serde_json::from_value::<Vec<String>>(v).ok())
            .unwrap_or(defaults.blocks);

        let translation_provider = variables
            .get(keys::TRANSLATION_PROVIDER)
            .await?
            .and_then(|v| v.as_str().map(TranslationProviderKind::parse))
            .unwrap_or(defaults.translation_provider);

        let mymemory_api_key = variables
            .get(keys::MYMEMORY_API_KEY)
            .await?
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or(defaults.mymemory_api_key);

        let ascii_fallback = variables
            .get(keys::ASCII_FALLBACK)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(defaults.ascii_fallback);

        let charset_conversion_enabled = variables
            .get(keys::CHARSET_CONVERSION_ENABLED)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(defaults.charset_conversion_enabled);

        Ok(Settings {
            city_name,
            blocks,
            translation_provider,
            mymemory_api_key,
            ascii_fallback,
            charset_conversion_enabled,
        })
    }

    /// Persist settings, sanitizing the block list on the way down.
    pub async fn save(&self, variables: &dyn VariableStore) -> Result<()> {
        let blocks = sanitize_blocks(&self.blocks);

        variables
            .set(keys::CITY_NAME, serde_json::json!(self.city_name))
            .await?;
        variables.set(keys::BLOCKS, serde_json::json!(blocks)).await?;
        variables
            .set(
                keys::TRANSLATION_PROVIDER,
                serde_json::json!(self.translation_provider.as_str()),
            )
            .await?;
        variables
            .set(
                keys::MYMEMORY_API_KEY,
                serde_json::json!(self.mymemory_api_key),
            )
            .await?;
        variables
            .set(keys::ASCII_FALLBACK, serde_json::json!(self.ascii_fallback))
            .await?;
        variables
            .set(
                keys::CHARSET_CONVERSION_ENABLED,
                serde_json::json!(self.charset_conversion_enabled),
            )
            .await?;

        Ok(())
    }
}

/// Sanitize a block list: slugify each entry, drop empties, de-duplicate
/// while preserving order.
pub fn sanitize_blocks(blocks: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut sanitized = Vec::new();
    for block in blocks {
        let block = slugify(block);
        if !block.is_empty() && seen.insert(block.clone()) {
            sanitized.push(block);
        }
    }
    sanitized
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_round_trip() {
        for kind in [
            TranslationProviderKind::MyMemory,
            TranslationProviderKind::Deepl,
            TranslationProviderKind::None,
        ] {
            assert_eq!(TranslationProviderKind::parse(kind.as_str()), kind);
        }
    }

    #[test]
    fn unknown_provider_falls_back_to_mymemory() {
        assert_eq!(
            TranslationProviderKind::parse("babelfish"),
            TranslationProviderKind::MyMemory
        );
    }

    #[test]
    fn sanitize_blocks_slugifies_and_dedupes() {
        let input = vec![
            "Ward 1".to_string(),
            "ward-1".to_string(),
            "".to_string(),
            "ward-2".to_string(),
            "!!".to_string(),
        ];
        assert_eq!(sanitize_blocks(&input), vec!["ward-1", "ward-2"]);
    }

    #[test]
    fn sanitize_blocks_preserves_order() {
        let input = vec!["ward-3".to_string(), "ward-1".to_string(), "ward-3".to_string()];
        assert_eq!(sanitize_blocks(&input), vec!["ward-3", "ward-1"]);
    }

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.city_name, DEFAULT_CITY_NAME);
        assert!(s.blocks.is_empty());
        assert_eq!(s.translation_provider, TranslationProviderKind::MyMemory);
        assert!(s.ascii_fallback);
        assert!(s.charset_conversion_enabled);
    }
}
