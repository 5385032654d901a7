use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use botflow_spec::{LocaleConfig, LocaleStrategy};
use dashmap::DashMap;
use tracing::{debug, warn};
use unic_langid::LanguageIdentifier;

use crate::store::{Catalogue, LocalizationSource};

/// Normalises `en_US.UTF-8`, `pt_br` and friends into BCP-47 form.
pub fn normalize_locale(raw: &str) -> Option<String> {
    let mut cleaned = raw.trim();
    if cleaned.is_empty() {
        return None;
    }
    if let Some((head, _)) = cleaned.split_once('.') {
        cleaned = head;
    }
    if let Some((head, _)) = cleaned.split_once('@') {
        cleaned = head;
    }
    let cleaned = cleaned.replace('_', "-");
    cleaned
        .parse::<LanguageIdentifier>()
        .ok()
        .map(|lid| lid.to_string())
}

fn base_language(locale: &str) -> &str {
    locale.split('-').next().unwrap_or(locale)
}

fn resolve_supported(candidate: &str, config: &LocaleConfig) -> Option<String> {
    let norm = normalize_locale(candidate)?;
    if config.is_supported(&norm) {
        return Some(norm);
    }
    let base = base_language(&norm).to_ascii_lowercase();
    config.is_supported(&base).then_some(base)
}

/// Replaces `{name}` placeholders.
pub fn interpolate(template: &str, placeholders: &BTreeMap<String, String>) -> String {
    let mut out = template.to_string();
    for (name, value) in placeholders {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}

/// Catalogue lookups with a per-`(bot_id, locale)` cache.
pub struct Localizer {
    source: Arc<dyn LocalizationSource>,
    cache: DashMap<(i64, String), Arc<Catalogue>>,
    timeout: Duration,
}

impl Localizer {
    pub fn new(source: Arc<dyn LocalizationSource>, timeout: Duration) -> Self {
        Self {
            source,
            cache: DashMap::new(),
            timeout,
        }
    }

    /// Locale for a turn: the user's preference when the strategy asks for it
    /// and it is supported, otherwise the bot default.
    pub async fn select_locale(&self, bot_id: i64, user_id: i64, config: &LocaleConfig) -> String {
        if config.strategy == LocaleStrategy::Default {
            return config.default_locale.clone();
        }
        let preferred = tokio::time::timeout(self.timeout, self.source.user_locale(bot_id, user_id)).await;
        match preferred {
            Ok(Ok(Some(raw))) => resolve_supported(&raw, config).unwrap_or_else(|| {
                debug!(bot_id, user_id, locale = %raw, "user locale unsupported, using default");
                config.default_locale.clone()
            }),
            Ok(Ok(None)) => config.default_locale.clone(),
            Ok(Err(err)) => {
                warn!(bot_id, user_id, error = %err, "user locale lookup failed");
                config.default_locale.clone()
            }
            Err(_) => {
                warn!(bot_id, user_id, "user locale lookup timed out");
                config.default_locale.clone()
            }
        }
    }

    /// Looks `key` up in `locale`, then in its base language.
    pub async fn translate(
        &self,
        bot_id: i64,
        key: &str,
        locale: &str,
        placeholders: &BTreeMap<String, String>,
    ) -> Option<String> {
        let mut candidates = vec![locale];
        let base = base_language(locale);
        if base != locale {
            candidates.push(base);
        }
        for candidate in candidates {
            if let Some(catalogue) = self.catalogue(bot_id, candidate).await
                && let Some(text) = catalogue.get(key)
            {
                return Some(interpolate(text, placeholders));
            }
        }
        debug!(bot_id, key, locale, "localization miss");
        None
    }

    /// Like [`Localizer::translate`], rendering a miss as `[key]`.
    pub async fn translate_or_marker(
        &self,
        bot_id: i64,
        key: &str,
        locale: &str,
        placeholders: &BTreeMap<String, String>,
    ) -> String {
        self.translate(bot_id, key, locale, placeholders)
            .await
            .unwrap_or_else(|| format!("[{key}]"))
    }

    /// Engine-owned message: catalogue override when present, else `fallback`.
    pub async fn text_or(
        &self,
        bot_id: i64,
        locale: &str,
        key: &str,
        fallback: &str,
        placeholders: &BTreeMap<String, String>,
    ) -> String {
        match self.translate(bot_id, key, locale, placeholders).await {
            Some(text) => text,
            None => interpolate(fallback, placeholders),
        }
    }

    /// Drops cached catalogues of `bot_id`; called when its spec is reloaded.
    pub fn invalidate(&self, bot_id: i64) {
        self.cache.retain(|(cached_bot, _), _| *cached_bot != bot_id);
    }

    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    async fn catalogue(&self, bot_id: i64, locale: &str) -> Option<Arc<Catalogue>> {
        let cache_key = (bot_id, locale.to_string());
        if let Some(hit) = self.cache.get(&cache_key) {
            return Some(Arc::clone(hit.value()));
        }
        match tokio::time::timeout(self.timeout, self.source.catalogue(bot_id, locale)).await {
            Ok(Ok(found)) => {
                let catalogue = Arc::new(found.unwrap_or_default());
                self.cache.insert(cache_key, Arc::clone(&catalogue));
                Some(catalogue)
            }
            Ok(Err(err)) => {
                warn!(bot_id, locale, error = %err, "catalogue fetch failed");
                None
            }
            Err(_) => {
                warn!(bot_id, locale, "catalogue fetch timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLocalization;

    fn catalogue(pairs: &[(&str, &str)]) -> Catalogue {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn normalizes_posix_locales() {
        assert_eq!(normalize_locale("en_US.UTF-8").as_deref(), Some("en-US"));
        assert_eq!(normalize_locale("  "), None);
    }

    #[tokio::test]
    async fn translate_falls_back_to_base_language_then_marker() {
        let source = MemoryLocalization::new()
            .with_catalogue(1, "pt", catalogue(&[("hello", "Olá {name}")]));
        let localizer = Localizer::new(Arc::new(source), Duration::from_secs(1));
        let mut placeholders = BTreeMap::new();
        placeholders.insert("name".to_string(), "Ana".to_string());

        let text = localizer.translate_or_marker(1, "hello", "pt-BR", &placeholders).await;
        assert_eq!(text, "Olá Ana");
        let missing = localizer.translate_or_marker(1, "bye", "pt-BR", &placeholders).await;
        assert_eq!(missing, "[bye]");
    }

    #[tokio::test]
    async fn catalogues_are_cached_until_invalidated() {
        let source = Arc::new(
            MemoryLocalization::new().with_catalogue(1, "en", catalogue(&[("k", "v1")])),
        );
        let localizer = Localizer::new(source.clone(), Duration::from_secs(1));
        let none = BTreeMap::new();

        assert_eq!(localizer.translate(1, "k", "en", &none).await.as_deref(), Some("v1"));
        source.set_catalogue(1, "en", catalogue(&[("k", "v2")]));
        assert_eq!(localizer.translate(1, "k", "en", &none).await.as_deref(), Some("v1"));
        assert_eq!(source.fetch_count(), 1);

        localizer.invalidate(1);
        assert_eq!(localizer.translate(1, "k", "en", &none).await.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn user_strategy_respects_supported_set() {
        let source = Arc::new(MemoryLocalization::new());
        source.set_user_locale(1, 10, "de_DE");
        source.set_user_locale(1, 11, "fr");
        let localizer = Localizer::new(source, Duration::from_secs(1));
        let config = LocaleConfig {
            default_locale: "en".into(),
            supported: ["en".to_string(), "de".to_string()].into_iter().collect(),
            strategy: LocaleStrategy::User,
        };
        assert_eq!(localizer.select_locale(1, 10, &config).await, "de");
        assert_eq!(localizer.select_locale(1, 11, &config).await, "en");
        assert_eq!(localizer.select_locale(1, 12, &config).await, "en");
    }
}
