use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// How the reply locale is picked for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocaleStrategy {
    /// Always use `default_locale`.
    #[default]
    Default,
    /// Ask the localization source for the user's stored locale.
    User,
}

/// Per-bot localization settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleConfig {
    #[serde(default = "default_locale")]
    pub default_locale: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub supported: BTreeSet<String>,
    #[serde(default)]
    pub strategy: LocaleStrategy,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            default_locale: default_locale(),
            supported: BTreeSet::new(),
            strategy: LocaleStrategy::Default,
        }
    }
}

impl LocaleConfig {
    /// True when `locale` may be served. An empty `supported` set only admits the default.
    pub fn is_supported(&self, locale: &str) -> bool {
        locale == self.default_locale || self.supported.contains(locale)
    }
}

fn default_locale() -> String {
    "en".into()
}
