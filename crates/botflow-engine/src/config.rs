use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables of the engine. Every field has a default so partial TOML files work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// TTL applied when a wizard does not set `ttl_sec`.
    pub default_session_ttl_sec: u64,
    /// Row cap appended to queries without an explicit `LIMIT`.
    pub sql_row_cap: usize,
    /// Timeout for session, counter, spec and localization store calls.
    pub store_timeout_ms: u64,
    /// Timeout for data-store statements.
    pub datastore_timeout_ms: u64,
    /// Rows scanned when verifying a pagination selection against a SQL source.
    pub pagination_scan_limit: usize,
    /// Timezone used by calendars that do not set `tz`.
    pub calendar_default_tz: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_session_ttl_sec: 3600,
            sql_row_cap: 100,
            store_timeout_ms: 2_000,
            datastore_timeout_ms: 5_000,
            pagination_scan_limit: 500,
            calendar_default_tz: "UTC".into(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(raw)?;
        config.check()?;
        Ok(config)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn datastore_timeout(&self) -> Duration {
        Duration::from_millis(self.datastore_timeout_ms)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.default_session_ttl_sec == 0 {
            return Err(ConfigError::Invalid(
                "default_session_ttl_sec must be positive".into(),
            ));
        }
        if self.sql_row_cap == 0 {
            return Err(ConfigError::Invalid("sql_row_cap must be positive".into()));
        }
        Ok(())
    }
}
