//! Collaborator seams. Hosts plug their own backends in behind these traits.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use botflow_spec::{BotSpec, WizardSession};
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::action::sql_guard::BoundStatement;
use crate::error::{DataStoreError, StoreError};

/// One result row; column order is the order the driver reported.
pub type Row = IndexMap<String, Value>;

/// Flat `key -> text` message catalogue for one locale.
pub type Catalogue = BTreeMap<String, String>;

#[async_trait]
pub trait SpecLoader: Send + Sync {
    async fn load_spec(&self, bot_id: i64) -> Result<Arc<BotSpec>, StoreError>;

    /// Stream of bot ids whose spec was reloaded. Loaders that never reload
    /// keep the default.
    fn subscribe_reloads(&self) -> Option<broadcast::Receiver<i64>> {
        None
    }
}

/// Per-`(bot_id, user_id)` wizard session storage with expiry.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, bot_id: i64, user_id: i64) -> Result<Option<WizardSession>, StoreError>;
    async fn set(
        &self,
        bot_id: i64,
        user_id: i64,
        session: &WizardSession,
        ttl_sec: u64,
    ) -> Result<(), StoreError>;
    async fn delete(&self, bot_id: i64, user_id: i64) -> Result<(), StoreError>;
}

/// Expiring counters backing rate limits.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increments `key`, starting a `window_s` expiry when the key is new.
    async fn increment(&self, key: &str, window_s: u64) -> Result<u64, StoreError>;
    /// Seconds until `key` expires, `None` when it does not exist.
    async fn ttl(&self, key: &str) -> Result<Option<u64>, StoreError>;
}

/// Relational data access. Statements arrive already guarded with positional binds.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn query(&self, statement: &BoundStatement) -> Result<Vec<Row>, DataStoreError>;
    async fn execute(&self, statement: &BoundStatement) -> Result<u64, DataStoreError>;
}

#[async_trait]
pub trait LocalizationSource: Send + Sync {
    /// Catalogue for `locale`, `None` when the bot has none for it.
    async fn catalogue(&self, bot_id: i64, locale: &str) -> Result<Option<Catalogue>, StoreError>;
    /// Preferred locale of a user, if known.
    async fn user_locale(&self, bot_id: i64, user_id: i64) -> Result<Option<String>, StoreError>;
}
