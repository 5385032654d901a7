//! In-process collaborator implementations used by the CLI and tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use botflow_spec::{BotSpec, WizardSession};
use dashmap::DashMap;
use tokio::sync::{Mutex, broadcast};
use tokio::time::Instant;
use tracing::debug;

use crate::action::sql_guard::BoundStatement;
use crate::error::{DataStoreError, StoreError};
use crate::store::{
    Catalogue, CounterStore, DataStore, LocalizationSource, Row, SessionStore, SpecLoader,
};

const RELOAD_CHANNEL_CAPACITY: usize = 64;

/// Specs held in memory; `replace` is the reload path and notifies
/// subscribers with the bot id.
pub struct StaticSpecLoader {
    specs: DashMap<i64, Arc<BotSpec>>,
    reloads: broadcast::Sender<i64>,
}

impl Default for StaticSpecLoader {
    fn default() -> Self {
        let (reloads, _) = broadcast::channel(RELOAD_CHANNEL_CAPACITY);
        Self {
            specs: DashMap::new(),
            reloads,
        }
    }
}

impl StaticSpecLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spec(self, bot_id: i64, spec: BotSpec) -> Self {
        self.replace(bot_id, spec);
        self
    }

    pub fn replace(&self, bot_id: i64, spec: BotSpec) {
        self.specs.insert(bot_id, Arc::new(spec));
        // No subscribers yet is fine.
        let _ = self.reloads.send(bot_id);
    }
}

#[async_trait]
impl SpecLoader for StaticSpecLoader {
    async fn load_spec(&self, bot_id: i64) -> Result<Arc<BotSpec>, StoreError> {
        self.specs
            .get(&bot_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StoreError::Backend(format!("no spec registered for bot {bot_id}")))
    }

    fn subscribe_reloads(&self) -> Option<broadcast::Receiver<i64>> {
        Some(self.reloads.subscribe())
    }
}

/// Sessions are kept serialized so every turn goes through the same JSON
/// round trip an external store would impose.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<(i64, i64), (String, Instant)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|(_, expires)| *expires > now).count()
    }

    /// Stores raw JSON as-is, for exercising corrupt or outdated records.
    pub async fn insert_raw(&self, bot_id: i64, user_id: i64, raw: impl Into<String>, ttl_sec: u64) {
        let expires = Instant::now() + Duration::from_secs(ttl_sec);
        self.entries
            .lock()
            .await
            .insert((bot_id, user_id), (raw.into(), expires));
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, bot_id: i64, user_id: i64) -> Result<Option<WizardSession>, StoreError> {
        let mut entries = self.entries.lock().await;
        let Some((raw, expires)) = entries.get(&(bot_id, user_id)) else {
            return Ok(None);
        };
        if *expires <= Instant::now() {
            entries.remove(&(bot_id, user_id));
            return Ok(None);
        }
        WizardSession::from_json(raw)
            .map(Some)
            .map_err(|err| StoreError::Corrupt(err.to_string()))
    }

    async fn set(
        &self,
        bot_id: i64,
        user_id: i64,
        session: &WizardSession,
        ttl_sec: u64,
    ) -> Result<(), StoreError> {
        let raw = session
            .to_json()
            .map_err(|err| StoreError::Corrupt(err.to_string()))?;
        let expires = Instant::now() + Duration::from_secs(ttl_sec);
        self.entries
            .lock()
            .await
            .insert((bot_id, user_id), (raw, expires));
        Ok(())
    }

    async fn delete(&self, bot_id: i64, user_id: i64) -> Result<(), StoreError> {
        self.entries.lock().await.remove(&(bot_id, user_id));
        Ok(())
    }
}

/// Expired windows are swept once every this many increments.
const COUNTER_SWEEP_EVERY: u64 = 256;

#[derive(Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<String, (u64, Instant)>>,
    increments: AtomicU64,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked keys, expired or not.
    pub async fn len(&self) -> usize {
        self.counters.lock().await.len()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str, window_s: u64) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut counters = self.counters.lock().await;
        if (self.increments.fetch_add(1, Ordering::Relaxed) + 1) % COUNTER_SWEEP_EVERY == 0 {
            let before = counters.len();
            counters.retain(|_, (_, expires)| *expires > now);
            debug!(swept = before - counters.len(), "expired rate-limit windows dropped");
        }
        let entry = counters
            .entry(key.to_string())
            .or_insert((0, now + Duration::from_secs(window_s)));
        if entry.1 <= now {
            *entry = (0, now + Duration::from_secs(window_s));
        }
        entry.0 += 1;
        Ok(entry.0)
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let now = Instant::now();
        let counters = self.counters.lock().await;
        Ok(counters.get(key).and_then(|(_, expires)| {
            let remaining = expires.checked_duration_since(now)?;
            if remaining.is_zero() {
                return None;
            }
            Some(remaining.as_millis().div_ceil(1000) as u64)
        }))
    }
}

/// Data store for hosts without a database. Every statement fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredDataStore;

#[async_trait]
impl DataStore for UnconfiguredDataStore {
    async fn query(&self, statement: &BoundStatement) -> Result<Vec<Row>, DataStoreError> {
        debug!(sql = %statement.sql, "query rejected without data store");
        Err(DataStoreError::Connection("no data store configured".into()))
    }

    async fn execute(&self, statement: &BoundStatement) -> Result<u64, DataStoreError> {
        debug!(sql = %statement.sql, "statement rejected without data store");
        Err(DataStoreError::Connection("no data store configured".into()))
    }
}

/// Catalogues and user locales held in memory. Counts catalogue fetches so
/// cache behaviour is observable.
#[derive(Default)]
pub struct MemoryLocalization {
    catalogues: DashMap<(i64, String), Catalogue>,
    user_locales: DashMap<(i64, i64), String>,
    fetches: AtomicUsize,
}

impl MemoryLocalization {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalogue(self, bot_id: i64, locale: &str, catalogue: Catalogue) -> Self {
        self.set_catalogue(bot_id, locale, catalogue);
        self
    }

    pub fn set_catalogue(&self, bot_id: i64, locale: &str, catalogue: Catalogue) {
        self.catalogues.insert((bot_id, locale.to_string()), catalogue);
    }

    pub fn set_user_locale(&self, bot_id: i64, user_id: i64, locale: impl Into<String>) {
        self.user_locales.insert((bot_id, user_id), locale.into());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LocalizationSource for MemoryLocalization {
    async fn catalogue(&self, bot_id: i64, locale: &str) -> Result<Option<Catalogue>, StoreError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .catalogues
            .get(&(bot_id, locale.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn user_locale(&self, bot_id: i64, user_id: i64) -> Result<Option<String>, StoreError> {
        Ok(self
            .user_locales
            .get(&(bot_id, user_id))
            .map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn counter_resets_after_window() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.increment("k", 10).await.unwrap(), 1);
        assert_eq!(store.increment("k", 10).await.unwrap(), 2);
        assert_eq!(store.ttl("k").await.unwrap(), Some(10));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(store.ttl("k").await.unwrap(), Some(6));

        tokio::time::advance(Duration::from_secs(7)).await;
        assert_eq!(store.ttl("k").await.unwrap(), None);
        assert_eq!(store.increment("k", 10).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_windows_are_swept() {
        let store = MemoryCounterStore::new();
        for suffix in 0..10 {
            store.increment(&format!("rl:1:2:{suffix}"), 1).await.unwrap();
        }
        tokio::time::advance(Duration::from_secs(5)).await;

        for _ in 10..COUNTER_SWEEP_EVERY {
            store.increment("rl:1:2:live", 60).await.unwrap();
        }
        assert_eq!(store.len().await, 1);
        assert_eq!(store.ttl("rl:1:2:live").await.unwrap(), Some(60));
    }

    #[tokio::test]
    async fn replace_notifies_reload_subscribers() {
        let loader = StaticSpecLoader::new();
        let mut reloads = loader.subscribe_reloads().expect("reload channel");
        loader.replace(7, BotSpec::default());
        assert_eq!(reloads.try_recv().unwrap(), 7);
    }
}
