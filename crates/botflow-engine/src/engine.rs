use std::sync::{Arc, Mutex};

use botflow_spec::{BotSpec, WizardSession};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

use crate::action::ratelimit::RateLimiter;
use crate::action::sql::SqlExecutor;
use crate::config::EngineConfig;
use crate::context::Caller;
use crate::error::{EngineError, StoreError};
use crate::i18n::Localizer;
use crate::memory::{MemoryCounterStore, MemoryLocalization, UnconfiguredDataStore};
use crate::metrics::{EngineMetrics, MetricsSnapshot};
use crate::render::TextRenderer;
use crate::store::{CounterStore, DataStore, LocalizationSource, SessionStore, SpecLoader};

/// The conversation engine. One instance serves every bot; all per-user state
/// lives in the [`SessionStore`].
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) specs: Arc<dyn SpecLoader>,
    pub(crate) sessions: Arc<dyn SessionStore>,
    pub(crate) renderer: TextRenderer,
    pub(crate) sql: SqlExecutor,
    pub(crate) limiter: RateLimiter,
    pub(crate) metrics: Arc<EngineMetrics>,
    reloads: Option<Mutex<broadcast::Receiver<i64>>>,
}

pub struct EngineBuilder {
    config: EngineConfig,
    specs: Arc<dyn SpecLoader>,
    sessions: Arc<dyn SessionStore>,
    counters: Option<Arc<dyn CounterStore>>,
    data_store: Option<Arc<dyn DataStore>>,
    localization: Option<Arc<dyn LocalizationSource>>,
}

impl EngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn counters(mut self, counters: Arc<dyn CounterStore>) -> Self {
        self.counters = Some(counters);
        self
    }

    pub fn data_store(mut self, data_store: Arc<dyn DataStore>) -> Self {
        self.data_store = Some(data_store);
        self
    }

    pub fn localization(mut self, localization: Arc<dyn LocalizationSource>) -> Self {
        self.localization = Some(localization);
        self
    }

    pub fn build(self) -> Engine {
        let metrics = Arc::new(EngineMetrics::default());
        let store_timeout = self.config.store_timeout();
        let localization = self
            .localization
            .unwrap_or_else(|| Arc::new(MemoryLocalization::new()));
        let counters = self
            .counters
            .unwrap_or_else(|| Arc::new(MemoryCounterStore::new()));
        let data_store = self
            .data_store
            .unwrap_or_else(|| Arc::new(UnconfiguredDataStore));
        Engine {
            renderer: TextRenderer::new(
                Localizer::new(localization, store_timeout),
                Arc::clone(&metrics),
            ),
            sql: SqlExecutor::new(
                data_store,
                self.config.datastore_timeout(),
                self.config.sql_row_cap,
            ),
            limiter: RateLimiter::new(counters, store_timeout),
            reloads: self.specs.subscribe_reloads().map(Mutex::new),
            specs: self.specs,
            sessions: self.sessions,
            config: self.config,
            metrics,
        }
    }
}

impl Engine {
    pub fn builder(specs: Arc<dyn SpecLoader>, sessions: Arc<dyn SessionStore>) -> EngineBuilder {
        EngineBuilder {
            config: EngineConfig::default(),
            specs,
            sessions,
            counters: None,
            data_store: None,
            localization: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn renderer(&self) -> &TextRenderer {
        &self.renderer
    }

    /// Reload signal for a bot's spec; drops its cached catalogues.
    pub fn invalidate_bot(&self, bot_id: i64) {
        debug!(bot_id, "invalidating cached catalogues");
        self.renderer.localizer().invalidate(bot_id);
    }

    /// Applies reload notifications published by the spec loader since the
    /// last turn.
    fn drain_reloads(&self) {
        let Some(reloads) = &self.reloads else {
            return;
        };
        let Ok(mut receiver) = reloads.lock() else {
            return;
        };
        loop {
            match receiver.try_recv() {
                Ok(bot_id) => self.invalidate_bot(bot_id),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "reload notifications lagged, dropping all cached catalogues");
                    self.renderer.localizer().invalidate_all();
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }

    pub(crate) async fn load_spec(&self, bot_id: i64) -> Result<Arc<BotSpec>, EngineError> {
        self.drain_reloads();
        let timeout = self.config.store_timeout();
        match tokio::time::timeout(timeout, self.specs.load_spec(bot_id)).await {
            Ok(Ok(spec)) => Ok(spec),
            Ok(Err(source)) => Err(EngineError::SpecUnavailable { bot_id, source }),
            Err(_) => Err(EngineError::SpecUnavailable {
                bot_id,
                source: StoreError::Timeout(timeout),
            }),
        }
    }

    /// Active session of `caller`. Corrupt, outdated or finished sessions are
    /// deleted and reported as absent.
    pub(crate) async fn load_session(
        &self,
        caller: &Caller,
    ) -> Result<Option<WizardSession>, EngineError> {
        let timeout = self.config.store_timeout();
        let loaded = tokio::time::timeout(timeout, self.sessions.get(caller.bot_id, caller.user_id))
            .await
            .map_err(|_| StoreError::Timeout(timeout))?;
        let session = match loaded {
            Ok(session) => session,
            Err(StoreError::Corrupt(reason)) => {
                warn!(bot_id = caller.bot_id, user_id = caller.user_id, %reason, "discarding corrupt session");
                self.delete_session(caller).await?;
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        match session {
            Some(session) if session.is_usable() => Ok(Some(session)),
            Some(session) => {
                warn!(
                    bot_id = caller.bot_id,
                    user_id = caller.user_id,
                    format_version = session.format_version,
                    step_index = session.step_index,
                    "discarding unusable session"
                );
                self.delete_session(caller).await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub(crate) async fn save_session(
        &self,
        caller: &Caller,
        session: &WizardSession,
    ) -> Result<(), EngineError> {
        let timeout = self.config.store_timeout();
        tokio::time::timeout(
            timeout,
            self.sessions
                .set(caller.bot_id, caller.user_id, session, session.ttl_sec),
        )
        .await
        .map_err(|_| StoreError::Timeout(timeout))??;
        Ok(())
    }

    pub(crate) async fn delete_session(&self, caller: &Caller) -> Result<(), EngineError> {
        let timeout = self.config.store_timeout();
        tokio::time::timeout(timeout, self.sessions.delete(caller.bot_id, caller.user_id))
            .await
            .map_err(|_| StoreError::Timeout(timeout))??;
        Ok(())
    }
}
