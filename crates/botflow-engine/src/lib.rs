//! Conversation engine for declaratively specified bots.
//!
//! An [`Engine`] turns inbound text and callback tokens into
//! [`RenderedReply`] values by interpreting a [`botflow_spec::BotSpec`]:
//! menus, multi-step wizards with inline widgets, and the actions hooked
//! into them. Storage, data access and localization are reached through
//! the traits in [`store`].

pub mod action;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod i18n;
pub mod memory;
pub mod metrics;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod render;
pub mod reply;
pub mod router;
pub mod store;
pub mod template;
pub mod widget;
pub mod wizard;

pub use action::sql_guard::{BoundStatement, SqlValue, StatementKind};
pub use action::{Hook, HookOutcome};
pub use config::EngineConfig;
pub use context::{Caller, ExecContext};
pub use engine::{Engine, EngineBuilder};
pub use error::{ActionError, ConfigError, DataStoreError, EngineError, StoreError};
pub use i18n::Localizer;
pub use memory::{
    MemoryCounterStore, MemoryLocalization, MemorySessionStore, StaticSpecLoader,
    UnconfiguredDataStore,
};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use reply::{Button, Keyboard, KeyboardKind, RenderedReply};
pub use store::{
    Catalogue, CounterStore, DataStore, LocalizationSource, Row, SessionStore, SpecLoader,
};
pub use widget::token::CallbackToken;
