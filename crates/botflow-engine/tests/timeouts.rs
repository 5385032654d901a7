mod common;

use std::sync::Arc;

use async_trait::async_trait;
use botflow_engine::{
    BoundStatement, CounterStore, DataStore, DataStoreError, Engine, MemorySessionStore, Row,
    SessionStore, StaticSpecLoader, StoreError,
};
use botflow_spec::WizardSession;
use common::{BOT, USER, harness_with, spec};
use serde_json::{Value, json};

const GENERIC_ERROR: &str = "Something went wrong. Please try again.";

/// Backend that accepts the call and never answers.
struct Unresponsive;

#[async_trait]
impl DataStore for Unresponsive {
    async fn query(&self, _statement: &BoundStatement) -> Result<Vec<Row>, DataStoreError> {
        std::future::pending().await
    }

    async fn execute(&self, _statement: &BoundStatement) -> Result<u64, DataStoreError> {
        std::future::pending().await
    }
}

#[async_trait]
impl CounterStore for Unresponsive {
    async fn increment(&self, _key: &str, _window_s: u64) -> Result<u64, StoreError> {
        std::future::pending().await
    }

    async fn ttl(&self, _key: &str) -> Result<Option<u64>, StoreError> {
        std::future::pending().await
    }
}

#[async_trait]
impl SessionStore for Unresponsive {
    async fn get(&self, _bot_id: i64, _user_id: i64) -> Result<Option<WizardSession>, StoreError> {
        std::future::pending().await
    }

    async fn set(
        &self,
        _bot_id: i64,
        _user_id: i64,
        _session: &WizardSession,
        _ttl_sec: u64,
    ) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn delete(&self, _bot_id: i64, _user_id: i64) -> Result<(), StoreError> {
        std::future::pending().await
    }
}

fn booking_spec() -> Value {
    json!({
        "flows": [{
            "entry_cmd": "/book",
            "type": "wizard",
            "params": {
                "steps": [
                    {"ask": "Name?", "var": "name"},
                    {"ask": "Phone?", "var": "phone"}
                ],
                "on_enter": [{
                    "type": "policy.ratelimit",
                    "params": {"scope": "user", "window_s": 60, "allowance": 1}
                }],
                "on_step": [{
                    "type": "action.sql_exec",
                    "params": {"sql": "INSERT INTO drafts (owner, name) VALUES (:user_id, :name)"}
                }]
            }
        }]
    })
}

#[tokio::test(start_paused = true)]
async fn stalled_data_store_fails_the_step_without_advancing() {
    let h = harness_with(booking_spec(), Some(Arc::new(Unresponsive)), None);
    assert_eq!(h.engine.handle(BOT, USER, "/book").await.text, "Name?");

    assert_eq!(h.engine.handle(BOT, USER, "Alice").await.text, GENERIC_ERROR);
    let session = h.sessions.get(BOT, USER).await.unwrap().expect("session kept");
    assert_eq!(session.step_index, 0);
    assert!(session.vars.is_empty());
    assert_eq!(h.engine.metrics().action_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn stalled_counter_store_fails_open() {
    let specs = Arc::new(StaticSpecLoader::new().with_spec(BOT, spec(booking_spec())));
    let engine = Engine::builder(specs, Arc::new(MemorySessionStore::new()))
        .counters(Arc::new(Unresponsive))
        .build();

    for _ in 0..3 {
        assert_eq!(engine.handle(BOT, USER, "/book").await.text, "Name?");
    }
    assert_eq!(engine.metrics().rate_limited, 0);
}

#[tokio::test(start_paused = true)]
async fn stalled_session_store_yields_generic_reply() {
    let specs = Arc::new(StaticSpecLoader::new().with_spec(BOT, spec(booking_spec())));
    let engine = Engine::builder(specs, Arc::new(Unresponsive)).build();

    assert_eq!(engine.handle(BOT, USER, "hello").await.text, GENERIC_ERROR);
    assert_eq!(
        engine.handle_callback(BOT, USER, "pg:next:1:1000:1").await,
        Some(botflow_engine::RenderedReply::text(GENERIC_ERROR))
    );
}
