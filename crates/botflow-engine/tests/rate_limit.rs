mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use botflow_engine::{
    CounterStore, Engine, MemorySessionStore, SessionStore, StaticSpecLoader, StoreError,
};
use common::{BOT, USER, harness, spec};
use serde_json::{Value, json};

fn limited_spec() -> Value {
    let flow = |cmd: &str, suffix: &str| {
        json!({
            "entry_cmd": cmd,
            "type": "wizard",
            "params": {
                "steps": [{"ask": "Which slot?", "var": "slot"}],
                "on_enter": [{
                    "type": "policy.ratelimit",
                    "params": {
                        "scope": "user",
                        "window_s": 10,
                        "allowance": 2,
                        "key_suffix": suffix,
                        "message": "Slow down, retry in {{retry_in}}s"
                    }
                }]
            }
        })
    };
    json!({ "flows": [flow("/a", "booking"), flow("/b", "other")] })
}

fn retry_in(reply: &botflow_engine::RenderedReply) -> u64 {
    reply.meta.as_ref().and_then(|meta| meta["retry_in"].as_u64()).expect("retry_in")
}

#[tokio::test(start_paused = true)]
async fn third_call_in_window_is_blocked() {
    let h = harness(limited_spec());

    assert_eq!(h.engine.handle(BOT, USER, "/a").await.text, "Which slot?");
    assert_eq!(h.engine.handle(BOT, USER, "/a").await.text, "Which slot?");
    let blocked = h.engine.handle(BOT, USER, "/a").await;
    assert!(blocked.text.starts_with("Slow down, retry in "), "{}", blocked.text);
    let wait = retry_in(&blocked);
    assert!(wait > 0 && wait <= 10);
    assert_eq!(h.engine.metrics().rate_limited, 1);

    tokio::time::advance(Duration::from_secs(11)).await;
    assert_eq!(h.engine.handle(BOT, USER, "/a").await.text, "Which slot?");
}

#[tokio::test(start_paused = true)]
async fn different_suffixes_use_separate_counters() {
    let h = harness(limited_spec());
    for _ in 0..2 {
        h.engine.handle(BOT, USER, "/a").await;
    }
    assert!(h.engine.handle(BOT, USER, "/a").await.text.starts_with("Slow down"));
    assert_eq!(h.engine.handle(BOT, USER, "/b").await.text, "Which slot?");
    assert_eq!(h.engine.handle(BOT, USER + 1, "/a").await.text, "Which slot?");
}

#[tokio::test(start_paused = true)]
async fn blocked_step_does_not_advance() {
    let h = harness(json!({
        "flows": [{
            "entry_cmd": "/vote",
            "type": "wizard",
            "params": {
                "steps": [{"ask": "Pick", "var": "choice"}, {"ask": "Sure?", "var": "ok"}],
                "on_step": [{
                    "type": "policy.ratelimit",
                    "params": {"scope": "chat", "window_s": 30, "allowance": 0}
                }]
            }
        }]
    }));
    h.engine.handle(BOT, USER, "/vote").await;

    let blocked = h.engine.handle(BOT, USER, "red").await;
    assert!(blocked.text.starts_with("Too many requests. Try again in "));
    let session = h.sessions.get(BOT, USER).await.unwrap().expect("session");
    assert_eq!(session.step_index, 0);
    assert!(session.vars.is_empty());
}

struct BrokenCounters;

#[async_trait]
impl CounterStore for BrokenCounters {
    async fn increment(&self, _key: &str, _window_s: u64) -> Result<u64, StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }

    async fn ttl(&self, _key: &str) -> Result<Option<u64>, StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
}

#[tokio::test]
async fn unreachable_counter_store_fails_open() {
    let specs = Arc::new(StaticSpecLoader::new().with_spec(BOT, spec(limited_spec())));
    let engine = Engine::builder(specs, Arc::new(MemorySessionStore::new()))
        .counters(Arc::new(BrokenCounters))
        .build();

    for _ in 0..5 {
        assert_eq!(engine.handle(BOT, USER, "/a").await.text, "Which slot?");
    }
    assert_eq!(engine.metrics().rate_limited, 0);
}
