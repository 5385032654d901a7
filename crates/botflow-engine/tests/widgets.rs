mod common;

use std::sync::Arc;

use botflow_engine::{KeyboardKind, SessionStore};
use common::{BOT, USER, ScriptedDataStore, harness, harness_with};
use serde_json::{Value, json};

fn calendar_spec(mode: &str) -> Value {
    json!({
        "flows": [{
            "entry_cmd": "/book",
            "type": "wizard",
            "params": {
                "steps": [{
                    "widget": {"type": "calendar", "mode": mode, "text": "When?"},
                    "var": "when"
                }],
                "on_complete": [
                    {"type": "action.reply_template", "params": {"text": "Booked {{when}}"}}
                ]
            }
        }]
    })
}

#[tokio::test]
async fn calendar_prompt_is_an_inline_month_grid() {
    let h = harness(calendar_spec("date"));
    let reply = h.engine.handle(BOT, USER, "/book").await;
    assert_eq!(reply.text, "When?");
    let keyboard = reply.keyboard.expect("calendar keyboard");
    assert_eq!(keyboard.kind, KeyboardKind::Inline);
    assert!(keyboard.tokens().any(|t| t.starts_with("cal_date:1:1000:")));
    assert_eq!(reply.meta.expect("meta")["view"], "month");
}

#[tokio::test]
async fn date_mode_advances_on_first_pick() {
    let h = harness(calendar_spec("date"));
    h.engine.handle(BOT, USER, "/book").await;

    let reply = h
        .engine
        .handle_callback(BOT, USER, "cal_date:1:1000:2031-03-14:date:when")
        .await
        .expect("reply");
    assert_eq!(reply.text, "Booked 2031-03-14");
    assert!(h.sessions.get(BOT, USER).await.unwrap().is_none());
}

#[tokio::test]
async fn datetime_mode_needs_date_then_time() {
    let h = harness(calendar_spec("datetime"));
    h.engine.handle(BOT, USER, "/book").await;

    let times = h
        .engine
        .handle_callback(BOT, USER, "cal_date:1:1000:2031-03-14:datetime:when")
        .await
        .expect("time grid");
    assert_eq!(times.text, "Pick a time for 2031-03-14:");
    assert!(times.keyboard.expect("keyboard").tokens().any(|t| t == "cal_time:1:1000:2031-03-14:10-00:when"));
    let session = h.sessions.get(BOT, USER).await.unwrap().expect("still running");
    assert_eq!(session.step_index, 0);

    let done = h
        .engine
        .handle_callback(BOT, USER, "cal_time:1:1000:2031-03-14:10-00:when")
        .await
        .expect("reply");
    assert_eq!(done.text, "Booked 2031-03-14 10:00");
}

#[tokio::test]
async fn calendar_navigation_rerenders_without_advancing() {
    let h = harness(calendar_spec("date"));
    h.engine.handle(BOT, USER, "/book").await;

    let reply = h
        .engine
        .handle_callback(BOT, USER, "cal_nav:1:1000:2031-07:date:when")
        .await
        .expect("month view");
    assert_eq!(reply.keyboard.expect("keyboard").rows[0][1].label, "July 2031");
    let session = h.sessions.get(BOT, USER).await.unwrap().expect("session");
    assert_eq!(session.step_index, 0);
}

#[tokio::test]
async fn foreign_identity_token_is_dropped() {
    let h = harness(calendar_spec("date"));
    h.engine.handle(BOT, USER, "/book").await;

    let reply = h
        .engine
        .handle_callback(BOT, USER, "cal_date:1:999:2031-03-14:date:when")
        .await;
    assert_eq!(reply, None);
    let session = h.sessions.get(BOT, USER).await.unwrap().expect("untouched");
    assert!(session.vars.is_empty());
    assert_eq!(h.engine.metrics().stale_callbacks, 1);
}

#[tokio::test]
async fn callbacks_without_session_or_for_other_vars_are_stale() {
    let h = harness(calendar_spec("date"));
    assert_eq!(
        h.engine.handle_callback(BOT, USER, "cal_date:1:1000:2031-03-14:date:when").await,
        None
    );

    h.engine.handle(BOT, USER, "/book").await;
    assert_eq!(
        h.engine.handle_callback(BOT, USER, "cal_date:1:1000:2031-03-14:date:other").await,
        None
    );
    assert_eq!(h.engine.handle_callback(BOT, USER, "cal_ignore").await, None);
    assert_eq!(h.engine.handle_callback(BOT, USER, "cal_date:garbage").await, None);
    assert_eq!(h.engine.handle_callback(BOT, USER, "pg:next:1:1000:1").await, None);
}

#[tokio::test]
async fn text_on_widget_step_rerenders_the_widget() {
    let h = harness(calendar_spec("date"));
    h.engine.handle(BOT, USER, "/book").await;

    let reply = h.engine.handle(BOT, USER, "tomorrow please").await;
    assert_eq!(reply.text, "When?");
    assert!(reply.keyboard.is_some());
    let session = h.sessions.get(BOT, USER).await.unwrap().expect("session");
    assert_eq!(session.step_index, 0);
}

fn shop_spec(source: Value) -> Value {
    json!({
        "flows": [{
            "entry_cmd": "/shop",
            "type": "wizard",
            "params": {
                "steps": [{
                    "widget": {
                        "type": "pagination",
                        "text": "Products",
                        "source": source,
                        "page_size": 2,
                        "item_template": "{{name}}",
                        "empty_text": "Catalogue empty"
                    },
                    "var": "product"
                }],
                "on_enter": [
                    {"type": "action.sql_query", "params": {"sql": "SELECT id, name FROM products", "result_var": "products"}}
                ],
                "on_complete": [
                    {"type": "action.reply_template", "params": {"text": "Chose {{product}}"}}
                ]
            }
        }]
    })
}

fn products() -> Value {
    json!([
        {"id": "p1", "name": "Tea"},
        {"id": "p2", "name": "Coffee"},
        {"id": "p3", "name": "Cocoa"}
    ])
}

fn labels(reply: &botflow_engine::RenderedReply) -> Vec<Vec<String>> {
    reply
        .keyboard
        .as_ref()
        .expect("keyboard")
        .rows
        .iter()
        .map(|row| row.iter().map(|b| b.label.clone()).collect())
        .collect()
}

#[tokio::test]
async fn context_pagination_pages_and_selects() {
    let store = Arc::new(ScriptedDataStore::new().respond("FROM products", products()));
    let h = harness_with(shop_spec(json!({"type": "ctx", "key": "products"})), Some(store), None);

    let first = h.engine.handle(BOT, USER, "/shop").await;
    assert_eq!(first.text, "Products");
    assert_eq!(labels(&first), vec![vec!["Tea"], vec!["Coffee"], vec![" ", "1", "›"]]);
    let tokens: Vec<String> = first.keyboard.as_ref().unwrap().tokens().map(str::to_string).collect();
    assert_eq!(tokens[0], "pg:sel:1:1000:p1");
    assert_eq!(tokens[4], "pg:next:1:1000:1");

    let second = h
        .engine
        .handle_callback(BOT, USER, "pg:next:1:1000:1")
        .await
        .expect("page 2");
    assert_eq!(labels(&second), vec![vec!["Cocoa"], vec!["‹", "2", " "]]);

    assert_eq!(h.engine.handle_callback(BOT, USER, "pg:sel:1:1000:p9").await, None);
    let done = h
        .engine
        .handle_callback(BOT, USER, "pg:sel:1:1000:p3")
        .await
        .expect("selection");
    assert_eq!(done.text, "Chose p3");
}

#[tokio::test]
async fn empty_context_list_shows_empty_text() {
    let store = Arc::new(ScriptedDataStore::new().respond("FROM products", json!([])));
    let h = harness_with(shop_spec(json!({"type": "ctx", "key": "products"})), Some(store), None);

    let reply = h.engine.handle(BOT, USER, "/shop").await;
    assert_eq!(reply.text, "Catalogue empty");
    assert!(reply.keyboard.expect("keyboard").rows.is_empty());
    assert_eq!(h.engine.handle_callback(BOT, USER, "pg:sel:1:1000:p1").await, None);
}

#[tokio::test]
async fn sql_pagination_binds_window() {
    let store = Arc::new(
        ScriptedDataStore::new()
            .respond("FROM items", products())
            .respond("FROM products", json!([])),
    );
    let h = harness_with(
        shop_spec(json!({
            "type": "sql",
            "sql": "SELECT id, name FROM items WHERE owner = :user_id ORDER BY id LIMIT :limit OFFSET :offset"
        })),
        Some(store.clone()),
        None,
    );

    let first = h.engine.handle(BOT, USER, "/shop").await;
    assert_eq!(labels(&first), vec![vec!["Tea"], vec!["Coffee"], vec![" ", "1", "›"]]);
    let page_query = store
        .statements()
        .into_iter()
        .find(|s| s.sql.contains("FROM items"))
        .expect("page query");
    assert_eq!(
        page_query.sql,
        "SELECT id, name FROM items WHERE owner = $1 ORDER BY id LIMIT $2 OFFSET $3"
    );

    let done = h
        .engine
        .handle_callback(BOT, USER, "pg:sel:1:1000:p3")
        .await
        .expect("selection");
    assert_eq!(done.text, "Chose p3");
}

#[tokio::test]
async fn oversized_page_numbers_are_dropped() {
    let store = Arc::new(ScriptedDataStore::new().respond("FROM products", products()));
    let h = harness_with(shop_spec(json!({"type": "ctx", "key": "products"})), Some(store), None);
    h.engine.handle(BOT, USER, "/shop").await;

    let overflowing = format!("pg:next:1:1000:{}", usize::MAX);
    assert_eq!(h.engine.handle_callback(BOT, USER, &overflowing).await, None);
    let far = format!("pg:next:1:1000:{}", u32::MAX);
    assert_eq!(h.engine.handle_callback(BOT, USER, &far).await, None);
    assert_eq!(h.engine.metrics().stale_callbacks, 2);

    let done = h
        .engine
        .handle_callback(BOT, USER, "pg:sel:1:1000:p1")
        .await
        .expect("session survives");
    assert_eq!(done.text, "Chose p1");
}

#[tokio::test]
async fn ignore_tokens_with_trailing_fields_are_not_stale() {
    let h = harness(calendar_spec("date"));
    h.engine.handle(BOT, USER, "/book").await;

    assert_eq!(h.engine.handle_callback(BOT, USER, "cal_ignore:1:1000").await, None);
    assert_eq!(h.engine.handle_callback(BOT, USER, "pg:ignore:x").await, None);
    assert_eq!(h.engine.metrics().stale_callbacks, 0);
}
