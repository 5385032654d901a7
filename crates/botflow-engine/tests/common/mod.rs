#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use botflow_engine::{
    BoundStatement, DataStore, DataStoreError, Engine, MemoryLocalization, MemorySessionStore,
    Row, SqlValue, StaticSpecLoader,
};
use botflow_spec::BotSpec;
use regex::Regex;
use serde_json::Value;

pub const BOT: i64 = 1;
pub const USER: i64 = 1000;

pub fn spec(value: Value) -> BotSpec {
    BotSpec::from_json_str(&value.to_string()).expect("valid bot spec")
}

pub struct Harness {
    pub engine: Engine,
    pub sessions: Arc<MemorySessionStore>,
    pub specs: Arc<StaticSpecLoader>,
}

pub fn harness(spec_json: Value) -> Harness {
    harness_with(spec_json, None, None)
}

pub fn harness_with(
    spec_json: Value,
    data: Option<Arc<dyn DataStore>>,
    localization: Option<Arc<MemoryLocalization>>,
) -> Harness {
    let specs = Arc::new(StaticSpecLoader::new().with_spec(BOT, spec(spec_json)));
    let sessions = Arc::new(MemorySessionStore::new());
    let mut builder = Engine::builder(specs.clone(), sessions.clone());
    if let Some(data) = data {
        builder = builder.data_store(data);
    }
    if let Some(localization) = localization {
        builder = builder.localization(localization);
    }
    Harness {
        engine: builder.build(),
        sessions,
        specs,
    }
}

pub fn rows(value: Value) -> Vec<Row> {
    value
        .as_array()
        .expect("array of rows")
        .iter()
        .map(|row| {
            row.as_object()
                .expect("row object")
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .collect()
}

/// Data store answering queries from canned rows, matched by SQL substring.
/// `LIMIT $n OFFSET $m` is applied to the canned rows.
#[derive(Default)]
pub struct ScriptedDataStore {
    responses: Vec<(String, Vec<Row>)>,
    log: Mutex<Vec<BoundStatement>>,
}

impl ScriptedDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, needle: &str, canned: Value) -> Self {
        self.responses.push((needle.to_string(), rows(canned)));
        self
    }

    pub fn statements(&self) -> Vec<BoundStatement> {
        self.log.lock().unwrap().clone()
    }
}

fn param_int(statement: &BoundStatement, index: &str) -> Option<usize> {
    let index: usize = index.parse().ok()?;
    match statement.params.get(index - 1)? {
        SqlValue::Int(value) => usize::try_from(*value).ok(),
        _ => None,
    }
}

#[async_trait]
impl DataStore for ScriptedDataStore {
    async fn query(&self, statement: &BoundStatement) -> Result<Vec<Row>, DataStoreError> {
        self.log.lock().unwrap().push(statement.clone());
        let Some((_, canned)) = self
            .responses
            .iter()
            .find(|(needle, _)| statement.sql.contains(needle.as_str()))
        else {
            return Err(DataStoreError::Query {
                message: format!("no canned rows for `{}`", statement.sql),
                code: None,
            });
        };
        let window = Regex::new(r"LIMIT \$(\d+) OFFSET \$(\d+)").unwrap();
        if let Some(caps) = window.captures(&statement.sql) {
            let limit = param_int(statement, &caps[1]).unwrap_or(usize::MAX);
            let offset = param_int(statement, &caps[2]).unwrap_or(0);
            return Ok(canned.iter().skip(offset).take(limit).cloned().collect());
        }
        Ok(canned.clone())
    }

    async fn execute(&self, statement: &BoundStatement) -> Result<u64, DataStoreError> {
        self.log.lock().unwrap().push(statement.clone());
        Ok(1)
    }
}
