//! PostgreSQL [`DataStore`] on a sqlx pool.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row as _, TypeInfo};
use tracing::debug;

use crate::action::sql_guard::{BoundStatement, SqlValue};
use crate::error::DataStoreError;
use crate::store::{DataStore, Row};

pub struct PgDataStore {
    pool: PgPool,
}

impl PgDataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, DataStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|err| DataStoreError::Connection(err.to_string()))?;
        Ok(Self::new(pool))
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for value in params {
        query = match value {
            SqlValue::Null => query.bind(Option::<String>::None),
            SqlValue::Int(int) => query.bind(*int),
            SqlValue::Text(text) => query.bind(text.as_str()),
        };
    }
    query
}

fn query_error(err: sqlx::Error) -> DataStoreError {
    match err {
        sqlx::Error::Database(db) => DataStoreError::Query {
            message: db.message().to_string(),
            code: db.code().map(|code| code.into_owned()),
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            DataStoreError::Connection(err.to_string())
        }
        other => DataStoreError::Query {
            message: other.to_string(),
            code: None,
        },
    }
}

fn row_to_json(row: &PgRow) -> Row {
    let mut out = Row::with_capacity(row.columns().len());
    for column in row.columns() {
        let name = column.name();
        let value: Option<Value> = match column.type_info().name() {
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row
                .try_get::<Option<String>, _>(name)
                .ok()
                .flatten()
                .map(Value::String),
            "INT2" => row
                .try_get::<Option<i16>, _>(name)
                .ok()
                .flatten()
                .map(Value::from),
            "INT4" => row
                .try_get::<Option<i32>, _>(name)
                .ok()
                .flatten()
                .map(Value::from),
            "INT8" => row
                .try_get::<Option<i64>, _>(name)
                .ok()
                .flatten()
                .map(Value::from),
            "FLOAT4" | "FLOAT8" => row
                .try_get::<Option<f64>, _>(name)
                .ok()
                .flatten()
                .map(Value::from),
            "BOOL" => row
                .try_get::<Option<bool>, _>(name)
                .ok()
                .flatten()
                .map(Value::Bool),
            "JSONB" | "JSON" => row.try_get::<Option<Value>, _>(name).ok().flatten(),
            "DATE" => row
                .try_get::<Option<time::Date>, _>(name)
                .ok()
                .flatten()
                .map(|date| Value::String(botflow_spec::format_iso_date(date))),
            "TIMESTAMPTZ" => row
                .try_get::<Option<time::OffsetDateTime>, _>(name)
                .ok()
                .flatten()
                .and_then(|ts| ts.format(&time::format_description::well_known::Rfc3339).ok())
                .map(Value::String),
            other => {
                debug!(column = name, pg_type = other, "unmapped column type, reading as text");
                row.try_get::<Option<String>, _>(name)
                    .ok()
                    .flatten()
                    .map(Value::String)
            }
        };
        out.insert(name.to_string(), value.unwrap_or(Value::Null));
    }
    out
}

#[async_trait]
impl DataStore for PgDataStore {
    async fn query(&self, statement: &BoundStatement) -> Result<Vec<Row>, DataStoreError> {
        let rows = bind_all(sqlx::query(&statement.sql), &statement.params)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn execute(&self, statement: &BoundStatement) -> Result<u64, DataStoreError> {
        let done = bind_all(sqlx::query(&statement.sql), &statement.params)
            .execute(&self.pool)
            .await
            .map_err(query_error)?;
        Ok(done.rows_affected())
    }
}
