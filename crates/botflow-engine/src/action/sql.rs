use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use super::sql_guard::{BoundStatement, SqlValue, StatementKind, prepare};
use crate::error::ActionError;
use crate::store::{DataStore, Row};

/// Runs guarded statements against the configured [`DataStore`].
pub struct SqlExecutor {
    store: Arc<dyn DataStore>,
    timeout: Duration,
    row_cap: usize,
}

impl SqlExecutor {
    pub fn new(store: Arc<dyn DataStore>, timeout: Duration, row_cap: usize) -> Self {
        Self {
            store,
            timeout,
            row_cap,
        }
    }

    pub async fn query(
        &self,
        sql: &str,
        binds: &BTreeMap<String, SqlValue>,
    ) -> Result<Vec<Row>, ActionError> {
        let statement = prepare(sql, StatementKind::Query, self.row_cap, binds)?;
        debug!(sql = %statement.sql, params = statement.params.len(), "running query");
        let rows = self.with_timeout(self.store.query(&statement)).await??;
        debug!(rows = rows.len(), "query finished");
        Ok(rows)
    }

    pub async fn execute(
        &self,
        sql: &str,
        binds: &BTreeMap<String, SqlValue>,
    ) -> Result<u64, ActionError> {
        let statement: BoundStatement = prepare(sql, StatementKind::Exec, self.row_cap, binds)?;
        debug!(sql = %statement.sql, params = statement.params.len(), "running statement");
        let affected = self.with_timeout(self.store.execute(&statement)).await??;
        debug!(affected, "statement finished");
        Ok(affected)
    }

    async fn with_timeout<T>(
        &self,
        call: impl Future<Output = T>,
    ) -> Result<T, ActionError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| ActionError::Timeout(self.timeout))
    }
}

/// Shapes query rows the way `action.sql_query` stores them.
///
/// `scalar` takes the first column of the first row and wins over `flatten`,
/// which collects the first column of every row.
pub fn shape_rows(rows: Vec<Row>, scalar: bool, flatten: bool) -> Value {
    if scalar {
        return rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .map(|(_, value)| value)
            .unwrap_or(Value::Null);
    }
    if flatten {
        return Value::Array(
            rows.into_iter()
                .filter_map(|row| row.into_iter().next().map(|(_, value)| value))
                .collect(),
        );
    }
    Value::Array(
        rows.into_iter()
            .map(|row| Value::Object(row.into_iter().collect()))
            .collect(),
    )
}
