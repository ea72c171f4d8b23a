//! Per-table column cache.
//!
//! Column lists are resolved once per table name and kept for the lifetime of the cache. A schema
//! change made while the process runs is not picked up.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::client::Connection;
use crate::error::{OrmError, OrmResult};
use crate::statement::Statement;

/// Memoized column names per table.
///
/// Share one instance between databases with [`Database::with_schema_cache`](crate::Database::with_schema_cache).
#[derive(Debug, Default)]
pub struct SchemaCache {
    tables: RwLock<HashMap<String, Arc<[String]>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached columns for `table`, if already resolved.
    pub fn get(&self, table: &str) -> Option<Arc<[String]>> {
        let guard = self.tables.read().unwrap_or_else(|e| e.into_inner());
        guard.get(table).cloned()
    }

    /// Seed the cache directly.
    pub fn insert(&self, table: impl Into<String>, columns: Vec<String>) -> Arc<[String]> {
        let columns: Arc<[String]> = columns.into();
        let mut guard = self.tables.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(table.into(), Arc::clone(&columns));
        columns
    }

    pub fn len(&self) -> usize {
        self.tables.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ordered column names of `table`, querying `information_schema` on a miss.
    ///
    /// Fails with [`OrmError::Schema`] when the table has no visible columns.
    pub async fn columns_for<C: Connection>(
        &self,
        conn: &C,
        table: &str,
    ) -> OrmResult<Arc<[String]>> {
        if let Some(columns) = self.get(table) {
            return Ok(columns);
        }

        let stmt = Statement::columns_of(table);
        let rows = conn.fetch_all(&stmt).await?;
        let columns: Vec<String> = rows
            .iter()
            .filter_map(|r| r.get("column_name").map(|v| v.to_text()))
            .collect();
        if columns.is_empty() {
            return Err(OrmError::schema(format!(
                "no columns found for table \"{table}\""
            )));
        }

        tracing::debug!(target: "pgmodel::schema", table, columns = columns.len(), "cached table columns");
        Ok(self.insert(table, columns))
    }
}
