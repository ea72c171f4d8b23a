//! Connection trait for unified database access.

use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

use crate::error::{OrmError, OrmResult};
use crate::record::Record;
use crate::row::record_from_row;
use crate::statement::Statement;
use crate::value::Value;

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Executed {
    pub rows_affected: u64,
    /// First column of the first returned row, for statements with a `RETURNING` clause.
    pub last_insert_id: Option<i64>,
}

/// A trait that unifies database clients and transactions.
///
/// Implementors receive structured [`Statement`]s; rendering to SQL text happens here, at the
/// boundary. This lets a model run against a plain client, a transaction, a pooled client, or an
/// in-memory stand-in in tests.
pub trait Connection: Send + Sync {
    /// Run a row-returning statement and decode every row.
    fn fetch_all(
        &self,
        stmt: &Statement,
    ) -> impl std::future::Future<Output = OrmResult<Vec<Record>>> + Send;

    /// Run a write statement.
    ///
    /// Statements carrying a `RETURNING` clause report the returned key in
    /// [`Executed::last_insert_id`].
    fn execute(
        &self,
        stmt: &Statement,
    ) -> impl std::future::Future<Output = OrmResult<Executed>> + Send;
}

fn as_params<'a>(values: &'a [&'a Value]) -> Vec<&'a (dyn ToSql + Sync)> {
    values.iter().map(|v| *v as &(dyn ToSql + Sync)).collect()
}

fn executed_from_returning(rows: &[Row]) -> OrmResult<Executed> {
    let last_insert_id = match rows.first() {
        Some(row) => {
            let value: Value = row
                .try_get(0)
                .map_err(|e| OrmError::decode("<returning>", e.to_string()))?;
            value.as_i64()
        }
        None => None,
    };
    Ok(Executed {
        rows_affected: rows.len() as u64,
        last_insert_id,
    })
}

impl Connection for tokio_postgres::Client {
    async fn fetch_all(&self, stmt: &Statement) -> OrmResult<Vec<Record>> {
        let (sql, values) = stmt.render()?;
        let rows = tokio_postgres::Client::query(self, &sql, &as_params(&values))
            .await
            .map_err(OrmError::from_db_error)?;
        rows.iter().map(record_from_row).collect()
    }

    async fn execute(&self, stmt: &Statement) -> OrmResult<Executed> {
        let (sql, values) = stmt.render()?;
        let params = as_params(&values);
        if stmt.returning_column().is_some() {
            let rows = tokio_postgres::Client::query(self, &sql, &params)
                .await
                .map_err(OrmError::from_db_error)?;
            return executed_from_returning(&rows);
        }
        let rows_affected = tokio_postgres::Client::execute(self, &sql, &params)
            .await
            .map_err(OrmError::from_db_error)?;
        Ok(Executed {
            rows_affected,
            last_insert_id: None,
        })
    }
}

impl Connection for tokio_postgres::Transaction<'_> {
    async fn fetch_all(&self, stmt: &Statement) -> OrmResult<Vec<Record>> {
        let (sql, values) = stmt.render()?;
        let rows = tokio_postgres::Transaction::query(self, &sql, &as_params(&values))
            .await
            .map_err(OrmError::from_db_error)?;
        rows.iter().map(record_from_row).collect()
    }

    async fn execute(&self, stmt: &Statement) -> OrmResult<Executed> {
        let (sql, values) = stmt.render()?;
        let params = as_params(&values);
        if stmt.returning_column().is_some() {
            let rows = tokio_postgres::Transaction::query(self, &sql, &params)
                .await
                .map_err(OrmError::from_db_error)?;
            return executed_from_returning(&rows);
        }
        let rows_affected = tokio_postgres::Transaction::execute(self, &sql, &params)
            .await
            .map_err(OrmError::from_db_error)?;
        Ok(Executed {
            rows_affected,
            last_insert_id: None,
        })
    }
}

// ===== deadpool-postgres support =====

#[cfg(feature = "pool")]
impl Connection for deadpool_postgres::Client {
    async fn fetch_all(&self, stmt: &Statement) -> OrmResult<Vec<Record>> {
        // Delegate to the deref target (ClientWrapper / tokio_postgres::Client).
        Connection::fetch_all(&**self, stmt).await
    }

    async fn execute(&self, stmt: &Statement) -> OrmResult<Executed> {
        Connection::execute(&**self, stmt).await
    }
}

#[cfg(feature = "pool")]
impl Connection for deadpool_postgres::ClientWrapper {
    async fn fetch_all(&self, stmt: &Statement) -> OrmResult<Vec<Record>> {
        Connection::fetch_all(&**self, stmt).await
    }

    async fn execute(&self, stmt: &Statement) -> OrmResult<Executed> {
        Connection::execute(&**self, stmt).await
    }
}

#[cfg(feature = "pool")]
impl Connection for deadpool_postgres::Transaction<'_> {
    async fn fetch_all(&self, stmt: &Statement) -> OrmResult<Vec<Record>> {
        Connection::fetch_all(&**self, stmt).await
    }

    async fn execute(&self, stmt: &Statement) -> OrmResult<Executed> {
        Connection::execute(&**self, stmt).await
    }
}

impl<C: Connection> Connection for &C {
    async fn fetch_all(&self, stmt: &Statement) -> OrmResult<Vec<Record>> {
        Connection::fetch_all(*self, stmt).await
    }

    async fn execute(&self, stmt: &Statement) -> OrmResult<Executed> {
        Connection::execute(*self, stmt).await
    }
}
