//! Row decoding.

use tokio_postgres::Row;

use crate::error::{OrmError, OrmResult};
use crate::record::Record;
use crate::value::Value;

/// Decode every column of `row` into a [`Record`], in result-column order.
pub fn record_from_row(row: &Row) -> OrmResult<Record> {
    let mut record = Record::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value: Value = row
            .try_get(idx)
            .map_err(|e| OrmError::decode(column.name(), e.to_string()))?;
        record.set(column.name(), value);
    }
    Ok(record)
}
