//! Cleaning fetched records.
//!
//! A field survives when its value is non-null and its name is a table column or a registered
//! virtual field. Model bookkeeping (table, column list, query state) lives on [`Model`] itself
//! and never appears among a record's fields, so there is nothing else to keep.
//!
//! [`Model`]: crate::Model

use crate::record::Record;

fn clean(record: &mut Record, columns: &[String], virtuals: &[String]) {
    record.retain(|name, value| {
        !value.is_null()
            && (columns.iter().any(|c| c == name) || virtuals.iter().any(|v| v == name))
    });
}

/// Sanitize one record against `columns` and its own virtual fields.
pub fn sanitize_one(record: &mut Record, columns: &[String]) {
    let virtuals: Vec<String> = record.virtual_field_names().map(String::from).collect();
    clean(record, columns, &virtuals);
}

/// Sanitize a batch. The first record's virtual fields stand in for the whole batch.
pub fn sanitize_many(records: &mut [Record], columns: &[String]) {
    let Some(first) = records.first() else {
        return;
    };
    let virtuals: Vec<String> = first.virtual_field_names().map(String::from).collect();
    for record in records.iter_mut() {
        clean(record, columns, &virtuals);
    }
}
