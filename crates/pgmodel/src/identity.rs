//! Client-side primary key allocation.
//!
//! The counter tracks the largest key seen per table. It is seeded from `MAX(id)` when a model
//! binds to a connection and moves forward on every insert and every [`Model::create`]. Other
//! writers are not coordinated with, so allocated keys are a best guess, not a reservation.
//!
//! [`Model::create`]: crate::Model::create

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Monotonic per-table key counter.
#[derive(Debug, Default)]
pub struct IdentityCounter {
    tables: Mutex<HashMap<String, i64>>,
}

impl IdentityCounter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Raise the counter for `table` to `max` (never lowers it).
    pub fn seed(&self, table: &str, max: i64) {
        self.observe(table, max);
    }

    /// Record a key that now exists in `table`.
    pub fn observe(&self, table: &str, id: i64) {
        let mut tables = self.lock();
        let current = tables.entry(table.to_string()).or_insert(0);
        if id > *current {
            *current = id;
        }
    }

    /// Allocate the next key for `table`.
    pub fn next(&self, table: &str) -> i64 {
        let mut tables = self.lock();
        let current = tables.entry(table.to_string()).or_insert(0);
        *current += 1;
        *current
    }

    /// Largest key seen for `table` (0 when none).
    pub fn current(&self, table: &str) -> i64 {
        self.lock().get(table).copied().unwrap_or(0)
    }
}
