//! Statement logging.
//!
//! [`Database`](crate::Database) hands every statement to its [`SqlTracer`] just before sending
//! it. Events go to the `pgmodel.sql` target with the statement kind, table, parameter count and
//! the SQL in `:name` form:
//!
//! ```text
//! RUST_LOG=pgmodel.sql=debug
//! ```

use tracing::Level;

use crate::config::ModelConfig;
use crate::statement::Statement;

/// Dispatch a tracing event at a level only known at runtime.
macro_rules! emit_at_level {
    ($level:expr, $($field:tt)*) => {
        match $level {
            Level::ERROR => tracing::error!($($field)*),
            Level::WARN => tracing::warn!($($field)*),
            Level::INFO => tracing::info!($($field)*),
            Level::DEBUG => tracing::debug!($($field)*),
            _ => tracing::trace!($($field)*),
        }
    };
}

/// Longest prefix of `sql` that fits in `max_bytes` and ends on a char boundary.
pub(crate) fn clip(sql: &str, max_bytes: usize) -> &str {
    let mut end = max_bytes.min(sql.len());
    while !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

#[derive(Debug, Clone)]
pub struct SqlTracer {
    level: Level,
    max_sql_length: Option<usize>,
}

impl Default for SqlTracer {
    fn default() -> Self {
        Self::from(&ModelConfig::default())
    }
}

impl From<&ModelConfig> for SqlTracer {
    fn from(config: &ModelConfig) -> Self {
        Self {
            level: config.sql_log_level,
            max_sql_length: config.max_sql_length,
        }
    }
}

impl SqlTracer {
    pub fn level(&self) -> Level {
        self.level
    }

    fn shorten(&self, sql: String) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", clip(&sql, max)),
            _ => sql,
        }
    }

    pub fn before_statement(&self, stmt: &Statement) {
        let sql = self.shorten(stmt.to_named_sql());
        emit_at_level!(
            self.level,
            target: "pgmodel.sql",
            kind = stmt.kind().as_str(),
            table = stmt.table(),
            param_count = stmt.params().count(),
            sql = %sql,
        );
    }
}
