use tracing::Level;

/// How `with_order` expressions are checked before they reach SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderPolicy {
    /// Strip `\W ` sequences, then require every comma-separated term to be a known column,
    /// optionally followed by `ASC` or `DESC`.
    #[default]
    AllowList,
    /// Only strip `\W ` sequences; the rest of the expression is used as written.
    StripOnly,
}

/// Configuration shared by every model created from a [`Database`](crate::Database).
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Order-expression checking.
    pub order_policy: OrderPolicy,
    /// Derive table names by pluralizing the lowercased model name.
    pub pluralize_tables: bool,
    /// Tracing level for executed SQL.
    pub sql_log_level: Level,
    /// Truncate logged SQL (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            order_policy: OrderPolicy::default(),
            pluralize_tables: true,
            sql_log_level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl ModelConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the order-expression policy.
    pub fn order_policy(mut self, policy: OrderPolicy) -> Self {
        self.order_policy = policy;
        self
    }

    /// Enable or disable table-name pluralization.
    pub fn pluralize_tables(mut self, enabled: bool) -> Self {
        self.pluralize_tables = enabled;
        self
    }

    /// Override the tracing level used for SQL events.
    pub fn sql_log_level(mut self, level: Level) -> Self {
        self.sql_log_level = level;
        self
    }

    /// Set maximum SQL length to log.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation in logs.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }
}
