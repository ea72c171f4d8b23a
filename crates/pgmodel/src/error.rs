//! Errors raised while binding models and running their statements.

use thiserror::Error;
use tokio_postgres::error::DbError;

pub type OrmResult<T> = Result<T, OrmError>;

/// Everything that can go wrong between a model call and the server.
///
/// Constraint failures reported by Postgres are split out by SQLSTATE (see
/// [`OrmError::from_db_error`]) so callers can tell "row already exists" from "server down".
#[derive(Debug, Error)]
pub enum OrmError {
    #[error("could not connect: {0}")]
    Connection(String),

    /// Any driver error without a more specific category.
    #[error("statement failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("not found: {0}")]
    NotFound(String),

    /// SQLSTATE 23505. The message carries the constraint name and the server's
    /// "duplicate key value ..." text.
    #[error("unique violation: {0}")]
    UniqueViolation(String),

    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("check violation: {0}")]
    CheckViolation(String),

    #[error("not-null violation: {0}")]
    NotNullViolation(String),

    /// Unknown table or column, or a table with no visible columns.
    #[error("schema error: {0}")]
    Schema(String),

    #[error("cannot decode column '{column}': {message}")]
    Decode { column: String, message: String },

    /// A statement was rejected before reaching the server.
    #[error("invalid statement: {0}")]
    Validation(String),

    #[cfg(feature = "pool")]
    #[error("pool error: {0}")]
    Pool(String),

    #[error("{0}")]
    Other(String),
}

impl OrmError {
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Unique, foreign key, check or not-null violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::UniqueViolation(_)
                | Self::ForeignKeyViolation(_)
                | Self::CheckViolation(_)
                | Self::NotNullViolation(_)
        )
    }

    pub fn is_schema_error(&self) -> bool {
        matches!(self, Self::Schema(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Classify a driver error by its SQLSTATE.
    ///
    /// | SQLSTATE | variant |
    /// |---|---|
    /// | `23505` | [`UniqueViolation`](Self::UniqueViolation) |
    /// | `23503` | [`ForeignKeyViolation`](Self::ForeignKeyViolation) |
    /// | `23514` | [`CheckViolation`](Self::CheckViolation) |
    /// | `23502` | [`NotNullViolation`](Self::NotNullViolation) |
    /// | `42703`, `42P01` | [`Schema`](Self::Schema) |
    ///
    /// Anything else, including errors without a server response, stays [`Query`](Self::Query).
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        match err.as_db_error().and_then(classify) {
            Some(classified) => classified,
            None => Self::Query(err),
        }
    }
}

fn classify(db: &DbError) -> Option<OrmError> {
    let with_constraint = || match db.constraint() {
        Some(name) => format!("{name}: {}", db.message()),
        None => db.message().to_string(),
    };
    let err = match db.code().code() {
        "23505" => OrmError::UniqueViolation(with_constraint()),
        "23503" => OrmError::ForeignKeyViolation(with_constraint()),
        "23514" => OrmError::CheckViolation(with_constraint()),
        "23502" => OrmError::NotNullViolation(db.message().to_string()),
        "42703" | "42P01" => OrmError::Schema(db.message().to_string()),
        _ => return None,
    };
    Some(err)
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
