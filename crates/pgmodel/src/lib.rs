//! # pgmodel
//!
//! Active-record style models over single PostgreSQL tables.
//!
//! ## Features
//!
//! - **One table per model**: an [`Entity`] names a table; a [`Model`] is a working row plus a
//!   chainable query state
//! - **Cached schema**: column names are read from `information_schema` once per table
//! - **Structured SQL**: queries are built as clause lists with named parameters and rendered to
//!   `$n` placeholders only when executed
//! - **Virtual fields**: runtime-only values that survive result sanitizing but are never written
//! - **Client-side keys**: [`Model::create`] pre-allocates the next key from a shared counter
//! - **Transaction-friendly**: pass a transaction anywhere a [`Connection`] is expected
//!
//! ## Example
//!
//! ```ignore
//! use pgmodel::prelude::*;
//!
//! struct File;
//! impl Entity for File {
//!     const NAME: &'static str = "File";
//! }
//!
//! let db = pgmodel::connect(&std::env::var("DATABASE_URL")?).await?;
//! let mut files = db.model::<File>().await?;
//!
//! let id = files
//!     .insert([("filename", Value::from("a.txt")), ("userid", 2.into()), ("email", "x@y.com".into())])
//!     .await;
//!
//! let first = files
//!     .reset()
//!     .select_first_where([("email", "x@y.com")])
//!     .execute()
//!     .await
//!     .into_one();
//!
//! let recent = files
//!     .reset()
//!     .with_filter([("userid", "> 1")])
//!     .with_order("id")
//!     .with_limit(10, None)
//!     .execute()
//!     .await
//!     .into_many();
//! ```

pub mod client;
pub mod condition;
pub mod config;
pub mod database;
pub mod error;
pub mod identity;
pub mod model;
pub mod monitor;
pub mod naming;
#[cfg(feature = "pool")]
pub mod pool;
pub mod prelude;
pub mod query;
pub mod record;
pub mod row;
pub mod sanitize;
pub mod schema;
pub mod statement;
pub mod value;

pub use client::{Connection, Executed};
pub use condition::{Condition, Filter};
pub use config::{ModelConfig, OrderPolicy};
pub use database::{Database, connect};
pub use error::{OrmError, OrmResult};
pub use identity::IdentityCounter;
pub use model::{Entity, Fetched, Model, PostLoadFn, Saved};
pub use monitor::SqlTracer;
pub use naming::table_name_for;
#[cfg(feature = "pool")]
pub use pool::{ModelPool, create_pool};
pub use query::{Direction, Projection, QueryState};
pub use record::Record;
pub use schema::SchemaCache;
pub use statement::{Clause, Statement, StatementKind};
pub use value::Value;

pub use rust_decimal::Decimal;
