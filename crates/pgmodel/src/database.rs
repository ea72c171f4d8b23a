//! Database handle shared by models.

use std::sync::Arc;

use crate::client::{Connection, Executed};
use crate::config::ModelConfig;
use crate::error::{OrmError, OrmResult};
use crate::identity::IdentityCounter;
use crate::model::{Entity, Model};
use crate::monitor::SqlTracer;
use crate::record::Record;
use crate::schema::SchemaCache;
use crate::statement::Statement;

/// A connection plus the state every model bound to it shares: the column cache, the identity
/// counter and configuration.
///
/// `Database` is itself a [`Connection`] that logs each statement before delegating.
///
/// # Example
/// ```ignore
/// use pgmodel::prelude::*;
///
/// struct File;
/// impl Entity for File {
///     const NAME: &'static str = "File";
/// }
///
/// let db = pgmodel::connect(&std::env::var("DATABASE_URL")?).await?;
/// let mut files = db.model::<File>().await?;
/// let first = files.select_first().execute().await;
/// ```
#[derive(Debug)]
pub struct Database<C> {
    conn: C,
    schema: Arc<SchemaCache>,
    ids: Arc<IdentityCounter>,
    config: ModelConfig,
    tracer: SqlTracer,
}

impl<C: Connection> Database<C> {
    pub fn new(conn: C) -> Self {
        let config = ModelConfig::default();
        Self {
            conn,
            schema: Arc::new(SchemaCache::new()),
            ids: Arc::new(IdentityCounter::new()),
            tracer: SqlTracer::from(&config),
            config,
        }
    }

    pub fn with_config(mut self, config: ModelConfig) -> Self {
        self.tracer = SqlTracer::from(&config);
        self.config = config;
        self
    }

    /// Use an externally owned column cache, e.g. one shared with other databases.
    pub fn with_schema_cache(mut self, cache: Arc<SchemaCache>) -> Self {
        self.schema = cache;
        self
    }

    /// Use an externally owned identity counter.
    pub fn with_identity_counter(mut self, counter: Arc<IdentityCounter>) -> Self {
        self.ids = counter;
        self
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn schema_cache(&self) -> &Arc<SchemaCache> {
        &self.schema
    }

    pub fn identity_counter(&self) -> &Arc<IdentityCounter> {
        &self.ids
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn into_inner(self) -> C {
        self.conn
    }

    /// Bind a model type to this database, caching its columns and seeding its key counter.
    pub async fn model<E: Entity>(&self) -> OrmResult<Model<'_, C, E>> {
        Model::new(self).await
    }

    /// Ordered column names of `table`, cached after the first lookup.
    pub async fn columns_for(&self, table: &str) -> OrmResult<Arc<[String]>> {
        self.schema.columns_for(self, table).await
    }
}

impl<C: Connection> Connection for Database<C> {
    async fn fetch_all(&self, stmt: &Statement) -> OrmResult<Vec<Record>> {
        self.tracer.before_statement(stmt);
        self.conn.fetch_all(stmt).await
    }

    async fn execute(&self, stmt: &Statement) -> OrmResult<Executed> {
        self.tracer.before_statement(stmt);
        self.conn.execute(stmt).await
    }
}

/// Connect with `NoTls` and spawn the connection task on the current tokio runtime.
pub async fn connect(database_url: &str) -> OrmResult<Database<tokio_postgres::Client>> {
    let (client, connection) = tokio_postgres::connect(database_url, tokio_postgres::NoTls)
        .await
        .map_err(|e| OrmError::Connection(e.to_string()))?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(target: "pgmodel", error = %e, "postgres connection error");
        }
    });
    Ok(Database::new(client))
}
