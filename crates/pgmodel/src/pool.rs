//! Connection pool utilities

use std::sync::Arc;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;

use crate::config::ModelConfig;
use crate::database::Database;
use crate::error::{OrmError, OrmResult};
use crate::identity::IdentityCounter;
use crate::schema::SchemaCache;

/// Create a `NoTls` connection pool from a database URL.
///
/// No connection is opened until the first checkout.
pub fn create_pool(database_url: &str, max_size: usize) -> OrmResult<Pool> {
    let pg_config: tokio_postgres::Config = database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| OrmError::Connection(e.to_string()))?;

    let mgr = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    Pool::builder(mgr)
        .max_size(max_size)
        .build()
        .map_err(|e| OrmError::Pool(e.to_string()))
}

/// A pool whose checkouts share one column cache and one identity counter.
///
/// ```ignore
/// let pool = ModelPool::new(pgmodel::pool::create_pool(&url, 16)?);
/// let db = pool.get().await?;
/// let mut files = db.model::<File>().await?;
/// ```
#[derive(Clone)]
pub struct ModelPool {
    pool: Pool,
    schema: Arc<SchemaCache>,
    ids: Arc<IdentityCounter>,
    config: ModelConfig,
}

impl ModelPool {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            schema: Arc::new(SchemaCache::new()),
            ids: Arc::new(IdentityCounter::new()),
            config: ModelConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn schema_cache(&self) -> &Arc<SchemaCache> {
        &self.schema
    }

    pub fn identity_counter(&self) -> &Arc<IdentityCounter> {
        &self.ids
    }

    /// Check out a client wrapped in a [`Database`] sharing this pool's cache and counter.
    pub async fn get(&self) -> OrmResult<Database<deadpool_postgres::Client>> {
        let client = self.pool.get().await?;
        Ok(Database::new(client)
            .with_config(self.config.clone())
            .with_schema_cache(self.schema.clone())
            .with_identity_counter(self.ids.clone()))
    }
}

impl std::fmt::Debug for ModelPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelPool")
            .field("status", &self.pool.status())
            .field("tables_cached", &self.schema.len())
            .field("config", &self.config)
            .finish()
    }
}
