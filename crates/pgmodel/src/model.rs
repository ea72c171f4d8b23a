//! Active-record style models.
//!
//! An [`Entity`] names a table; a [`Model`] is one working instance of it bound to a
//! [`Database`]. The model carries the current row ([`Record`]), a chainable [`QueryState`], and
//! the last error. Builder calls mutate the model in place and return it, so lookups read as:
//!
//! ```ignore
//! let hit = files
//!     .reset()
//!     .with_fields(["id", "filename"])
//!     .with_filter([("email", "x@y.com")])
//!     .select_first()
//!     .execute()
//!     .await;
//! ```
//!
//! Query execution and CRUD never return `Err`: failures come back as a sentinel
//! ([`Fetched::Failed`], `None`, `false`, [`Saved::Failed`]) and the cause is kept in
//! [`Model::last_error`] until the next failure replaces it. Missing arguments (an empty insert
//! map, a delete with no key) fail without recording anything.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::client::Connection;
use crate::condition::{Condition, Filter};
use crate::database::Database;
use crate::error::{OrmError, OrmResult};
use crate::naming::table_name_for;
use crate::query::{Direction, Projection, QueryState};
use crate::record::Record;
use crate::sanitize::{sanitize_many, sanitize_one};
use crate::statement::Statement;
use crate::value::Value;

/// Hook run on every loaded record before it is sanitized.
pub type PostLoadFn = fn(&mut Record);

/// Static description of a model type.
///
/// ```ignore
/// struct File;
///
/// impl Entity for File {
///     const NAME: &'static str = "File";
///     const POST_LOAD: Option<PostLoadFn> = Some(|r| {
///         let hash = format!("{}:{}", r.get("filename").map(|v| v.to_text()).unwrap_or_default(), r.get("id").map(|v| v.to_text()).unwrap_or_default());
///         r.virtual_field("file_hash", hash);
///     });
/// }
/// ```
pub trait Entity {
    /// Model name; the table name is derived from it unless [`Entity::TABLE`] is set.
    const NAME: &'static str;
    /// Explicit table name.
    const TABLE: Option<&'static str> = None;
    const PRIMARY_KEY: &'static str = "id";
    /// Per-record hook, typically used to add virtual fields.
    const POST_LOAD: Option<PostLoadFn> = None;
}

/// Result of [`Model::execute`] and [`Model::raw_query`].
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    /// Single-row query hit.
    One(Record),
    /// Multi-row query result, possibly empty.
    Many(Vec<Record>),
    /// Single-row query matched nothing.
    NotFound,
    /// The statement failed; see [`Model::last_error`].
    Failed,
}

impl Fetched {
    pub fn is_failed(&self) -> bool {
        matches!(self, Fetched::Failed)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Fetched::NotFound)
    }

    /// No rows, for any reason.
    pub fn is_empty(&self) -> bool {
        match self {
            Fetched::One(_) => false,
            Fetched::Many(rows) => rows.is_empty(),
            Fetched::NotFound | Fetched::Failed => true,
        }
    }

    /// First record, if any.
    pub fn into_one(self) -> Option<Record> {
        match self {
            Fetched::One(r) => Some(r),
            Fetched::Many(rows) => rows.into_iter().next(),
            Fetched::NotFound | Fetched::Failed => None,
        }
    }

    /// All records (empty on not-found or failure).
    pub fn into_many(self) -> Vec<Record> {
        match self {
            Fetched::One(r) => vec![r],
            Fetched::Many(rows) => rows,
            Fetched::NotFound | Fetched::Failed => Vec::new(),
        }
    }
}

/// Result of [`Model::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Saved {
    /// A row was inserted under this key.
    Inserted(i64),
    Updated,
    Failed,
}

impl Saved {
    pub fn is_ok(&self) -> bool {
        !matches!(self, Saved::Failed)
    }
}

/// One working instance of an [`Entity`] bound to a [`Database`].
pub struct Model<'db, C, E> {
    db: &'db Database<C>,
    table: String,
    columns: Arc<[String]>,
    record: Record,
    query: QueryState,
    is_new: bool,
    last_error: Option<OrmError>,
    _entity: PhantomData<fn() -> E>,
}

impl<C, E> std::fmt::Debug for Model<'_, C, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("record", &self.record)
            .field("query", &self.query)
            .field("is_new", &self.is_new)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl<'db, C: Connection, E: Entity> Model<'db, C, E> {
    /// Bind to `db`: resolve the table's columns and seed the identity counter from the largest
    /// existing key.
    pub async fn new(db: &'db Database<C>) -> OrmResult<Self> {
        let table = match E::TABLE {
            Some(table) => table.to_string(),
            None => table_name_for(E::NAME, db.config().pluralize_tables),
        };
        let empty: Arc<[String]> = Arc::new([]);
        let mut model = Self {
            db,
            table,
            columns: empty,
            record: Record::new(),
            query: QueryState::for_key(E::PRIMARY_KEY),
            is_new: false,
            last_error: None,
            _entity: PhantomData,
        };
        model.bind(db).await?;
        Ok(model)
    }

    /// Rebind to another database, re-resolving columns and reseeding the counter there.
    pub async fn switch_connection(&mut self, db: &'db Database<C>) -> OrmResult<()> {
        self.bind(db).await
    }

    async fn bind(&mut self, db: &'db Database<C>) -> OrmResult<()> {
        let columns = db.columns_for(&self.table).await?;
        let max_stmt = Statement::max_of(&self.table, E::PRIMARY_KEY)?;
        let max = db
            .fetch_all(&max_stmt)
            .await?
            .first()
            .and_then(|r| r.get("max"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        db.identity_counter().seed(&self.table, max);
        tracing::debug!(target: "pgmodel::model", table = %self.table, max, "seeded identity counter");

        self.db = db;
        self.columns = columns;
        Ok(())
    }

    fn fail(&mut self, err: OrmError) {
        tracing::warn!(target: "pgmodel::model", table = %self.table, error = %err, "model operation failed");
        self.last_error = Some(err);
    }

    // ===== State =====

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Persisted column names, in table order.
    pub fn field_names(&self) -> &[String] {
        &self.columns
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn query_state(&self) -> &QueryState {
        &self.query
    }

    /// Whether the current key was allocated by [`Model::create`] and not yet saved.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Message of the last failure.
    pub fn error(&self) -> Option<String> {
        self.last_error.as_ref().map(ToString::to_string)
    }

    pub fn last_error(&self) -> Option<&OrmError> {
        self.last_error.as_ref()
    }

    /// Current primary key value, if set and non-null.
    pub fn id(&self) -> Option<&Value> {
        self.record.get(E::PRIMARY_KEY).filter(|v| !v.is_null())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.record.get(name)
    }

    /// Assign one field of the current record.
    pub fn assign(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.record.set(name, value);
        self
    }

    /// Bulk-assign fields. Names that are neither columns nor registered virtual fields are
    /// ignored; null values are kept. Returns `false` for an empty map.
    pub fn set(&mut self, data: impl Into<Record>) -> bool {
        let data = data.into();
        if data.is_empty() {
            return false;
        }
        for (name, value) in data.iter() {
            if self.columns.iter().any(|c| c == name) || self.record.is_virtual(name) {
                self.record.set(name, value.clone());
            }
        }
        true
    }

    /// Register a runtime-only field. See [`Record::virtual_field`].
    pub fn virtual_field(&mut self, name: impl Into<String>, value: impl Into<Value>) -> bool {
        self.record.virtual_field(name, value)
    }

    // ===== Query builder =====

    /// Target one row by key. The record's key only changes once the row is found.
    pub fn with_id(&mut self, id: impl Into<Value>) -> &mut Self {
        self.query.with_id(id);
        self
    }

    pub fn with_limit(&mut self, limit: i64, offset: Option<i64>) -> &mut Self {
        self.query.with_limit(limit, offset);
        self
    }

    pub fn with_order(&mut self, expr: &str) -> &mut Self {
        self.query.with_order(expr);
        self
    }

    pub fn with_direction(&mut self, direction: Direction) -> &mut Self {
        self.query.with_direction(direction);
        self
    }

    pub fn with_filter(&mut self, filter: impl Into<Filter>) -> &mut Self {
        self.query.with_filter(filter);
        self
    }

    pub fn with_fields(&mut self, fields: impl Into<Projection>) -> &mut Self {
        self.query.with_fields(fields);
        self
    }

    pub fn select_first(&mut self) -> &mut Self {
        self.query.select_first();
        self
    }

    pub fn select_first_where(&mut self, filter: impl Into<Filter>) -> &mut Self {
        self.query.select_first().with_filter(filter);
        self
    }

    pub fn select_last(&mut self) -> &mut Self {
        self.query.select_last();
        self
    }

    pub fn select_last_where(&mut self, filter: impl Into<Filter>) -> &mut Self {
        self.query.select_last().with_filter(filter);
        self
    }

    pub fn select_all(&mut self) -> &mut Self {
        self.query.select_all();
        self
    }

    pub fn select_all_where(&mut self, filter: impl Into<Filter>) -> &mut Self {
        self.query.select_all().with_filter(filter);
        self
    }

    /// Clear the query state. The current record is left alone.
    pub fn reset(&mut self) -> &mut Self {
        self.query.reset();
        self
    }

    // ===== Execution =====

    /// Run the accumulated query.
    ///
    /// With an effective limit of 1 the row is merged into this model's record and returned as
    /// [`Fetched::One`]; otherwise every row is returned in fetch order. Each record goes through
    /// [`Entity::POST_LOAD`] and is then sanitized.
    pub async fn execute(&mut self) -> Fetched {
        match self.try_execute().await {
            Ok(fetched) => fetched,
            Err(err) => {
                self.fail(err);
                Fetched::Failed
            }
        }
    }

    async fn try_execute(&mut self) -> OrmResult<Fetched> {
        let stmt = self
            .query
            .compile(&self.table, &self.columns, self.db.config().order_policy)?;
        let rows = self.db.fetch_all(&stmt).await?;

        if self.query.is_single() {
            let Some(mut row) = rows.into_iter().next() else {
                return Ok(Fetched::NotFound);
            };
            if let Some(hook) = E::POST_LOAD {
                hook(&mut row);
            }
            sanitize_one(&mut row, &self.columns);
            self.load(&row);
            return Ok(Fetched::One(row));
        }

        Ok(Fetched::Many(self.finish_rows(rows)))
    }

    /// Merge a fetched row into the record.
    ///
    /// Fields the projection left out keep their values when the row is the one already held.
    /// Loading a different row drops the old persisted fields first; virtual fields always stay.
    fn load(&mut self, row: &Record) {
        let key = row
            .get(E::PRIMARY_KEY)
            .filter(|id| !id.is_null())
            .or(self.query.target_id())
            .cloned();
        let other_row = matches!((self.id(), key.as_ref()), (Some(held), Some(key)) if held != key);
        if other_row {
            let virtuals: Vec<String> = self.record.virtual_field_names().map(String::from).collect();
            self.record.retain(|name, _| virtuals.iter().any(|v| v == name));
        }

        for (name, value) in row.iter() {
            if row.is_virtual(name) && !self.record.contains(name) {
                self.record.virtual_field(name, value.clone());
            } else {
                self.record.set(name, value.clone());
            }
        }
        if let Some(key) = key {
            self.record.set(E::PRIMARY_KEY, key);
        }
        self.is_new = false;
    }

    fn finish_rows(&self, mut rows: Vec<Record>) -> Vec<Record> {
        if let Some(hook) = E::POST_LOAD {
            rows.iter_mut().for_each(hook);
        }
        sanitize_many(&mut rows, &self.columns);
        rows
    }

    /// Run caller-written SQL with `:name` placeholders and return its rows, hooked and sanitized
    /// like a multi-row query.
    pub async fn raw_query<K, V>(
        &mut self,
        sql: &str,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> Fetched
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let stmt = Statement::raw(sql, params);
        match self.db.fetch_all(&stmt).await {
            Ok(rows) => Fetched::Many(self.finish_rows(rows)),
            Err(err) => {
                self.fail(err);
                Fetched::Failed
            }
        }
    }

    /// Run caller-written SQL for its side effect. `true` when at least one row was affected.
    pub async fn raw_execute<K, V>(
        &mut self,
        sql: &str,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> bool
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let stmt = Statement::raw(sql, params);
        match self.db.execute(&stmt).await {
            Ok(done) => done.rows_affected > 0,
            Err(err) => {
                self.fail(err);
                false
            }
        }
    }

    // ===== CRUD =====

    /// Insert exactly the given fields, in the given order. Returns the new key.
    pub async fn insert(&mut self, data: impl Into<Record>) -> Option<i64> {
        let data = data.into();
        if data.fields().next().is_none() {
            return None;
        }
        self.is_new = false;

        let mut stmt = Statement::insert(&self.table, data.fields());
        stmt.returning(E::PRIMARY_KEY);
        match self.db.execute(&stmt).await {
            Ok(done) if done.rows_affected > 0 => {
                let id = done
                    .last_insert_id
                    .or_else(|| data.get(E::PRIMARY_KEY).and_then(Value::as_i64))?;
                self.db.identity_counter().observe(&self.table, id);
                Some(id)
            }
            Ok(_) => None,
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    /// `UPDATE ... SET data WHERE filter`. The filter goes through the condition parser.
    ///
    /// Fails when nothing matched.
    pub async fn update(&mut self, filter: impl Into<Filter>, data: impl Into<Record>) -> bool {
        let filter = filter.into();
        let data = data.into();
        if filter.is_empty() || data.fields().next().is_none() {
            return false;
        }
        self.is_new = false;

        let stmt = Statement::update(&self.table, data.fields(), &filter.conditions());
        match self.db.execute(&stmt).await {
            Ok(done) if done.rows_affected > 0 => true,
            Ok(_) => {
                self.fail(OrmError::not_found("could not update non-existent record"));
                false
            }
            Err(err) => {
                self.fail(err);
                false
            }
        }
    }

    /// Delete the current record by its key.
    pub async fn delete(&mut self) -> bool {
        match self.id().cloned() {
            Some(id) => self.delete_by_id(id).await,
            None => false,
        }
    }

    /// Delete the row with key `id`.
    ///
    /// On success every column and virtual field of the current record is set to null and the
    /// query's target key is cleared. A key that matches nothing returns `false` and changes
    /// nothing.
    pub async fn delete_by_id(&mut self, id: impl Into<Value>) -> bool {
        let id = id.into();
        if id.is_null() {
            return false;
        }

        let stmt = Statement::delete(&self.table, &[Condition::eq(E::PRIMARY_KEY, id)]);
        match self.db.execute(&stmt).await {
            Ok(done) if done.rows_affected > 0 => {
                self.clear_fields();
                self.query.with_id(Value::Null);
                true
            }
            Ok(_) => false,
            Err(err) => {
                self.fail(err);
                false
            }
        }
    }

    /// Persist the current record: update by key when it has one and is not fresh from
    /// [`Model::create`], insert otherwise.
    ///
    /// Only table columns with non-null values are written.
    pub async fn save(&mut self) -> Saved {
        let data: Record = self
            .record
            .fields()
            .filter(|(name, value)| !value.is_null() && self.columns.iter().any(|c| c == name))
            .map(|(name, value)| (name, value.clone()))
            .collect();

        match self.id().cloned() {
            Some(id) if !self.is_new => {
                let key = Filter::new().and(E::PRIMARY_KEY, id);
                if self.update(key, data).await {
                    Saved::Updated
                } else {
                    Saved::Failed
                }
            }
            _ => {
                self.is_new = false;
                match self.insert(data).await {
                    Some(id) => {
                        self.record.set(E::PRIMARY_KEY, id);
                        Saved::Inserted(id)
                    }
                    None => Saved::Failed,
                }
            }
        }
    }

    /// Start a fresh record under the next key from the identity counter.
    pub fn create(&mut self) -> &mut Self {
        self.clear_fields();
        let id = self.db.identity_counter().next(&self.table);
        self.record.set(E::PRIMARY_KEY, id);
        self.is_new = true;
        self
    }

    fn clear_fields(&mut self) {
        self.record.null_all();
        for column in self.columns.iter() {
            self.record.set(column.as_str(), Value::Null);
        }
    }
}
