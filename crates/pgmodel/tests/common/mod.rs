#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use pgmodel::{
    Clause, Connection, Database, Entity, Executed, OrmError, OrmResult, Record, Statement,
    StatementKind, Value,
};

#[derive(Debug, Default)]
struct Table {
    columns: Vec<String>,
    unique: Vec<String>,
    rows: Vec<Record>,
    serial: i64,
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, Table>,
    raw: Vec<(String, Vec<Record>)>,
    log: Vec<String>,
}

/// In-memory stand-in for a Postgres connection.
///
/// Evaluates structured statements directly: column listing, `MAX(key)`, and single-table
/// SELECT/INSERT/UPDATE/DELETE with `AND`-joined predicates. Raw SQL is answered from canned
/// responses registered with [`MemoryConnection::respond_raw`].
#[derive(Debug, Default)]
pub struct MemoryConnection {
    state: Mutex<State>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, name: &str, columns: &[&str], unique: &[&str]) -> Self {
        self.lock().tables.insert(
            name.to_string(),
            Table {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                unique: unique.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
                serial: 0,
            },
        );
        self
    }

    /// Seed a row directly, bypassing the identity counter.
    pub fn seed(&self, table: &str, row: impl Into<Record>) {
        let mut state = self.lock();
        let t = state.tables.get_mut(table).expect("unknown table");
        let given = row.into();
        let mut full = Record::new();
        for c in &t.columns {
            full.set(c.as_str(), given.get(c).cloned().unwrap_or(Value::Null));
        }
        if let Some(id) = full.get("id").and_then(Value::as_i64) {
            t.serial = t.serial.max(id);
        }
        t.rows.push(full);
    }

    /// Answer raw statements whose named SQL equals `sql` with `rows`.
    pub fn respond_raw(&self, sql: &str, rows: Vec<Record>) {
        self.lock().raw.push((sql.to_string(), rows));
    }

    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Named SQL of every statement received, in order.
    pub fn log(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn run(&self, stmt: &Statement) -> OrmResult<(Vec<Record>, u64, Option<i64>)> {
        // Fail the same way the Postgres client would on statements that cannot render.
        stmt.render()?;
        let mut state = self.lock();
        state.log.push(stmt.to_named_sql());

        match stmt.kind() {
            StatementKind::SchemaColumns => {
                let table = stmt.param("table").map(Value::to_text).unwrap_or_default();
                let rows = state
                    .tables
                    .get(&table)
                    .map(|t| {
                        t.columns
                            .iter()
                            .map(|c| Record::from([("column_name", Value::from(c.as_str()))]))
                            .collect()
                    })
                    .unwrap_or_default();
                Ok((rows, 0, None))
            }
            StatementKind::MaxKey => {
                let sql = stmt.to_named_sql();
                let key = sql
                    .split_once("MAX(")
                    .and_then(|(_, rest)| rest.split_once(')'))
                    .map(|(k, _)| k.to_string())
                    .unwrap_or_else(|| "id".to_string());
                let t = table(&state, stmt.table())?;
                let max = t
                    .rows
                    .iter()
                    .filter_map(|r| r.get(&key).and_then(Value::as_i64))
                    .max();
                Ok((vec![Record::from([("max", Value::from(max))])], 0, None))
            }
            StatementKind::Select => {
                let t = table(&state, stmt.table())?;
                let rows = select(t, stmt)?;
                Ok((rows, 0, None))
            }
            StatementKind::Insert => {
                let t = table_mut(&mut state, stmt.table())?;
                let id = insert(t, stmt)?;
                Ok((Vec::new(), 1, id))
            }
            StatementKind::Update => {
                let t = table_mut(&mut state, stmt.table())?;
                let n = update(t, stmt)?;
                Ok((Vec::new(), n, None))
            }
            StatementKind::Delete => {
                let t = table_mut(&mut state, stmt.table())?;
                let predicates = where_of(stmt);
                check_columns(t, predicates.iter().map(|p| p.field.as_str()))?;
                let before = t.rows.len();
                let mut keep = Vec::new();
                for row in t.rows.drain(..) {
                    if !matches_all(&row, &predicates, stmt) {
                        keep.push(row);
                    }
                }
                t.rows = keep;
                Ok((Vec::new(), (before - t.rows.len()) as u64, None))
            }
            StatementKind::Raw => {
                let sql = stmt.to_named_sql();
                let rows = state
                    .raw
                    .iter()
                    .find(|(s, _)| *s == sql)
                    .map(|(_, rows)| rows.clone())
                    .ok_or_else(|| OrmError::Other(format!("no canned response for: {sql}")))?;
                let n = rows.len() as u64;
                Ok((rows, n, None))
            }
        }
    }
}

impl Connection for MemoryConnection {
    async fn fetch_all(&self, stmt: &Statement) -> OrmResult<Vec<Record>> {
        self.run(stmt).map(|(rows, _, _)| rows)
    }

    async fn execute(&self, stmt: &Statement) -> OrmResult<Executed> {
        self.run(stmt).map(|(_, rows_affected, last_insert_id)| Executed {
            rows_affected,
            last_insert_id,
        })
    }
}

fn table<'a>(state: &'a State, name: &str) -> OrmResult<&'a Table> {
    state
        .tables
        .get(name)
        .ok_or_else(|| OrmError::Schema(format!("relation \"{name}\" does not exist")))
}

fn table_mut<'a>(state: &'a mut State, name: &str) -> OrmResult<&'a mut Table> {
    state
        .tables
        .get_mut(name)
        .ok_or_else(|| OrmError::Schema(format!("relation \"{name}\" does not exist")))
}

fn check_columns<'a>(t: &Table, names: impl IntoIterator<Item = &'a str>) -> OrmResult<()> {
    for name in names {
        if !t.columns.iter().any(|c| c == name) {
            return Err(OrmError::Schema(format!("column \"{name}\" does not exist")));
        }
    }
    Ok(())
}

fn where_of(stmt: &Statement) -> Vec<pgmodel::statement::Predicate> {
    stmt.clauses()
        .iter()
        .find_map(|c| match c {
            Clause::Where(p) => Some(p.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

fn param(stmt: &Statement, name: &str) -> Value {
    stmt.param(name).cloned().unwrap_or(Value::Null)
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if a.is_null() || b.is_null() {
        return None;
    }
    let numeric = matches!(a, Value::Int(_) | Value::Float(_))
        || matches!(b, Value::Int(_) | Value::Float(_));
    if numeric {
        return a.as_f64()?.partial_cmp(&b.as_f64()?);
    }
    Some(a.to_text().cmp(&b.to_text()))
}

fn like(text: &str, pattern: &str) -> bool {
    fn go(t: &[char], p: &[char]) -> bool {
        match p.split_first() {
            None => t.is_empty(),
            Some(('%', rest)) => (0..=t.len()).any(|i| go(&t[i..], rest)),
            Some(('_', rest)) => !t.is_empty() && go(&t[1..], rest),
            Some((c, rest)) => t.first() == Some(c) && go(&t[1..], rest),
        }
    }
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    go(&t, &p)
}

fn matches_all(row: &Record, predicates: &[pgmodel::statement::Predicate], stmt: &Statement) -> bool {
    predicates.iter().all(|p| {
        let left = row.get(&p.field).cloned().unwrap_or(Value::Null);
        let right = param(stmt, &p.param);
        match p.operator.to_ascii_uppercase().as_str() {
            "LIKE" => !left.is_null() && like(&left.to_text(), &right.to_text()),
            "ILIKE" => {
                !left.is_null()
                    && like(&left.to_text().to_lowercase(), &right.to_text().to_lowercase())
            }
            op => match compare(&left, &right) {
                None => false,
                Some(ord) => match op {
                    "=" => ord == Ordering::Equal,
                    "!=" | "<>" => ord != Ordering::Equal,
                    "<" => ord == Ordering::Less,
                    ">" => ord == Ordering::Greater,
                    "<=" => ord != Ordering::Greater,
                    ">=" => ord != Ordering::Less,
                    _ => false,
                },
            },
        }
    })
}

fn select(t: &Table, stmt: &Statement) -> OrmResult<Vec<Record>> {
    let mut fields: Vec<String> = Vec::new();
    let mut order: Vec<(String, bool)> = Vec::new();
    let mut desc_all = false;
    let mut limit = None;
    let mut offset = 0usize;

    for clause in stmt.clauses() {
        match clause {
            Clause::Select { fields: f } => fields = f.clone(),
            Clause::OrderBy(expr) => {
                for term in expr.split(',') {
                    let mut tokens = term.split_whitespace();
                    if let Some(col) = tokens.next() {
                        let desc = tokens.next().is_some_and(|d| d.eq_ignore_ascii_case("DESC"));
                        order.push((col.to_string(), desc));
                    }
                }
            }
            Clause::Direction(d) => desc_all = d.eq_ignore_ascii_case("DESC"),
            Clause::Limit(p) => limit = param(stmt, p).as_i64().map(|n| n as usize),
            Clause::Offset(p) => offset = param(stmt, p).as_i64().unwrap_or(0) as usize,
            _ => {}
        }
    }
    if desc_all && let Some(last) = order.last_mut() {
        last.1 = true;
    }

    let predicates = where_of(stmt);
    check_columns(t, fields.iter().map(String::as_str))?;
    check_columns(t, predicates.iter().map(|p| p.field.as_str()))?;
    check_columns(t, order.iter().map(|(c, _)| c.as_str()))?;

    let mut rows: Vec<Record> = t
        .rows
        .iter()
        .filter(|r| matches_all(r, &predicates, stmt))
        .cloned()
        .collect();
    rows.sort_by(|a, b| {
        for (col, desc) in &order {
            let av = a.get(col).cloned().unwrap_or(Value::Null);
            let bv = b.get(col).cloned().unwrap_or(Value::Null);
            let ord = compare(&av, &bv).unwrap_or(Ordering::Equal);
            let ord = if *desc { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });

    let rows = rows.into_iter().skip(offset);
    let rows: Vec<Record> = match limit {
        Some(n) => rows.take(n).collect(),
        None => rows.collect(),
    };

    Ok(rows
        .into_iter()
        .map(|r| {
            if fields.is_empty() {
                r
            } else {
                fields
                    .iter()
                    .map(|f| (f.as_str(), r.get(f).cloned().unwrap_or(Value::Null)))
                    .collect()
            }
        })
        .collect())
}

fn check_unique(t: &Table, row: &Record, skip: Option<usize>) -> OrmResult<()> {
    for col in &t.unique {
        let Some(v) = row.get(col).filter(|v| !v.is_null()) else {
            continue;
        };
        let clash = t
            .rows
            .iter()
            .enumerate()
            .any(|(i, other)| Some(i) != skip && other.get(col) == Some(v));
        if clash {
            return Err(OrmError::UniqueViolation(format!(
                "t_{col}_key: duplicate key value violates unique constraint \"t_{col}_key\""
            )));
        }
    }
    Ok(())
}

fn insert(t: &mut Table, stmt: &Statement) -> OrmResult<Option<i64>> {
    let columns = stmt
        .clauses()
        .iter()
        .find_map(|c| match c {
            Clause::InsertInto { columns } => Some(columns.clone()),
            _ => None,
        })
        .unwrap_or_default();
    check_columns(t, columns.iter().map(|(c, _)| c.as_str()))?;

    let mut row = Record::new();
    for c in &t.columns {
        row.set(c.as_str(), Value::Null);
    }
    for (column, p) in &columns {
        row.set(column.as_str(), param(stmt, p));
    }
    let has_id = t.columns.iter().any(|c| c == "id");
    if has_id {
        match row.get("id").and_then(Value::as_i64) {
            Some(id) => {
                if t.rows.iter().any(|r| r.get("id").and_then(Value::as_i64) == Some(id)) {
                    return Err(OrmError::UniqueViolation(
                        "t_pkey: duplicate key value violates unique constraint \"t_pkey\"".into(),
                    ));
                }
                row.set("id", id);
            }
            None => row.set("id", t.serial + 1),
        }
    }
    check_unique(t, &row, None)?;

    let id = row.get("id").and_then(Value::as_i64);
    if let Some(id) = id {
        t.serial = t.serial.max(id);
    }
    t.rows.push(row);

    Ok(stmt
        .returning_column()
        .and_then(|col| t.rows.last().and_then(|r| r.get(col)).and_then(Value::as_i64)))
}

fn update(t: &mut Table, stmt: &Statement) -> OrmResult<u64> {
    let assignments = stmt
        .clauses()
        .iter()
        .find_map(|c| match c {
            Clause::Set { assignments } => Some(assignments.clone()),
            _ => None,
        })
        .unwrap_or_default();
    let predicates = where_of(stmt);
    check_columns(t, assignments.iter().map(|(c, _)| c.as_str()))?;
    check_columns(t, predicates.iter().map(|p| p.field.as_str()))?;

    let targets: Vec<usize> = t
        .rows
        .iter()
        .enumerate()
        .filter(|(_, r)| matches_all(r, &predicates, stmt))
        .map(|(i, _)| i)
        .collect();
    for &i in &targets {
        let mut updated = t.rows[i].clone();
        for (column, p) in &assignments {
            updated.set(column.as_str(), param(stmt, p));
        }
        check_unique(t, &updated, Some(i))?;
        t.rows[i] = updated;
    }
    Ok(targets.len() as u64)
}

/// `files(id, filename, userid, email UNIQUE)`
pub fn files_connection() -> MemoryConnection {
    MemoryConnection::new().with_table("files", &["id", "filename", "userid", "email"], &["email"])
}

pub fn files_db() -> Database<MemoryConnection> {
    Database::new(files_connection())
}

/// Model over `files` without hooks.
pub struct File;

impl Entity for File {
    const NAME: &'static str = "File";
}

/// Model over `files` that adds a `file_hash` virtual field on load.
pub struct HashedFile;

impl Entity for HashedFile {
    const NAME: &'static str = "HashedFile";
    const TABLE: Option<&'static str> = Some("files");
    const POST_LOAD: Option<pgmodel::PostLoadFn> = Some(add_file_hash);
}

pub fn add_file_hash(record: &mut Record) {
    let filename = record.get("filename").map(Value::to_text).unwrap_or_default();
    let id = record.get("id").map(Value::to_text).unwrap_or_default();
    record.virtual_field("file_hash", format!("{filename}#{id}"));
}
