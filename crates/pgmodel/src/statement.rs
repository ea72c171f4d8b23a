//! Structured SQL statements.
//!
//! A [`Statement`] is an ordered list of [`Clause`]s plus a map of named parameters. It is only
//! turned into SQL text at the execution boundary ([`Statement::render`]), where named parameters
//! become `$1, $2, ...` placeholders in order of first use.
//!
//! Clauses render in a fixed order regardless of the order they were pushed in:
//! head (`SELECT`/`INSERT`/`UPDATE`/`DELETE`), `WHERE`, `ORDER BY`, direction, `LIMIT`,
//! `OFFSET`, `RETURNING`.

use std::fmt::Write as _;

use crate::condition::{Condition, is_supported_operator};
use crate::error::{OrmError, OrmResult};
use crate::value::Value;

/// What a statement does, for logging and dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    /// Column listing of a table.
    SchemaColumns,
    /// Largest primary key of a table.
    MaxKey,
    /// Caller-supplied SQL.
    Raw,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
            StatementKind::SchemaColumns => "schema_columns",
            StatementKind::MaxKey => "max_key",
            StatementKind::Raw => "raw",
        }
    }

    /// Whether the statement returns rows rather than an affected-row count.
    pub fn returns_rows(&self) -> bool {
        matches!(
            self,
            StatementKind::Select | StatementKind::SchemaColumns | StatementKind::MaxKey
        )
    }
}

/// `field operator :param`
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub operator: String,
    pub param: String,
}

/// One piece of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Select { fields: Vec<String> },
    /// `(column, param)` pairs.
    InsertInto { columns: Vec<(String, String)> },
    /// `(column, param)` pairs.
    Set { assignments: Vec<(String, String)> },
    DeleteFrom,
    Where(Vec<Predicate>),
    OrderBy(String),
    Direction(String),
    Limit(String),
    Offset(String),
    Returning(String),
    /// SQL text with `:name` placeholders.
    Raw(String),
}

impl Clause {
    fn rank(&self) -> u8 {
        match self {
            Clause::Select { .. }
            | Clause::InsertInto { .. }
            | Clause::Set { .. }
            | Clause::DeleteFrom
            | Clause::Raw(_) => 0,
            Clause::Where(_) => 1,
            Clause::OrderBy(_) => 2,
            Clause::Direction(_) => 3,
            Clause::Limit(_) => 4,
            Clause::Offset(_) => 5,
            Clause::Returning(_) => 6,
        }
    }
}

/// A statement under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    kind: StatementKind,
    table: String,
    clauses: Vec<Clause>,
    params: Vec<(String, Value)>,
}

impl Statement {
    pub fn new(kind: StatementKind, table: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            clauses: Vec::new(),
            params: Vec::new(),
        }
    }

    /// `SELECT <fields> FROM <table>`
    pub fn select(table: impl Into<String>, fields: Vec<String>) -> Self {
        let mut stmt = Self::new(StatementKind::Select, table);
        stmt.push(Clause::Select { fields });
        stmt
    }

    /// `INSERT INTO <table> (<columns>) VALUES (...)`, columns in the given order.
    pub fn insert<'a>(
        table: impl Into<String>,
        values: impl IntoIterator<Item = (&'a str, &'a Value)>,
    ) -> Self {
        let mut stmt = Self::new(StatementKind::Insert, table);
        let columns = values
            .into_iter()
            .map(|(column, value)| {
                let param = stmt.bind(column, value.clone());
                (column.to_string(), param)
            })
            .collect();
        stmt.push(Clause::InsertInto { columns });
        stmt
    }

    /// `UPDATE <table> SET ... WHERE ...`
    pub fn update<'a>(
        table: impl Into<String>,
        values: impl IntoIterator<Item = (&'a str, &'a Value)>,
        conditions: &[Condition],
    ) -> Self {
        let mut stmt = Self::new(StatementKind::Update, table);
        let assignments = values
            .into_iter()
            .map(|(column, value)| {
                let param = stmt.bind(column, value.clone());
                (column.to_string(), param)
            })
            .collect();
        stmt.push(Clause::Set { assignments });
        stmt.push_where(conditions);
        stmt
    }

    /// `DELETE FROM <table> WHERE ...`
    pub fn delete(table: impl Into<String>, conditions: &[Condition]) -> Self {
        let mut stmt = Self::new(StatementKind::Delete, table);
        stmt.push(Clause::DeleteFrom);
        stmt.push_where(conditions);
        stmt
    }

    /// Column names of `table` in ordinal order, from `information_schema`.
    pub fn columns_of(table: &str) -> Self {
        let mut stmt = Self::new(StatementKind::SchemaColumns, table);
        stmt.params.push(("table".to_string(), Value::from(table)));
        stmt.push(Clause::Raw(
            "SELECT column_name::text AS column_name FROM information_schema.columns \
             WHERE table_name::text = :table AND table_schema = ANY(current_schemas(false)) \
             ORDER BY ordinal_position"
                .to_string(),
        ));
        stmt
    }

    /// `SELECT MAX(<key>) AS max FROM <table>`
    pub fn max_of(table: &str, key: &str) -> OrmResult<Self> {
        check_ident(table)?;
        check_ident(key)?;
        let mut stmt = Self::new(StatementKind::MaxKey, table);
        stmt.push(Clause::Raw(format!("SELECT MAX({key}) AS max FROM {table}")));
        Ok(stmt)
    }

    /// Caller-supplied SQL with `:name` placeholders resolved from `params`.
    pub fn raw<K, V>(sql: impl Into<String>, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let mut stmt = Self::new(StatementKind::Raw, "");
        stmt.params = params
            .into_iter()
            .map(|(k, v)| {
                let k: String = k.into();
                (k.trim_start_matches(':').to_string(), v.into())
            })
            .collect();
        stmt.push(Clause::Raw(sql.into()));
        stmt
    }

    /// Register a parameter and return its unique name (`email`, `email_2`, ...).
    pub fn bind(&mut self, hint: &str, value: impl Into<Value>) -> String {
        let base: String = hint
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        let base = if base.is_empty() { "p".to_string() } else { base };
        let mut name = base.clone();
        let mut n = 1;
        while self.params.iter().any(|(k, _)| *k == name) {
            n += 1;
            name = format!("{base}_{n}");
        }
        self.params.push((name.clone(), value.into()));
        name
    }

    pub fn push(&mut self, clause: Clause) -> &mut Self {
        self.clauses.push(clause);
        self
    }

    /// Append a `WHERE` clause joining `conditions` with `AND`. No-op when empty.
    pub fn push_where(&mut self, conditions: &[Condition]) -> &mut Self {
        if conditions.is_empty() {
            return self;
        }
        let predicates = conditions
            .iter()
            .map(|c| Predicate {
                field: c.field.clone(),
                operator: c.operator.clone(),
                param: self.bind(&c.field, c.operand.clone()),
            })
            .collect();
        self.push(Clause::Where(predicates))
    }

    pub fn returning(&mut self, column: impl Into<String>) -> &mut Self {
        self.push(Clause::Returning(column.into()))
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Column named by a `RETURNING` clause, if any.
    pub fn returning_column(&self) -> Option<&str> {
        self.clauses.iter().find_map(|c| match c {
            Clause::Returning(col) => Some(col.as_str()),
            _ => None,
        })
    }

    /// Render to executable SQL with `$n` placeholders and the matching parameter list.
    pub fn render(&self) -> OrmResult<(String, Vec<&Value>)> {
        let mut order: Vec<&str> = Vec::new();
        let mut values: Vec<&Value> = Vec::new();
        let sql = self.render_with(|name| {
            let value = self.param(name).ok_or_else(|| {
                OrmError::validation(format!("missing value for parameter :{name}"))
            })?;
            let pos = match order.iter().position(|n| *n == name) {
                Some(pos) => pos,
                None => {
                    order.push(self.param_name(name));
                    values.push(value);
                    order.len() - 1
                }
            };
            Ok(format!("${}", pos + 1))
        })?;
        Ok((sql, values))
    }

    /// Render with `:name` placeholders, for logging and introspection.
    pub fn to_named_sql(&self) -> String {
        self.render_with(|name| Ok(format!(":{name}")))
            .unwrap_or_else(|e| format!("<invalid statement: {e}>"))
    }

    fn param_name(&self, name: &str) -> &str {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(k, _)| k.as_str())
            .unwrap_or_default()
    }

    fn render_with(
        &self,
        mut placeholder: impl FnMut(&str) -> OrmResult<String>,
    ) -> OrmResult<String> {
        let mut clauses: Vec<&Clause> = self.clauses.iter().collect();
        clauses.sort_by_key(|c| c.rank());

        let mut out = String::new();
        for clause in clauses {
            match clause {
                Clause::Select { fields } => {
                    check_ident(&self.table)?;
                    let fields = if fields.is_empty() {
                        "*".to_string()
                    } else {
                        for f in fields {
                            if f != "*" {
                                check_ident(f)?;
                            }
                        }
                        fields.join(", ")
                    };
                    let _ = write!(out, "SELECT {fields} FROM {}", self.table);
                }
                Clause::InsertInto { columns } => {
                    check_ident(&self.table)?;
                    if columns.is_empty() {
                        let _ = write!(out, "INSERT INTO {} DEFAULT VALUES", self.table);
                        continue;
                    }
                    let mut names = Vec::with_capacity(columns.len());
                    let mut slots = Vec::with_capacity(columns.len());
                    for (column, param) in columns {
                        check_ident(column)?;
                        names.push(column.as_str());
                        slots.push(placeholder(param)?);
                    }
                    let _ = write!(
                        out,
                        "INSERT INTO {} ({}) VALUES ({})",
                        self.table,
                        names.join(", "),
                        slots.join(", ")
                    );
                }
                Clause::Set { assignments } => {
                    check_ident(&self.table)?;
                    if assignments.is_empty() {
                        return Err(OrmError::validation("UPDATE requires at least one SET"));
                    }
                    let mut sets = Vec::with_capacity(assignments.len());
                    for (column, param) in assignments {
                        check_ident(column)?;
                        sets.push(format!("{column} = {}", placeholder(param)?));
                    }
                    let _ = write!(out, "UPDATE {} SET {}", self.table, sets.join(", "));
                }
                Clause::DeleteFrom => {
                    check_ident(&self.table)?;
                    let _ = write!(out, "DELETE FROM {}", self.table);
                }
                Clause::Where(predicates) => {
                    if predicates.is_empty() {
                        continue;
                    }
                    let mut parts = Vec::with_capacity(predicates.len());
                    for p in predicates {
                        check_ident(&p.field)?;
                        if !is_supported_operator(&p.operator) {
                            return Err(OrmError::validation(format!(
                                "unsupported operator '{}' for field '{}'",
                                p.operator, p.field
                            )));
                        }
                        parts.push(format!("{} {} {}", p.field, p.operator, placeholder(&p.param)?));
                    }
                    let _ = write!(out, " WHERE {}", parts.join(" AND "));
                }
                Clause::OrderBy(expr) => {
                    let _ = write!(out, " ORDER BY {expr}");
                }
                Clause::Direction(dir) => {
                    if !dir.eq_ignore_ascii_case("ASC") && !dir.eq_ignore_ascii_case("DESC") {
                        return Err(OrmError::validation(format!(
                            "sort direction must be ASC or DESC, got '{dir}'"
                        )));
                    }
                    let _ = write!(out, " {}", dir.to_ascii_uppercase());
                }
                Clause::Limit(param) => {
                    let _ = write!(out, " LIMIT {}", placeholder(param)?);
                }
                Clause::Offset(param) => {
                    let _ = write!(out, " OFFSET {}", placeholder(param)?);
                }
                Clause::Returning(column) => {
                    check_ident(column)?;
                    let _ = write!(out, " RETURNING {column}");
                }
                Clause::Raw(sql) => out.push_str(&substitute_named(sql, &mut placeholder)?),
            }
        }
        Ok(out)
    }
}

/// Validate an unquoted, optionally dotted identifier: `[A-Za-z_][A-Za-z0-9_$]*`.
pub fn check_ident(s: &str) -> OrmResult<()> {
    let valid = !s.is_empty()
        && s.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        });
    if valid {
        Ok(())
    } else {
        Err(OrmError::validation(format!("invalid identifier: '{s}'")))
    }
}

/// Replace `:name` placeholders outside of quotes. `::type` casts are left alone.
fn substitute_named(
    sql: &str,
    placeholder: &mut impl FnMut(&str) -> OrmResult<String>,
) -> OrmResult<String> {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.char_indices().peekable();
    let mut quote: Option<char> = None;

    while let Some((i, c)) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
            }
            ':' => match chars.peek() {
                Some((_, ':')) => {
                    out.push_str("::");
                    chars.next();
                }
                Some((_, n)) if n.is_ascii_alphabetic() || *n == '_' => {
                    let start = i + 1;
                    let mut end = start;
                    while let Some((j, n)) = chars.peek() {
                        if n.is_ascii_alphanumeric() || *n == '_' {
                            end = j + n.len_utf8();
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    out.push_str(&placeholder(&sql[start..end])?);
                }
                _ => out.push(':'),
            },
            _ => out.push(c),
        }
    }
    Ok(out)
}
