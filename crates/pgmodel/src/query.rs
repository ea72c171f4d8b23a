//! Chainable query state.
//!
//! [`QueryState`] accumulates projection, filter, ordering, pagination and an optional target key
//! across chained calls, and compiles them into one `SELECT` [`Statement`]. State persists until
//! [`QueryState::reset`] is called, so unrelated lookups on the same instance should reset first.

use std::fmt;

use crate::condition::{Condition, Filter};
use crate::config::OrderPolicy;
use crate::error::{OrmError, OrmResult};
use crate::statement::{Clause, Statement, StatementKind};
use crate::value::Value;

/// Sort direction appended after `ORDER BY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A projection: either `*` or a list of field names.
///
/// Built from a comma-separated string (`"id, filename"`) or any list of names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection(Vec<String>);

impl Projection {
    fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields: Vec<String> = names
            .into_iter()
            .flat_map(|n| {
                n.as_ref()
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect::<Vec<_>>()
            })
            .filter(|s| !s.is_empty())
            .collect();
        if fields.iter().any(|f| f == "*") {
            Self::default()
        } else {
            Self(fields)
        }
    }

    pub fn is_all(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for Projection {
    fn from(s: &str) -> Self {
        Self::from_names([s])
    }
}

impl From<String> for Projection {
    fn from(s: String) -> Self {
        Self::from_names([s])
    }
}

impl From<Vec<&str>> for Projection {
    fn from(v: Vec<&str>) -> Self {
        Self::from_names(v)
    }
}

impl From<Vec<String>> for Projection {
    fn from(v: Vec<String>) -> Self {
        Self::from_names(v)
    }
}

impl From<&[&str]> for Projection {
    fn from(v: &[&str]) -> Self {
        Self::from_names(v)
    }
}

impl<const N: usize> From<[&str; N]> for Projection {
    fn from(v: [&str; N]) -> Self {
        Self::from_names(v)
    }
}

/// Strip every non-word character that is immediately followed by a space, together with that
/// space.
pub fn strip_order_expr(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len());
    let mut chars = expr.chars().peekable();
    while let Some(c) = chars.next() {
        let is_word = c.is_ascii_alphanumeric() || c == '_';
        if !is_word && chars.peek() == Some(&' ') {
            chars.next();
            continue;
        }
        out.push(c);
    }
    out
}

/// Check each comma-separated order term is `column [ASC|DESC]`.
fn check_order_terms(expr: &str, columns: &[String]) -> OrmResult<()> {
    for term in expr.split(',') {
        let mut tokens = term.split_whitespace();
        let Some(column) = tokens.next() else {
            return Err(OrmError::validation(format!("empty order term in '{expr}'")));
        };
        if !columns.iter().any(|c| c == column) {
            return Err(OrmError::validation(format!(
                "cannot order by '{column}': not a column"
            )));
        }
        match tokens.next() {
            None => {}
            Some(dir) if dir.eq_ignore_ascii_case("ASC") || dir.eq_ignore_ascii_case("DESC") => {}
            Some(other) => {
                return Err(OrmError::validation(format!(
                    "unexpected '{other}' in order term '{}'",
                    term.trim()
                )));
            }
        }
        if let Some(extra) = tokens.next() {
            return Err(OrmError::validation(format!(
                "unexpected '{extra}' in order term '{}'",
                term.trim()
            )));
        }
    }
    Ok(())
}

/// Accumulated query fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    primary_key: String,
    fields: Projection,
    conditions: Vec<Condition>,
    limit: Option<i64>,
    offset: Option<i64>,
    order: Option<String>,
    direction: Option<Direction>,
    target_id: Option<Value>,
    build_error: Option<String>,
}

impl Default for QueryState {
    fn default() -> Self {
        Self::for_key("id")
    }
}

impl QueryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty state for a table whose primary key is `primary_key`.
    pub fn for_key(primary_key: impl Into<String>) -> Self {
        Self {
            primary_key: primary_key.into(),
            fields: Projection::default(),
            conditions: Vec::new(),
            limit: None,
            offset: None,
            order: None,
            direction: None,
            target_id: None,
            build_error: None,
        }
    }

    /// Target a single row by primary key.
    ///
    /// When no filter is set at execution time this becomes `pk = id` with `LIMIT 1`.
    pub fn with_id(&mut self, id: impl Into<Value>) -> &mut Self {
        let id = id.into();
        self.target_id = (!id.is_null()).then_some(id);
        self
    }

    /// Set `LIMIT` (must be positive) and optionally `OFFSET` (must not be negative).
    ///
    /// A rejected call is reported at compile time unless a later valid limit replaces it.
    pub fn with_limit(&mut self, limit: i64, offset: Option<i64>) -> &mut Self {
        if limit <= 0 {
            self.build_error = Some(format!("limit must be a positive integer, got {limit}"));
            return self;
        }
        if let Some(o) = offset
            && o < 0
        {
            self.build_error = Some(format!("offset must not be negative, got {o}"));
            return self;
        }
        self.limit = Some(limit);
        self.offset = offset;
        self.build_error = None;
        self
    }

    /// Order expression, with `\W ` sequences stripped.
    pub fn with_order(&mut self, expr: &str) -> &mut Self {
        let cleaned = strip_order_expr(expr);
        self.order = (!cleaned.trim().is_empty()).then_some(cleaned);
        self
    }

    pub fn with_direction(&mut self, direction: Direction) -> &mut Self {
        self.direction = Some(direction);
        self
    }

    /// Replace the filter. An empty filter clears all conditions.
    pub fn with_filter(&mut self, filter: impl Into<Filter>) -> &mut Self {
        self.conditions = filter.into().conditions();
        self
    }

    /// Projection; `"*"` or an empty list selects every column.
    pub fn with_fields(&mut self, fields: impl Into<Projection>) -> &mut Self {
        self.fields = fields.into();
        self
    }

    /// `LIMIT 1`, direction cleared.
    pub fn select_first(&mut self) -> &mut Self {
        self.limit = Some(1);
        self.direction = None;
        self.build_error = None;
        self
    }

    /// `LIMIT 1 ... DESC`, ordered by the primary key unless an order is already set.
    pub fn select_last(&mut self) -> &mut Self {
        self.limit = Some(1);
        self.direction = Some(Direction::Desc);
        self.build_error = None;
        if self.order.is_none() {
            self.order = Some(self.primary_key.clone());
        }
        self
    }

    /// No limit.
    pub fn select_all(&mut self) -> &mut Self {
        self.limit = None;
        self.build_error = None;
        self
    }

    /// Back to a fresh state (all columns, no filter, no limit/offset/order/direction/id).
    pub fn reset(&mut self) -> &mut Self {
        *self = Self::for_key(std::mem::take(&mut self.primary_key));
        self
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn fields(&self) -> &Projection {
        &self.fields
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn limit(&self) -> Option<i64> {
        self.limit
    }

    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    pub fn order(&self) -> Option<&str> {
        self.order.as_deref()
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn target_id(&self) -> Option<&Value> {
        self.target_id.as_ref()
    }

    pub fn build_error(&self) -> Option<&str> {
        self.build_error.as_deref()
    }

    /// Projection as SQL, e.g. `id, filename, email` or `*`.
    pub fn fields_sql(&self) -> String {
        if self.fields.is_all() {
            "*".to_string()
        } else {
            self.fields.names().join(", ")
        }
    }

    /// Conditions as SQL with named placeholders, e.g. `filename = :filename`.
    pub fn conditions_sql(&self) -> String {
        let mut stmt = Statement::new(StatementKind::Select, "");
        stmt.push_where(&self.conditions);
        stmt.clauses()
            .iter()
            .find_map(|c| match c {
                Clause::Where(predicates) => Some(
                    predicates
                        .iter()
                        .map(|p| format!("{} {} :{}", p.field, p.operator, p.param))
                        .collect::<Vec<_>>()
                        .join(" AND "),
                ),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Whether execution returns a single row.
    pub fn is_single(&self) -> bool {
        self.effective_limit() == Some(1)
    }

    fn targets_id(&self) -> bool {
        self.target_id.is_some() && self.conditions.is_empty()
    }

    fn effective_limit(&self) -> Option<i64> {
        if self.targets_id() { Some(1) } else { self.limit }
    }

    /// Compile into a `SELECT` against `table`.
    ///
    /// `columns` are the table's known columns, used to check order terms under
    /// [`OrderPolicy::AllowList`].
    pub fn compile(
        &self,
        table: &str,
        columns: &[String],
        policy: OrderPolicy,
    ) -> OrmResult<Statement> {
        if let Some(err) = &self.build_error {
            return Err(OrmError::validation(err.clone()));
        }

        let mut stmt = Statement::select(table, self.fields.names().to_vec());

        match &self.target_id {
            Some(id) if self.conditions.is_empty() => {
                stmt.push_where(&[Condition::eq(self.primary_key.as_str(), id.clone())]);
            }
            _ => {
                stmt.push_where(&self.conditions);
            }
        }

        let order = match (&self.order, self.direction) {
            (Some(order), _) => Some(order.clone()),
            (None, Some(_)) => Some(self.primary_key.clone()),
            (None, None) => None,
        };
        if let Some(order) = order {
            if policy == OrderPolicy::AllowList {
                check_order_terms(&order, columns)?;
            }
            stmt.push(Clause::OrderBy(order));
        }
        if let Some(direction) = self.direction {
            stmt.push(Clause::Direction(direction.as_str().to_string()));
        }

        match self.effective_limit() {
            Some(limit) => {
                let param = stmt.bind("limit", limit);
                stmt.push(Clause::Limit(param));
                if let Some(offset) = self.offset {
                    let param = stmt.bind("offset", offset);
                    stmt.push(Clause::Offset(param));
                }
            }
            None => {
                if let Some(offset) = self.offset {
                    tracing::debug!(target: "pgmodel::query", offset, "offset ignored without a limit");
                }
            }
        }

        Ok(stmt)
    }
}

#[cfg(test)]
mod tests;
