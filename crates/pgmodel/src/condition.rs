//! Filter maps and the condition parser.
//!
//! A filter maps field names to either a plain value (equality) or a string of the form
//! `"OP operand"`:
//!
//! ```ignore
//! use pgmodel::Filter;
//!
//! let f = Filter::new()
//!     .and("email", "x@y.com")   // email = 'x@y.com'
//!     .and("userid", "> 5")      // userid > '5'
//!     .and("filename", "LIKE %.txt");
//! ```
//!
//! Only the first whitespace-separated token after the operator is used as the operand, so
//! operands containing spaces cannot be expressed through a filter.

use crate::value::Value;

/// Comparison operators accepted when a condition is compiled into a statement.
pub const SUPPORTED_OPERATORS: &[&str] = &["=", "!=", "<>", "<", ">", "<=", ">=", "LIKE", "ILIKE"];

/// Whether `op` is one of [`SUPPORTED_OPERATORS`] (case-insensitive).
pub fn is_supported_operator(op: &str) -> bool {
    SUPPORTED_OPERATORS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(op))
}

/// Split a filter value into `(operator, operand)`.
///
/// - A value that is not text, or text without a space, compares with `=` and is used verbatim.
/// - Text containing a space splits on the first space: the part before is the operator, and the
///   first token after it is the operand.
pub fn parse(value: &Value) -> (String, Value) {
    if let Value::Text(s) = value
        && let Some((op, rest)) = s.split_once(' ')
    {
        let operand = rest.split(' ').next().unwrap_or_default();
        return (op.to_string(), Value::Text(operand.to_string()));
    }
    ("=".to_string(), value.clone())
}

/// One parsed predicate: `field operator :param`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: String,
    pub operand: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, operand: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            operand: operand.into(),
        }
    }

    pub fn eq(field: impl Into<String>, operand: impl Into<Value>) -> Self {
        Self::new(field, "=", operand)
    }

    /// Parse one filter entry.
    pub fn parse(field: impl Into<String>, value: &Value) -> Self {
        let (operator, operand) = parse(value);
        Self {
            field: field.into(),
            operator,
            operand,
        }
    }
}

/// Ordered field → value map used for lookups and update keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(Vec<(String, Value)>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an entry.
    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == field) {
            Some(slot) => slot.1 = value,
            None => self.0.push((field, value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Run every entry through the condition parser, keeping entry order.
    pub fn conditions(&self) -> Vec<Condition> {
        self.0
            .iter()
            .map(|(field, value)| Condition::parse(field.as_str(), value))
            .collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Filter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filter = Filter::new();
        for (k, v) in iter {
            filter.insert(k, v);
        }
        filter
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Filter {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl From<&crate::record::Record> for Filter {
    fn from(record: &crate::record::Record) -> Self {
        record.fields().map(|(k, v)| (k, v.clone())).collect()
    }
}
