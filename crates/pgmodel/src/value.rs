//! Dynamically typed column values.
//!
//! A [`Value`] is what a [`Record`](crate::Record) stores per field. Values are bound to statements
//! by the type the server infers for each placeholder, so a `Value::Text("42")` compared against an
//! `int4` column is sent as an `int4`, and a `Value::Int(7)` compared against a `text` column is
//! sent as `"7"`.

use std::error::Error;
use std::fmt;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Serialize, Serializer};
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type};
use uuid::Uuid;

type BoxError = Box<dyn Error + Sync + Send>;

/// A nullable scalar column value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Exact `numeric`.
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Uuid(Uuid),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view. Text holding an integer literal is parsed.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::Decimal(d) if d.fract().is_zero() => d.to_i64(),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Decimal(d) => d.to_f64(),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int(0) => Some(false),
            Value::Int(1) => Some(true),
            Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "t" | "true" | "1" | "y" | "yes" => Some(true),
                "f" | "false" | "0" | "n" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Textual rendering used when binding to text-like parameters.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Text(s) => s.clone(),
            Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Value::TimestampTz(ts) => ts.to_rfc3339(),
            Value::Uuid(u) => u.to_string(),
            Value::Json(j) => j.to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Null => J::Null,
            Value::Bool(v) => J::Bool(*v),
            Value::Int(v) => J::from(*v),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(J::Number)
                .unwrap_or(J::Null),
            Value::Json(j) => j.clone(),
            other => J::String(other.to_text()),
        }
    }

    fn coerce_i64(&self) -> Result<i64, BoxError> {
        if let Value::Bool(b) = self {
            return Ok(i64::from(*b));
        }
        self.as_i64()
            .ok_or_else(|| format!("cannot bind {self:?} as an integer").into())
    }

    fn coerce_f64(&self) -> Result<f64, BoxError> {
        self.as_f64()
            .ok_or_else(|| format!("cannot bind {self:?} as a float").into())
    }

    fn coerce_decimal(&self) -> Result<Decimal, BoxError> {
        match self {
            Value::Decimal(d) => Ok(*d),
            Value::Int(v) => Ok(Decimal::from(*v)),
            Value::Float(v) => Ok(Decimal::try_from(*v)?),
            Value::Text(s) => Ok(s.trim().parse()?),
            other => Err(format!("cannot bind {other:?} as a numeric").into()),
        }
    }

    fn coerce_bool(&self) -> Result<bool, BoxError> {
        self.as_bool()
            .ok_or_else(|| format!("cannot bind {self:?} as a boolean").into())
    }

    fn coerce_date(&self) -> Result<NaiveDate, BoxError> {
        match self {
            Value::Date(d) => Ok(*d),
            Value::Timestamp(ts) => Ok(ts.date()),
            Value::TimestampTz(ts) => Ok(ts.date_naive()),
            Value::Text(s) => Ok(NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")?),
            other => Err(format!("cannot bind {other:?} as a date").into()),
        }
    }

    fn coerce_timestamp(&self) -> Result<NaiveDateTime, BoxError> {
        match self {
            Value::Timestamp(ts) => Ok(*ts),
            Value::TimestampTz(ts) => Ok(ts.naive_utc()),
            Value::Date(d) => d
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| "invalid midnight".into()),
            Value::Text(s) => parse_naive_timestamp(s.trim()),
            other => Err(format!("cannot bind {other:?} as a timestamp").into()),
        }
    }

    fn coerce_timestamptz(&self) -> Result<DateTime<Utc>, BoxError> {
        match self {
            Value::TimestampTz(ts) => Ok(*ts),
            Value::Text(s) => match DateTime::parse_from_rfc3339(s.trim()) {
                Ok(ts) => Ok(ts.with_timezone(&Utc)),
                Err(_) => Ok(parse_naive_timestamp(s.trim())?.and_utc()),
            },
            other => Ok(other.coerce_timestamp()?.and_utc()),
        }
    }

    fn coerce_uuid(&self) -> Result<Uuid, BoxError> {
        match self {
            Value::Uuid(u) => Ok(*u),
            Value::Text(s) => Ok(Uuid::parse_str(s.trim())?),
            other => Err(format!("cannot bind {other:?} as a uuid").into()),
        }
    }
}

fn parse_naive_timestamp(s: &str) -> Result<NaiveDateTime, BoxError> {
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")?;
    date.and_hms_opt(0, 0, 0)
        .ok_or_else(|| format!("invalid timestamp: {s}").into())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            other => f.write_str(&other.to_text()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        if self.is_null() {
            return Ok(IsNull::Yes);
        }
        match *ty {
            Type::BOOL => self.coerce_bool()?.to_sql(ty, out),
            Type::INT2 => i16::try_from(self.coerce_i64()?)?.to_sql(ty, out),
            Type::INT4 => i32::try_from(self.coerce_i64()?)?.to_sql(ty, out),
            Type::INT8 => self.coerce_i64()?.to_sql(ty, out),
            Type::OID => u32::try_from(self.coerce_i64()?)?.to_sql(ty, out),
            Type::FLOAT4 => (self.coerce_f64()? as f32).to_sql(ty, out),
            Type::FLOAT8 => self.coerce_f64()?.to_sql(ty, out),
            Type::NUMERIC => self.coerce_decimal()?.to_sql(ty, out),
            Type::BYTEA => match self {
                Value::Bytes(b) => b.as_slice().to_sql(ty, out),
                other => other.to_text().as_bytes().to_sql(ty, out),
            },
            Type::DATE => self.coerce_date()?.to_sql(ty, out),
            Type::TIMESTAMP => self.coerce_timestamp()?.to_sql(ty, out),
            Type::TIMESTAMPTZ => self.coerce_timestamptz()?.to_sql(ty, out),
            Type::UUID => self.coerce_uuid()?.to_sql(ty, out),
            Type::JSON | Type::JSONB => self.to_json().to_sql(ty, out),
            _ => self.to_text().as_str().to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

impl<'a> FromSql<'a> for Value {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(match *ty {
            Type::BOOL => Value::Bool(bool::from_sql(ty, raw)?),
            Type::INT2 => Value::Int(i16::from_sql(ty, raw)?.into()),
            Type::INT4 => Value::Int(i32::from_sql(ty, raw)?.into()),
            Type::INT8 => Value::Int(i64::from_sql(ty, raw)?),
            Type::OID => Value::Int(u32::from_sql(ty, raw)?.into()),
            Type::FLOAT4 => Value::Float(f32::from_sql(ty, raw)?.into()),
            Type::FLOAT8 => Value::Float(f64::from_sql(ty, raw)?),
            Type::NUMERIC => Value::Decimal(Decimal::from_sql(ty, raw)?),
            Type::BYTEA => Value::Bytes(<&[u8]>::from_sql(ty, raw)?.to_vec()),
            Type::DATE => Value::Date(NaiveDate::from_sql(ty, raw)?),
            Type::TIMESTAMP => Value::Timestamp(NaiveDateTime::from_sql(ty, raw)?),
            Type::TIMESTAMPTZ => Value::TimestampTz(DateTime::<Utc>::from_sql(ty, raw)?),
            Type::UUID => Value::Uuid(Uuid::from_sql(ty, raw)?),
            Type::JSON | Type::JSONB => Value::Json(serde_json::Value::from_sql(ty, raw)?),
            _ => Value::Text(<&str>::from_sql(ty, raw)?.to_string()),
        })
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, BoxError> {
        Ok(Value::Null)
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::BOOL
                | Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::OID
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::NUMERIC
                | Type::BYTEA
                | Type::DATE
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::UUID
                | Type::JSON
                | Type::JSONB
        ) || <&str as FromSql>::accepts(ty)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(i64::from(v))
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::TimestampTz(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
