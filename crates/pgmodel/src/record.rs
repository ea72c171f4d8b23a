//! In-memory representation of one table row.

use serde::de::DeserializeOwned;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{OrmError, OrmResult};
use crate::value::Value;

/// One row: persisted fields in column order plus runtime-only virtual fields.
///
/// Virtual fields are never written back to the table, but they survive sanitizing and are
/// visible through [`Record::get`] like any other field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
    virtual_fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a field, virtual fields included.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .chain(self.virtual_fields.iter())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set a persisted field, keeping its position when it already exists.
    ///
    /// Writing to the name of a virtual field updates the virtual value instead.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.virtual_fields.iter_mut().find(|(k, _)| *k == name) {
            slot.1 = value;
            return;
        }
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        if let Some(pos) = self.fields.iter().position(|(k, _)| k == name) {
            return Some(self.fields.remove(pos).1);
        }
        let pos = self.virtual_fields.iter().position(|(k, _)| k == name)?;
        Some(self.virtual_fields.remove(pos).1)
    }

    /// Register a virtual field. Returns `false` when the name is empty, the value is null or the
    /// name is already taken by a persisted or virtual field; the existing value is left alone in
    /// that case.
    pub fn virtual_field(&mut self, name: impl Into<String>, value: impl Into<Value>) -> bool {
        let name = name.into();
        let value = value.into();
        if name.is_empty() || value.is_null() || self.contains(&name) {
            return false;
        }
        self.virtual_fields.push((name, value));
        true
    }

    pub fn is_virtual(&self, name: &str) -> bool {
        self.virtual_fields.iter().any(|(k, _)| k == name)
    }

    pub fn virtual_field_names(&self) -> impl Iterator<Item = &str> {
        self.virtual_fields.iter().map(|(k, _)| k.as_str())
    }

    /// Persisted fields, in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// All fields, persisted first, then virtual.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .chain(self.virtual_fields.iter())
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len() + self.virtual_fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep only the entries for which `keep` returns true.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&str, &Value) -> bool) {
        self.fields.retain(|(k, v)| keep(k, v));
        self.virtual_fields.retain(|(k, v)| keep(k, v));
    }

    /// Null out every persisted and virtual value in place.
    pub(crate) fn null_all(&mut self) {
        for (_, v) in self.fields.iter_mut().chain(self.virtual_fields.iter_mut()) {
            *v = Value::Null;
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.iter()
                .map(|(k, v)| (k.to_string(), v.to_json()))
                .collect(),
        )
    }

    /// Deserialize the record into a typed struct via its JSON view.
    pub fn decode<T: DeserializeOwned>(&self) -> OrmResult<T> {
        serde_json::from_value(self.to_json())
            .map_err(|e| OrmError::decode("<record>", e.to_string()))
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.set(k, v);
        }
        record
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Record {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<Value>> From<Vec<(K, V)>> for Record {
    fn from(entries: Vec<(K, V)>) -> Self {
        entries.into_iter().collect()
    }
}
