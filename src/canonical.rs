//! Deterministic `key=value&...` encoding of request and order fields.

use std::fmt;

use rust_decimal::Decimal;
use serde_json::Value;

/// A single field value as it participates in a canonical payload.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalValue {
    Null,
    Bool(bool),
    Int(i128),
    UInt(u128),
    Decimal(Decimal),
    Str(String),
    /// Nested JSON, emitted in compact form
    Json(Value),
}

impl fmt::Display for CanonicalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalValue::Null => Ok(()),
            CanonicalValue::Bool(b) => write!(f, "{b}"),
            CanonicalValue::Int(i) => write!(f, "{i}"),
            CanonicalValue::UInt(u) => write!(f, "{u}"),
            CanonicalValue::Decimal(d) => write!(f, "{d}"),
            CanonicalValue::Str(s) => f.write_str(s),
            CanonicalValue::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for CanonicalValue {
    fn from(value: &str) -> Self {
        CanonicalValue::Str(value.to_string())
    }
}

impl From<String> for CanonicalValue {
    fn from(value: String) -> Self {
        CanonicalValue::Str(value)
    }
}

impl From<bool> for CanonicalValue {
    fn from(value: bool) -> Self {
        CanonicalValue::Bool(value)
    }
}

impl From<i64> for CanonicalValue {
    fn from(value: i64) -> Self {
        CanonicalValue::Int(value.into())
    }
}

impl From<u64> for CanonicalValue {
    fn from(value: u64) -> Self {
        CanonicalValue::UInt(value.into())
    }
}

impl From<u32> for CanonicalValue {
    fn from(value: u32) -> Self {
        CanonicalValue::UInt(value.into())
    }
}

impl From<u128> for CanonicalValue {
    fn from(value: u128) -> Self {
        CanonicalValue::UInt(value)
    }
}

impl From<Decimal> for CanonicalValue {
    fn from(value: Decimal) -> Self {
        CanonicalValue::Decimal(value)
    }
}

impl<T: Into<CanonicalValue>> From<Option<T>> for CanonicalValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CanonicalValue::Null, Into::into)
    }
}

impl From<Value> for CanonicalValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => CanonicalValue::Null,
            Value::Bool(b) => CanonicalValue::Bool(b),
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    CanonicalValue::UInt(u.into())
                } else if let Some(i) = n.as_i64() {
                    CanonicalValue::Int(i.into())
                } else {
                    // Floats keep serde_json's shortest round-trip form
                    CanonicalValue::Str(n.to_string())
                }
            }
            Value::String(s) => CanonicalValue::Str(s),
            nested @ (Value::Array(_) | Value::Object(_)) => CanonicalValue::Json(nested),
        }
    }
}

/// Ordered collection of named fields. Insertion order is kept for inspection but has no
/// influence on the encoding. Re-inserting a key replaces its value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalFields {
    entries: Vec<(String, CanonicalValue)>,
}

impl CanonicalFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<CanonicalValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder-style variant of [`CanonicalFields::insert`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<CanonicalValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&CanonicalValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CanonicalValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Encode the fields; see [`CanonicalEncoder::encode`]
    pub fn encode(&self) -> String {
        CanonicalEncoder::encode(self)
    }
}

impl<K: Into<String>, V: Into<CanonicalValue>> FromIterator<(K, V)> for CanonicalFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = CanonicalFields::new();
        for (key, value) in iter {
            fields.insert(key, value);
        }
        fields
    }
}

impl From<serde_json::Map<String, Value>> for CanonicalFields {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        map.into_iter().collect()
    }
}

/// Turns a field set into the byte-exact string that gets hashed and signed.
pub struct CanonicalEncoder;

impl CanonicalEncoder {
    /// Sort keys lexicographically, drop nulls and join `key=value` pairs with `&`.
    pub fn encode(fields: &CanonicalFields) -> String {
        let mut pairs: Vec<(&str, &CanonicalValue)> = fields
            .iter()
            .filter(|(_, value)| !matches!(value, CanonicalValue::Null))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));

        pairs
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}
