//! Runtime value snapshots
//!
//! Every value observed by the instrumentation is captured as an immutable
//! [`Value`]. Anything that has no natural representation here is captured
//! as [`Value::Opaque`] with a best-effort display string.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// String-keyed map that keeps insertion order, so reports and snapshots
/// come out the same way on every run
pub type OrderedMap<V> = IndexMap<String, V>;

/// Bindings from names to values (call arguments, snapshots, mapping values)
pub type Mapping = OrderedMap<Value>;

/// A snapshot of one traced runtime value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
    Null,
    Sequence(Vec<Value>),
    Mapping(Mapping),
    /// Unordered collection of unique values
    #[serde(rename = "set")]
    SetOf(Vec<Value>),
    /// Anything else: a type tag plus its display string
    Opaque { type_tag: String, display: String },
}

/// The kind of a [`Value`], without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Integer,
    Float,
    Boolean,
    Text,
    Null,
    Sequence,
    Mapping,
    Set,
    Opaque,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Boolean => "boolean",
            ValueKind::Text => "text",
            ValueKind::Null => "null",
            ValueKind::Sequence => "sequence",
            ValueKind::Mapping => "mapping",
            ValueKind::Set => "set",
            ValueKind::Opaque => "opaque",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    /// Build an opaque value for something the model cannot represent
    pub fn opaque(type_tag: impl Into<String>, display: impl Into<String>) -> Self {
        Value::Opaque {
            type_tag: type_tag.into(),
            display: display.into(),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Text(_) => ValueKind::Text,
            Value::Null => ValueKind::Null,
            Value::Sequence(_) => ValueKind::Sequence,
            Value::Mapping(_) => ValueKind::Mapping,
            Value::SetOf(_) => ValueKind::Set,
            Value::Opaque { .. } => ValueKind::Opaque,
        }
    }

    /// Integer or float. Booleans are not numbers here.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value widened to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// `new - old` when both sides are integers
    pub fn int_delta(old: &Value, new: &Value) -> Option<i64> {
        match (old, new) {
            (Value::Integer(o), Value::Integer(n)) => n.checked_sub(*o),
            _ => None,
        }
    }

    /// Convert natural JSON into a value snapshot.
    ///
    /// Integers outside the i64 range become opaque.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if n.is_f64() {
                    n.as_f64().map_or(Value::Null, Value::Float)
                } else {
                    Value::opaque("int", n.to_string())
                }
            }
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(fields) => Value::Mapping(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Sequence(a), Value::Sequence(b)) => a == b,
            (Value::Mapping(a), Value::Mapping(b)) => a == b,
            // Membership both ways; duplicates in a decoded set do not count
            (Value::SetOf(a), Value::SetOf(b)) => {
                a.iter().all(|item| b.contains(item)) && b.iter().all(|item| a.contains(item))
            }
            // Opaque values only carry their display form
            (Value::Opaque { display: a, .. }, Value::Opaque { display: b, .. }) => a == b,
            _ => false,
        }
    }
}

fn write_joined<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = &'a Value>,
) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Null => f.write_str("null"),
            Value::Sequence(items) => {
                f.write_str("[")?;
                write_joined(f, items.iter())?;
                f.write_str("]")
            }
            Value::SetOf(items) => {
                f.write_str("{")?;
                write_joined(f, items.iter())?;
                f.write_str("}")
            }
            Value::Mapping(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{:?}: {}", key, value)?;
                }
                f.write_str("}")
            }
            Value::Opaque { display, .. } => f.write_str(display),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Sequence(items.into_iter().map(Into::into).collect())
    }
}

impl From<Mapping> for Value {
    fn from(map: Mapping) -> Self {
        Value::Mapping(map)
    }
}
