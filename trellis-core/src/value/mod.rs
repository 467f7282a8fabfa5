//! Plain Values
//!
//! `Value` is what flows in and out of a reactive tree: the input to
//! construction and writes, the exposed result of reads, and the payload of
//! change records.
//!
//! # Shapes
//!
//! Every value falls into one of a closed set of shapes (`Kind`):
//!
//! - `Primitive`: null, booleans, numbers and strings. Stored directly in a
//!   node, never tracked below.
//! - `Object`: insertion-ordered string-keyed maps.
//! - `Sequence`: positional lists.
//!
//! Two variants sit outside the plain tree. `Value::Node` is a live handle to
//! an existing reactive node (the exposed form of a complex node), and
//! `Value::Custom` is an opaque payload that a `Classifier` converter must
//! turn into one of the shapes above before it can be stored.

mod classify;

pub use classify::{Classifier, Custom};

use std::fmt;

use indexmap::IndexMap;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Error as _, Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::reactive::Reactive;

/// Largest integer an `f64` represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// The shape of a value or node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// A scalar stored directly, with no children.
    Primitive,
    /// A string-keyed map of children.
    Object,
    /// An ordered, index-keyed list of children.
    Sequence,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Primitive => "primitive",
            Kind::Object => "object",
            Kind::Sequence => "sequence",
        })
    }
}

/// A plain or live value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    /// A live node. Storing it shares the node instead of copying it.
    Node(Reactive),
    /// An application type that needs a registered converter.
    Custom(Custom),
}

impl Value {
    /// Build an object value from key/value pairs, keeping their order.
    pub fn object<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Build a sequence value.
    pub fn array<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }

    /// The shape of this value, or `None` for an unconverted custom value.
    ///
    /// A live node reports the shape it currently holds.
    pub fn kind(&self) -> Option<Kind> {
        match self {
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                Some(Kind::Primitive)
            }
            Value::Array(_) => Some(Kind::Sequence),
            Value::Object(_) => Some(Kind::Object),
            Value::Node(node) => Some(node.kind()),
            Value::Custom(_) => None,
        }
    }

    /// True for plain scalars. Live nodes are never primitive values, even
    /// when they hold a scalar.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The live node behind this value, if it is one.
    pub fn as_node(&self) -> Option<&Reactive> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Convert to a `serde_json::Value`, materializing live nodes.
    pub fn to_json(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

/// Primitives compare by value, live nodes and custom payloads by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a.ptr_eq(b),
            (Value::Custom(a), Value::Custom(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

// ----------------------------------------------------------------------------
// Conversions
// ----------------------------------------------------------------------------

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

number_from!(f64, f32, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::array(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

impl From<Reactive> for Value {
    fn from(node: Reactive) -> Self {
        Value::Node(node)
    }
}

impl From<&Reactive> for Value {
    fn from(node: &Reactive) -> Self {
        Value::Node(node.clone())
    }
}

impl From<Custom> for Value {
    fn from(custom: Custom) -> Self {
        Value::Custom(custom)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::array(items),
            serde_json::Value::Object(map) => Value::object(map),
        }
    }
}

// ----------------------------------------------------------------------------
// Serde
// ----------------------------------------------------------------------------

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => serialize_number(*n, serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Value::Node(node) => node.snapshot().serialize(serializer),
            Value::Custom(custom) => Err(S::Error::custom(format!(
                "unconverted custom value `{}`",
                custom.type_name()
            ))),
        }
    }
}

/// Integral numbers go out as integers so JSON input round-trips unchanged.
fn serialize_number<S: Serializer>(n: f64, serializer: S) -> Result<S::Ok, S::Error> {
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        if n >= 0.0 {
            serializer.serialize_u64(n as u64)
        } else {
            serializer.serialize_i64(n as i64)
        }
    } else {
        serializer.serialize_f64(n)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}
