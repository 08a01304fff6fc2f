//! Normalized output trees
//!
//! A [`Value`] is what a validated parse returns: element objects become
//! maps, repeated children become lists, and typed leaves are decoded
//! native scalars. Reserved keys (attributes, character content,
//! namespace info) are configured on [`crate::parser::ParseOptions`].

use std::collections::BTreeMap;

use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::datetime::Timestamp;

/// A node in the normalized tree
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// String value (also the raw form every leaf starts as)
    String(String),
    /// Decoded boolean
    Bool(bool),
    /// Decoded integer
    Int(i64),
    /// Decoded double (also used for decimal and float)
    Double(f64),
    /// Decoded byte array (hexBinary / base64Binary)
    Bytes(Vec<u8>),
    /// Decoded UTC instant (date / dateTime)
    DateTime(Timestamp),
    /// Whitespace-separated token list (NMTOKENS, IDREFS, ENTITIES)
    Tokens(Vec<String>),
    /// Ordered sequence (repeated children)
    List(Vec<Value>),
    /// Element object: reserved keys plus child groups
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Create an empty map value
    pub fn empty_map() -> Self {
        Value::Map(BTreeMap::new())
    }

    /// Borrow as a string, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as a map, if this is a map
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Mutably borrow as a map, if this is a map
    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow as a list, if this is a list
    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Project into `serde_json::Value`.
    ///
    /// Byte arrays render as standard base64, instants as ISO-8601 UTC
    /// strings. Non-finite doubles render as their XSD lexical forms
    /// since JSON has no representation for them.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::from(*i),
            Value::Double(d) => serde_json::Number::from_f64(*d)
                .map(JsonValue::Number)
                .unwrap_or_else(|| {
                    let lexical = if d.is_nan() {
                        "NaN"
                    } else if *d > 0.0 {
                        "INF"
                    } else {
                        "-INF"
                    };
                    JsonValue::String(lexical.to_string())
                }),
            Value::Bytes(bytes) => {
                use base64::Engine;
                JsonValue::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            Value::DateTime(ts) => JsonValue::String(ts.to_string()),
            Value::Tokens(tokens) => JsonValue::Array(
                tokens.iter().map(|t| JsonValue::String(t.clone())).collect(),
            ),
            Value::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => {
                let mut out = JsonMap::new();
                for (key, value) in map {
                    out.insert(key.clone(), value.to_json());
                }
                JsonValue::Object(out)
            }
        }
    }
}
