//! Nested configuration document model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Mapping node of a configuration document.
pub type Mapping = BTreeMap<String, Document>;

/// A configuration document: a scalar, a sequence or a mapping.
///
/// Documents are produced by the project loader (or deserialized from JSON)
/// and mutated in place by the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Document {
    Scalar(Scalar),
    Sequence(Vec<Document>),
    Mapping(Mapping),
}

/// Leaf value of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Document {
    /// Create a string document.
    pub fn string(value: impl Into<String>) -> Self {
        Document::Scalar(Scalar::String(value.into()))
    }

    /// Borrow the string value if this is a string leaf.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Document::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Take the string value if this is a string leaf.
    pub fn into_string(self) -> Result<String, Self> {
        match self {
            Document::Scalar(Scalar::String(s)) => Ok(s),
            other => Err(other),
        }
    }

    /// Look up a key when this document is a mapping.
    pub fn get(&self, key: &str) -> Option<&Document> {
        match self {
            Document::Mapping(map) => map.get(key),
            _ => None,
        }
    }

    /// Short name of the node shape, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Document::Scalar(Scalar::Null) => "null",
            Document::Scalar(Scalar::Bool(_)) => "bool",
            Document::Scalar(Scalar::Int(_)) => "integer",
            Document::Scalar(Scalar::Float(_)) => "float",
            Document::Scalar(Scalar::String(_)) => "string",
            Document::Sequence(_) => "sequence",
            Document::Mapping(_) => "mapping",
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

/// Default string rendering: strings verbatim, scalars in their natural
/// form, mappings and sequences as compact JSON.
impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Document::Scalar(scalar) => write!(f, "{scalar}"),
            nested => {
                let json = serde_json::to_string(nested).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<&str> for Document {
    fn from(value: &str) -> Self {
        Document::string(value)
    }
}

impl From<String> for Document {
    fn from(value: String) -> Self {
        Document::string(value)
    }
}

impl From<bool> for Document {
    fn from(value: bool) -> Self {
        Document::Scalar(Scalar::Bool(value))
    }
}

impl From<i64> for Document {
    fn from(value: i64) -> Self {
        Document::Scalar(Scalar::Int(value))
    }
}

impl From<f64> for Document {
    fn from(value: f64) -> Self {
        Document::Scalar(Scalar::Float(value))
    }
}

impl From<Mapping> for Document {
    fn from(value: Mapping) -> Self {
        Document::Mapping(value)
    }
}

impl From<Vec<Document>> for Document {
    fn from(value: Vec<Document>) -> Self {
        Document::Sequence(value)
    }
}

impl From<serde_json::Value> for Document {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Document::Scalar(Scalar::Null),
            Value::Bool(b) => b.into(),
            Value::Number(n) => match n.as_i64() {
                Some(i) => i.into(),
                None => n.as_f64().map(Document::from).unwrap_or(Document::Scalar(Scalar::Null)),
            },
            Value::String(s) => s.into(),
            Value::Array(items) => Document::Sequence(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => Document::Mapping(
                map.into_iter()
                    .map(|(key, value)| (key, value.into()))
                    .collect(),
            ),
        }
    }
}
