//! Schema fields
//!
//! Every field has a name, a non-owning reference to its schema and a
//! [`FieldKind`]. The kind fixes the [`ValueType`] the field accepts.
//! Fields compare equal when their names and owning schemas match; the kind
//! does not take part in the comparison.

use crate::error::{Result, SchemaError};
use crate::object::SchemaRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Add;

/// Kind of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Text, e.g. the input of a text embedding space
    String,
    /// Unix timestamp, e.g. the input of a recency space
    Timestamp,
    /// Local/remote file path or encoded bytes, e.g. the input of an image space
    Blob,
    Float,
    Integer,
    /// A vector
    FloatList,
    StringList,
}

impl FieldKind {
    pub const ALL: [FieldKind; 7] = [
        FieldKind::String,
        FieldKind::Timestamp,
        FieldKind::Blob,
        FieldKind::Float,
        FieldKind::Integer,
        FieldKind::FloatList,
        FieldKind::StringList,
    ];

    /// The value type a field of this kind holds
    pub fn value_type(&self) -> ValueType {
        match self {
            FieldKind::String => ValueType::Str,
            FieldKind::Timestamp => ValueType::Int,
            FieldKind::Blob => ValueType::BlobInformation,
            FieldKind::Float => ValueType::Float,
            FieldKind::Integer => ValueType::Int,
            FieldKind::FloatList => ValueType::FloatList,
            FieldKind::StringList => ValueType::StringList,
        }
    }

    /// Float and Integer fields, accepted wherever a number is expected
    pub fn is_number(&self) -> bool {
        matches!(self, FieldKind::Float | FieldKind::Integer)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, FieldKind::FloatList | FieldKind::StringList)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "String",
            FieldKind::Timestamp => "Timestamp",
            FieldKind::Blob => "Blob",
            FieldKind::Float => "Float",
            FieldKind::Integer => "Integer",
            FieldKind::FloatList => "FloatList",
            FieldKind::StringList => "StringList",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value type carried by a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Str,
    Int,
    Float,
    BlobInformation,
    FloatList,
    StringList,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Str => "str",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::BlobInformation => "BlobInformation",
            ValueType::FloatList => "list[float]",
            ValueType::StringList => "list[str]",
        };
        f.write_str(name)
    }
}

/// Reference to binary content: a path, encoded bytes, or both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobInformation {
    #[serde(default)]
    pub path: Option<String>,
    /// Base64 encoded content
    #[serde(default)]
    pub encoded_blob: Option<String>,
}

impl BlobInformation {
    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            encoded_blob: None,
        }
    }

    pub fn from_encoded(encoded_blob: impl Into<String>) -> Self {
        Self {
            path: None,
            encoded_blob: Some(encoded_blob.into()),
        }
    }
}

/// A raw value offered to a field.
///
/// Deserializes untagged: integers become `Int`, other numbers `Float`, and
/// an empty JSON array becomes `FloatList`. Lists are tried before `Blob`
/// because a struct also accepts a sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Float(f64),
    FloatList(Vec<f64>),
    StringList(Vec<String>),
    Blob(BlobInformation),
}

impl FieldValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            FieldValue::Str(_) => ValueType::Str,
            FieldValue::Int(_) => ValueType::Int,
            FieldValue::Float(_) => ValueType::Float,
            FieldValue::FloatList(_) => ValueType::FloatList,
            FieldValue::StringList(_) => ValueType::StringList,
            FieldValue::Blob(_) => ValueType::BlobInformation,
        }
    }
}

/// A named, typed attribute of a schema object.
#[derive(Debug, Clone)]
pub struct SchemaField {
    name: String,
    schema: SchemaRef,
    kind: FieldKind,
}

impl SchemaField {
    pub(crate) fn new(name: String, schema: SchemaRef, kind: FieldKind) -> Self {
        Self { name, schema, kind }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The schema this field belongs to
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn value_type(&self) -> ValueType {
        self.kind.value_type()
    }

    /// Normalize an incoming value to the declared type.
    ///
    /// List fields wrap a bare item into a singleton list. Integers are
    /// accepted where floats are declared, and an empty list fits either
    /// list kind. Everything else must already match the declared value type.
    pub fn parse(&self, value: FieldValue) -> Result<FieldValue> {
        match (self.kind, value) {
            (FieldKind::Float, FieldValue::Int(item)) => Ok(FieldValue::Float(item as f64)),
            (FieldKind::FloatList, FieldValue::Float(item)) => Ok(FieldValue::FloatList(vec![item])),
            (FieldKind::FloatList, FieldValue::Int(item)) => {
                Ok(FieldValue::FloatList(vec![item as f64]))
            }
            (FieldKind::StringList, FieldValue::Str(item)) => Ok(FieldValue::StringList(vec![item])),
            (FieldKind::StringList, FieldValue::FloatList(items)) if items.is_empty() => {
                Ok(FieldValue::StringList(Vec::new()))
            }
            (_, value) if value.value_type() == self.value_type() => Ok(value),
            (_, value) => Err(SchemaError::TypeMismatch {
                field: self.name.clone(),
                expected: self.value_type(),
                got: value.value_type(),
            }),
        }
    }

    /// Pair a String field with a Blob field, in either order.
    pub fn describe(&self, other: &SchemaField) -> Result<DescribedBlob> {
        match (self.kind, other.kind) {
            (FieldKind::String, FieldKind::Blob) => Ok(DescribedBlob {
                blob: other.clone(),
                description: self.clone(),
            }),
            (FieldKind::Blob, FieldKind::String) => Ok(DescribedBlob {
                blob: self.clone(),
                description: other.clone(),
            }),
            (left, right) => Err(SchemaError::InvalidOperand { left, right }),
        }
    }
}

impl PartialEq for SchemaField {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.schema == other.schema
    }
}

impl Eq for SchemaField {}

impl Hash for SchemaField {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.schema.hash(state);
    }
}

impl fmt::Display for SchemaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(name={}, type={}, schema_object_name={})",
            self.kind,
            self.name,
            self.value_type(),
            self.schema.name()
        )
    }
}

impl<'a> Add<&'a SchemaField> for &'a SchemaField {
    type Output = Result<DescribedBlob>;

    fn add(self, other: &'a SchemaField) -> Self::Output {
        self.describe(other)
    }
}

/// A Blob field paired with the String field that describes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescribedBlob {
    blob: SchemaField,
    description: SchemaField,
}

impl DescribedBlob {
    pub fn blob(&self) -> &SchemaField {
        &self.blob
    }

    pub fn description(&self) -> &SchemaField {
        &self.description
    }
}
