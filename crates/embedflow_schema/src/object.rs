//! Schema objects
//!
//! A schema is declared once, with all of its fields listed up front, and is
//! immutable afterwards. Fields are bound to the schema when it is built.

use crate::error::{Result, SchemaError};
use crate::field::{FieldKind, SchemaField};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identity of a schema object.
///
/// Two schemas declared with the same name are still different schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(Uuid);

impl SchemaId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SchemaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-owning reference from a field back to the schema that declares it.
///
/// Equality and hashing use the schema identity only.
#[derive(Debug, Clone)]
pub struct SchemaRef {
    id: SchemaId,
    name: Arc<str>,
}

impl SchemaRef {
    pub fn id(&self) -> SchemaId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for SchemaRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SchemaRef {}

impl std::hash::Hash for SchemaRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A declared record type with a fixed set of typed fields.
#[derive(Debug, Clone)]
pub struct SchemaObject {
    schema_ref: SchemaRef,
    fields: Vec<SchemaField>,
    id_field: Option<String>,
}

impl SchemaObject {
    /// Start declaring a schema
    pub fn builder(name: impl Into<String>) -> SchemaObjectBuilder {
        SchemaObjectBuilder {
            name: name.into(),
            fields: Vec::new(),
            id_field: None,
        }
    }

    pub fn id(&self) -> SchemaId {
        self.schema_ref.id
    }

    pub fn name(&self) -> &str {
        self.schema_ref.name()
    }

    /// Reference handed to every field of this schema
    pub fn schema_ref(&self) -> &SchemaRef {
        &self.schema_ref
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|field| field.name() == name)
    }

    /// The id field, for schemas declared with one
    pub fn id_field(&self) -> Option<&SchemaField> {
        self.id_field.as_deref().and_then(|name| self.field(name))
    }

    /// Whether `field` was declared by this schema
    pub fn owns(&self, field: &SchemaField) -> bool {
        field.schema() == &self.schema_ref
    }
}

impl PartialEq for SchemaObject {
    fn eq(&self, other: &Self) -> bool {
        self.schema_ref == other.schema_ref
    }
}

impl Eq for SchemaObject {}

impl fmt::Display for SchemaObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self
            .fields
            .iter()
            .map(|field| format!("(name={}, type={})", field.name(), field.value_type()))
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "SchemaObject(schema_name={}, schema_fields=[{}])",
            self.name(),
            fields
        )
    }
}

/// Builder collecting `(name, kind)` pairs for a schema declaration.
#[derive(Debug, Clone)]
pub struct SchemaObjectBuilder {
    name: String,
    fields: Vec<(String, FieldKind)>,
    id_field: Option<String>,
}

impl SchemaObjectBuilder {
    /// Declare a field
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push((name.into(), kind));
        self
    }

    /// Declare the id field. It is always a String field and comes first.
    pub fn id_field(mut self, name: impl Into<String>) -> Self {
        self.id_field = Some(name.into());
        self
    }

    pub fn build(self) -> Result<SchemaObject> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::EmptySchemaName);
        }

        let schema_ref = SchemaRef {
            id: SchemaId::new(),
            name: Arc::from(self.name.as_str()),
        };

        let declared = self
            .id_field
            .iter()
            .map(|name| (name.clone(), FieldKind::String))
            .chain(self.fields);

        let mut fields: Vec<SchemaField> = Vec::new();
        for (field_name, kind) in declared {
            if field_name.trim().is_empty() {
                return Err(SchemaError::EmptyFieldName(self.name));
            }
            if fields.iter().any(|f| f.name() == field_name) {
                return Err(SchemaError::DuplicateField {
                    schema: self.name,
                    field: field_name,
                });
            }
            fields.push(SchemaField::new(field_name, schema_ref.clone(), kind));
        }

        Ok(SchemaObject {
            schema_ref,
            fields,
            id_field: self.id_field,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph() -> SchemaObject {
        SchemaObject::builder("Paragraph")
            .id_field("id")
            .field("body", FieldKind::String)
            .field("like_count", FieldKind::Integer)
            .build()
            .unwrap()
    }

    #[test]
    fn test_fields_are_bound_to_schema() {
        let schema = paragraph();

        assert_eq!(schema.fields().len(), 3);
        let body = schema.field("body").unwrap();
        assert_eq!(body.kind(), FieldKind::String);
        assert_eq!(body.schema().name(), "Paragraph");
        assert!(schema.owns(body));
        assert!(schema.field("missing").is_none());
    }

    #[test]
    fn test_id_field_is_string_and_first() {
        let schema = paragraph();
        let id = schema.id_field().unwrap();
        assert_eq!(id.name(), "id");
        assert_eq!(id.kind(), FieldKind::String);
        assert_eq!(schema.fields()[0].name(), "id");
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = SchemaObject::builder("Paragraph")
            .field("body", FieldKind::String)
            .field("body", FieldKind::Blob)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateField {
                schema: "Paragraph".to_string(),
                field: "body".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_names_rejected() {
        assert_eq!(
            SchemaObject::builder(" ").build().unwrap_err(),
            SchemaError::EmptySchemaName
        );
        assert!(matches!(
            SchemaObject::builder("Paragraph")
                .field("", FieldKind::Float)
                .build(),
            Err(SchemaError::EmptyFieldName(_))
        ));
    }

    #[test]
    fn test_same_name_schemas_are_distinct() {
        let a = paragraph();
        let b = paragraph();
        assert_ne!(a, b);
        assert!(!a.owns(b.field("body").unwrap()));
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_display() {
        let schema = SchemaObject::builder("Product")
            .field("price", FieldKind::Float)
            .field("tags", FieldKind::StringList)
            .build()
            .unwrap();
        assert_eq!(
            schema.to_string(),
            "SchemaObject(schema_name=Product, schema_fields=[(name=price, type=float), (name=tags, type=list[str])])"
        );
    }
}
