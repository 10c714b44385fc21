//! Schema Field Model
//!
//! Schemas describe the shape of records that feed the embedding process.
//! A [`SchemaObject`] is declared once with a fixed list of typed fields;
//! each [`SchemaField`] keeps a non-owning reference back to its schema.
//!
//! ```text
//! SchemaObject "Paragraph"
//!   ├── body      : String     -> str
//!   ├── created_at: Timestamp  -> int
//!   ├── image     : Blob       -> BlobInformation
//!   └── tags      : StringList -> list[str]
//! ```
//!
//! # Modules
//!
//! - [`field`]: Field kinds, field values and the `String + Blob` pairing
//! - [`object`]: Schema objects and their builder
//! - [`error`]: Error type for schema operations

pub mod error;
pub mod field;
pub mod object;

pub use error::{Result, SchemaError};
pub use field::{BlobInformation, DescribedBlob, FieldKind, FieldValue, SchemaField, ValueType};
pub use object::{SchemaId, SchemaObject, SchemaObjectBuilder, SchemaRef};
