//! # Schema Module
//!
//! JSON Schema model used inside generated documents, plus the tagging
//! primitive that marks a schema as a named, reusable type.
//!
//! Tagged schemas are inlined wherever routes use them. When the document is
//! assembled, every distinct tag is hoisted once into
//! `#/components/schemas/{Name}` and every other occurrence is replaced by a
//! `$ref` (see [`crate::transform`]).
//!
//! ```
//! use brrtdoc::schema::{schema_type, Schema};
//!
//! let owner = schema_type("Owner", Schema::object().required_property("id", Schema::integer()));
//! let pet = schema_type(
//!     "Pet",
//!     Schema::object()
//!         .required_property("name", Schema::string())
//!         .property("owner", owner.clone()),
//! );
//! assert!(pet.is_tagged());
//! ```

mod tag;
mod types;

pub use tag::{schema_type, SchemaTag, TagId};
pub use types::{AdditionalProperties, Schema, SchemaObject, SchemaType, SchemaTypeSet};
