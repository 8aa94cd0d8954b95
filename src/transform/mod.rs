//! # Transform Module
//!
//! Schema canonicalisation for an assembled document.
//!
//! Three steps, run by [`canonicalize_annotated_schemas`]:
//!
//! 1. **Walk** ([`find_tagged_schemas`]): collect every tagged fragment
//!    reachable from the document, through component registries, path items,
//!    operations, parameters, bodies, responses and (recursively) callbacks.
//! 2. **Canonicalize** ([`canonicalize_schemas`]): build one registry entry per
//!    identity, failing on name collisions and on fragments reachable from
//!    themselves.
//! 3. **Fixup** ([`fixup_document`]): replace every other occurrence with a
//!    `$ref` into `#/components/schemas`.
//!
//! The pass is idempotent: registry entries keep their tag, so running it
//! again over its own output finds the same identities and changes nothing.

mod canonicalize;
mod fixup;
mod walk;

pub use canonicalize::canonicalize_schemas;
pub use fixup::fixup_document;
pub use walk::find_tagged_schemas;

use std::collections::BTreeMap;
use tracing::debug;

use crate::error::SchemaGraphError;
use crate::schema::Schema;
use crate::spec::OpenApiDocument;

/// Hoist every tagged fragment of `doc` into `components.schemas` and point
/// all other occurrences at it.
pub fn canonicalize_annotated_schemas(doc: &mut OpenApiDocument) -> Result<(), SchemaGraphError> {
    let registry = {
        let found = find_tagged_schemas(doc);
        debug!(occurrences = found.len(), "Found tagged schema occurrences.");
        canonicalize_schemas(found)?
    };
    debug!(types = registry.len(), "Canonicalized tagged schemas.");

    merge_registry(&mut doc.components.schemas, registry)?;
    fixup_document(doc);
    Ok(())
}

fn merge_registry(
    schemas: &mut BTreeMap<String, Schema>,
    registry: BTreeMap<String, Schema>,
) -> Result<(), SchemaGraphError> {
    for (name, schema) in registry {
        if let Some(existing) = schemas.get(&name) {
            if existing.tag() != schema.tag() {
                return Err(SchemaGraphError::ComponentConflict { name });
            }
            continue;
        }
        schemas.insert(name, schema);
    }
    Ok(())
}
