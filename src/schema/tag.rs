//! Identity tags attached to schema fragments.
//!
//! A [`SchemaTag`] pairs a process-unique [`TagId`] with a PascalCased display
//! name. Identity is decided by the id alone: two tags created from the same
//! name are still different types, and cloning a tag keeps its identity.

use crate::naming::pascal_case;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::Schema;

static NEXT_TAG_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity token. Only obtainable from [`SchemaTag::new`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId(u64);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct TagInner {
    id: TagId,
    name: String,
}

/// Uniqueness marker for a logical schema type.
#[derive(Clone)]
pub struct SchemaTag {
    inner: Arc<TagInner>,
}

impl SchemaTag {
    /// Allocate a fresh identity for `name`. The name is PascalCased.
    pub fn new(name: impl AsRef<str>) -> Self {
        let id = TagId(NEXT_TAG_ID.fetch_add(1, Ordering::Relaxed));
        Self {
            inner: Arc::new(TagInner {
                id,
                name: pascal_case(name.as_ref()),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> TagId {
        self.inner.id
    }

    /// Registry key under `#/components/schemas/`.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// JSON pointer to this type's registry entry.
    #[must_use]
    pub fn ref_path(&self) -> String {
        format!("#/components/schemas/{}", self.inner.name)
    }

    /// Attach this tag to `schema`.
    ///
    /// References cannot carry a tag and are returned unchanged.
    #[must_use]
    pub fn apply(&self, schema: Schema) -> Schema {
        match schema {
            Schema::Object(mut obj) => {
                obj.tag = Some(self.clone());
                Schema::Object(obj)
            }
            other => other,
        }
    }
}

impl PartialEq for SchemaTag {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for SchemaTag {}

impl Hash for SchemaTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for SchemaTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchemaTag({}{})", self.inner.name, self.inner.id)
    }
}

/// Tag `schema` with a brand new identity named `name`.
///
/// Tagging two different schemas with the same name makes document assembly
/// fail with a name collision.
///
/// ```
/// use brrtdoc::schema::{schema_type, Schema};
///
/// let pet = schema_type("pet", Schema::object().property("name", Schema::string()));
/// assert_eq!(pet.tag().map(|t| t.name()), Some("Pet"));
/// ```
#[must_use]
pub fn schema_type(name: impl AsRef<str>, schema: Schema) -> Schema {
    SchemaTag::new(name).apply(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_with_equal_names_have_distinct_identity() {
        let a = SchemaTag::new("Pet");
        let b = SchemaTag::new("pet");
        assert_eq!(a.name(), b.name());
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn clones_keep_identity() {
        let a = SchemaTag::new("Pet");
        let c = a.clone();
        assert_eq!(a, c);
        assert_eq!(a.ref_path(), "#/components/schemas/Pet");
    }

    #[test]
    fn apply_skips_references() {
        let tag = SchemaTag::new("Pet");
        let r = tag.apply(Schema::reference("#/components/schemas/Other"));
        assert!(r.tag().is_none());
    }
}
