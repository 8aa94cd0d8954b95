//! Builds the `name -> fragment` registry from discovered tagged fragments.

use std::collections::{BTreeMap, HashSet};

use crate::error::SchemaGraphError;
use crate::schema::{Schema, TagId};

/// Resolve `fragments` into one registry entry per display name.
///
/// Each fragment, and every tagged fragment nested below it, is processed with
/// a seen-set of identities on the active path: meeting an identity already on
/// the path is a cycle. Identities leave the set once their subtree is done, so
/// a type shared by several parents (a diamond) is fine. Two different
/// identities under one name are a collision.
pub fn canonicalize_schemas<'a, I>(fragments: I) -> Result<BTreeMap<String, Schema>, SchemaGraphError>
where
    I: IntoIterator<Item = &'a Schema>,
{
    let mut completed = BTreeMap::new();
    let mut seen = HashSet::new();

    for fragment in fragments {
        canonicalize_schema(fragment, &mut completed, &mut seen)?;
    }

    Ok(completed)
}

fn canonicalize_schema(
    current: &Schema,
    completed: &mut BTreeMap<String, Schema>,
    seen: &mut HashSet<TagId>,
) -> Result<(), SchemaGraphError> {
    let Some(tag) = current.tag() else {
        return Ok(());
    };
    if tag.name().is_empty() {
        return Err(SchemaGraphError::EmptyName);
    }
    if !seen.insert(tag.id()) {
        return Err(SchemaGraphError::Cycle {
            name: tag.name().to_string(),
        });
    }

    match completed.get(tag.name()) {
        Some(existing) if existing.tag() != Some(tag) => {
            return Err(SchemaGraphError::NameCollision {
                name: tag.name().to_string(),
                existing: dump(existing),
                current: dump(current),
            });
        }
        Some(_) => {}
        None => {
            completed.insert(tag.name().to_string(), current.clone());
        }
    }

    let mut nested = Vec::new();
    if let Some(obj) = current.as_object().filter(|obj| !obj.is_any()) {
        for child in obj.children() {
            nearest_tagged(child, &mut nested);
        }
    }
    for child in nested {
        canonicalize_schema(child, completed, seen)?;
    }

    seen.remove(&tag.id());
    Ok(())
}

/// Tagged descendants that are not themselves below another tagged node.
fn nearest_tagged<'a>(schema: &'a Schema, out: &mut Vec<&'a Schema>) {
    let Some(obj) = schema.as_object() else {
        return;
    };
    if obj.tag.is_some() {
        out.push(schema);
        return;
    }
    if obj.is_any() {
        return;
    }
    for child in obj.children() {
        nearest_tagged(child, out);
    }
}

fn dump(schema: &Schema) -> String {
    let body = serde_json::to_string(schema).unwrap_or_else(|e| format!("<unserializable: {e}>"));
    match schema.tag() {
        Some(tag) => format!("{tag:?} {body}"),
        None => body,
    }
}
