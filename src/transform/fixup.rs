//! Second pass: replace inline tagged fragments with registry pointers.

use crate::schema::{Schema, SchemaObject};
use crate::spec::{
    Callback, ObjectOrReference, OpenApiDocument, Operation, Parameter, PathItem, RequestBody,
    Response,
};

/// Rewrite every non-root occurrence of a tagged fragment in `doc` as a
/// `$ref` to `#/components/schemas/{Name}`.
///
/// Entries of `components.schemas` are fixed internally but stay inline:
/// they are the canonical destinations.
pub fn fixup_document(doc: &mut OpenApiDocument) {
    for root in doc.components.schemas.values_mut() {
        if let Some(obj) = root.as_object_mut() {
            fixup_children(obj);
        }
    }
    for item in doc.paths.values_mut() {
        fixup_path_item(item);
    }
    for cb in doc.components.callbacks.values_mut().filter_map(ObjectOrReference::as_object_mut) {
        fixup_callback(cb);
    }
    for rb in doc
        .components
        .request_bodies
        .values_mut()
        .filter_map(ObjectOrReference::as_object_mut)
    {
        fixup_request_body(rb);
    }
    for resp in doc.components.responses.values_mut().filter_map(ObjectOrReference::as_object_mut) {
        fixup_response(resp);
    }
    for param in doc.components.parameters.values_mut().filter_map(ObjectOrReference::as_object_mut) {
        fixup_parameter(param);
    }
}

/// Fix children first, then replace `slot` itself if it is tagged.
pub(crate) fn fixup_schema(slot: &mut Schema) {
    let replacement = match slot.as_object_mut() {
        Some(obj) => {
            fixup_children(obj);
            obj.tag.as_ref().map(|tag| Schema::reference(tag.ref_path()))
        }
        None => None,
    };
    if let Some(reference) = replacement {
        *slot = reference;
    }
}

/// The universal schema is a leaf, as in the walker.
fn fixup_children(obj: &mut SchemaObject) {
    if obj.is_any() {
        return;
    }
    for child in obj.children_mut() {
        fixup_schema(child);
    }
}

fn fixup_path_item(item: &mut PathItem) {
    for param in item.parameters.iter_mut().filter_map(ObjectOrReference::as_object_mut) {
        fixup_parameter(param);
    }
    for op in item.operations_mut() {
        fixup_operation(op);
    }
}

fn fixup_operation(op: &mut Operation) {
    for param in op.parameters.iter_mut().filter_map(ObjectOrReference::as_object_mut) {
        fixup_parameter(param);
    }
    if let Some(rb) = op.request_body.as_mut().and_then(ObjectOrReference::as_object_mut) {
        fixup_request_body(rb);
    }
    for resp in op.responses.values_mut().filter_map(ObjectOrReference::as_object_mut) {
        fixup_response(resp);
    }
    for cb in op.callbacks.values_mut().filter_map(ObjectOrReference::as_object_mut) {
        fixup_callback(cb);
    }
}

fn fixup_callback(cb: &mut Callback) {
    for item in cb.values_mut() {
        fixup_path_item(item);
    }
}

fn fixup_request_body(rb: &mut RequestBody) {
    for schema in rb.content.values_mut().filter_map(|m| m.schema.as_mut()) {
        fixup_schema(schema);
    }
}

fn fixup_response(resp: &mut Response) {
    for schema in resp.content.values_mut().filter_map(|m| m.schema.as_mut()) {
        fixup_schema(schema);
    }
}

fn fixup_parameter(param: &mut Parameter) {
    if let Some(schema) = param.schema.as_mut() {
        fixup_schema(schema);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::schema_type;
    use serde_json::json;

    #[test]
    fn nested_tags_become_references_bottom_up() {
        let tag_leaf = schema_type("Leaf", Schema::string());
        let mut s = Schema::object()
            .property("leaf", tag_leaf.clone())
            .property("many", Schema::array(tag_leaf))
            .property("choice", Schema::one_of(vec![schema_type("Alt", Schema::integer())]));

        fixup_schema(&mut s);
        assert_eq!(
            serde_json::to_value(&s).unwrap(),
            json!({
                "type": "object",
                "properties": {
                    "choice": { "oneOf": [{ "$ref": "#/components/schemas/Alt" }] },
                    "leaf": { "$ref": "#/components/schemas/Leaf" },
                    "many": { "type": "array", "items": { "$ref": "#/components/schemas/Leaf" } }
                }
            })
        );
    }

    #[test]
    fn tagged_slot_is_replaced_itself() {
        let mut s = schema_type("Pet", Schema::object().property("owner", schema_type("Owner", Schema::object())));
        fixup_schema(&mut s);
        assert_eq!(s.ref_path(), Some("#/components/schemas/Pet"));
    }
}
