//! Read-only discovery of tagged schema fragments.

use crate::schema::Schema;
use crate::spec::{
    Callback, ObjectOrReference, OpenApiDocument, Operation, Parameter, PathItem, RequestBody,
    Response,
};

/// Every tagged fragment reachable from `doc`, in walk order.
///
/// Walk order: `components.schemas`, every path item, then component
/// callbacks, request bodies, responses and parameters. Within a schema the
/// node itself is reported before its descendants, and a tagged node is still
/// descended into. The same fragment may be reported more than once.
#[must_use]
pub fn find_tagged_schemas(doc: &OpenApiDocument) -> Vec<&Schema> {
    let mut out = Vec::new();

    for schema in doc.components.schemas.values() {
        collect_schema(schema, &mut out);
    }
    for item in doc.paths.values() {
        collect_path_item(item, &mut out);
    }
    for cb in doc.components.callbacks.values().filter_map(ObjectOrReference::as_object) {
        collect_callback(cb, &mut out);
    }
    for rb in doc.components.request_bodies.values().filter_map(ObjectOrReference::as_object) {
        collect_request_body(rb, &mut out);
    }
    for resp in doc.components.responses.values().filter_map(ObjectOrReference::as_object) {
        collect_response(resp, &mut out);
    }
    for param in doc.components.parameters.values().filter_map(ObjectOrReference::as_object) {
        collect_parameter(param, &mut out);
    }

    out
}

pub(crate) fn collect_schema<'a>(schema: &'a Schema, out: &mut Vec<&'a Schema>) {
    let Some(obj) = schema.as_object() else {
        return;
    };
    if obj.tag.is_some() {
        out.push(schema);
    }
    if obj.is_any() {
        return;
    }
    for child in obj.children() {
        collect_schema(child, out);
    }
}

fn collect_path_item<'a>(item: &'a PathItem, out: &mut Vec<&'a Schema>) {
    for (_, op) in item.operations() {
        collect_operation(op, out);
    }
    for param in item.parameters.iter().filter_map(ObjectOrReference::as_object) {
        collect_parameter(param, out);
    }
}

fn collect_operation<'a>(op: &'a Operation, out: &mut Vec<&'a Schema>) {
    for param in op.parameters.iter().filter_map(ObjectOrReference::as_object) {
        collect_parameter(param, out);
    }
    if let Some(rb) = op.request_body.as_ref().and_then(ObjectOrReference::as_object) {
        collect_request_body(rb, out);
    }
    for resp in op.responses.values().filter_map(ObjectOrReference::as_object) {
        collect_response(resp, out);
    }
    for cb in op.callbacks.values().filter_map(ObjectOrReference::as_object) {
        collect_callback(cb, out);
    }
}

fn collect_callback<'a>(cb: &'a Callback, out: &mut Vec<&'a Schema>) {
    for item in cb.values() {
        collect_path_item(item, out);
    }
}

fn collect_request_body<'a>(rb: &'a RequestBody, out: &mut Vec<&'a Schema>) {
    for media in rb.content.values() {
        if let Some(schema) = &media.schema {
            collect_schema(schema, out);
        }
    }
}

fn collect_response<'a>(resp: &'a Response, out: &mut Vec<&'a Schema>) {
    for media in resp.content.values() {
        if let Some(schema) = &media.schema {
            collect_schema(schema, out);
        }
    }
}

fn collect_parameter<'a>(param: &'a Parameter, out: &mut Vec<&'a Schema>) {
    if let Some(schema) = &param.schema {
        collect_schema(schema, out);
    }
}
