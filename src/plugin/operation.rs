//! Operation assembly from a [`RouteDescriptor`].

use http::Method;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::naming::camel_case;
use crate::route::RouteDescriptor;
use crate::schema::{Schema, SchemaObject};
use crate::spec::{
    MediaType, ObjectOrReference, Operation, Parameter, ParameterLocation, RequestBody, Response,
    TranslatedPath,
};

pub const APPLICATION_JSON: &str = "application/json";

const NO_OPERATION_DESCRIPTION: &str = "No operation description specified.";
const NO_BODY_DESCRIPTION: &str = "No request body description specified.";
const NO_RESPONSE_DESCRIPTION: &str = "No response description specified.";
const NO_QUERY_DESCRIPTION: &str = "No querystring parameter description specified.";
const NO_PATH_DESCRIPTION: &str = "No path parameter description specified.";

static RESPONSE_CODE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[1-5][0-9]{2}").expect("valid response code regex")
});

/// Derives an operation id for routes that do not set one.
pub type OperationIdFn = Arc<dyn Fn(&RouteDescriptor, &Method) -> String + Send + Sync>;

/// camelCase of the URL's words followed by the method: `/pets/:id` GET is
/// `petsIdGet`.
#[must_use]
pub fn default_operation_id(route: &RouteDescriptor, method: &Method) -> String {
    camel_case(&format!("{} {}", route.url, method.as_str()))
}

/// Build the operation documenting `route` under `method`.
///
/// `path` is the translated template; placeholders with no declared path
/// parameter get a synthesised `string` parameter carrying the template's
/// regex constraint as `pattern`.
pub fn build_operation(
    route: &RouteDescriptor,
    method: &Method,
    path: &TranslatedPath,
    operation_id_fn: &OperationIdFn,
) -> Operation {
    let oas = route.oas.clone().unwrap_or_default();

    let mut operation = Operation {
        operation_id: Some(
            oas.operation_id
                .clone()
                .unwrap_or_else(|| operation_id_fn(route, method)),
        ),
        summary: Some(oas.summary.clone().unwrap_or_else(|| route.url.clone())),
        description: Some(
            oas.description
                .clone()
                .unwrap_or_else(|| NO_OPERATION_DESCRIPTION.to_string()),
        ),
        deprecated: oas.deprecated,
        tags: oas.tags.clone(),
        external_docs: oas.external_docs.clone(),
        callbacks: oas.callbacks.clone(),
        security: oas.security.as_ref().map(|d| d.clauses()),
        ..Operation::default()
    };

    for (key, value) in &oas.vendor_prefixed_fields {
        if key.starts_with("x-") {
            operation.extensions.insert(key.clone(), value.clone());
        } else {
            warn!(field = %key, "Vendor field is not prefixed with 'x-'; ignoring.");
        }
    }

    add_request_body(route, &mut operation);
    add_query_parameters(route, &mut operation);
    add_path_parameters(route, &mut operation);
    synthesize_path_parameters(path, &mut operation);
    add_responses(route, &mut operation);

    operation
}

fn add_request_body(route: &RouteDescriptor, operation: &mut Operation) {
    let extras = route.oas.as_ref().and_then(|o| o.body.clone());
    if route.schema.body.is_none() && extras.is_none() {
        return;
    }
    debug!("Adding request body to operation.");

    let extras = extras.unwrap_or_default();
    let Some(schema) = extras.schema_override.or_else(|| route.schema.body.clone()) else {
        warn!("Route has a request body that is not a schema. Skipping.");
        return;
    };

    let content_type = extras.content_type.unwrap_or_else(|| APPLICATION_JSON.to_string());
    operation.request_body = Some(ObjectOrReference::Object(RequestBody {
        description: Some(
            extras
                .description
                .unwrap_or_else(|| NO_BODY_DESCRIPTION.to_string()),
        ),
        content: BTreeMap::from([(content_type, MediaType::with_schema(schema))]),
        ..RequestBody::default()
    }));
}

/// Properties of an inline object schema, or `None` (with a warning) for
/// anything else.
fn object_properties<'a>(schema: &'a Schema, what: &str) -> Option<&'a SchemaObject> {
    match schema.as_object() {
        Some(obj) if obj.is_object_type() || !obj.properties.is_empty() => {
            if obj.additional_properties.is_some() {
                warn!("Route's {what} has additionalProperties. This will be ignored.");
            }
            Some(obj)
        }
        _ => {
            warn!("Route has a {what} that is not an object schema. Skipping.");
            None
        }
    }
}

fn warn_unmatched<V>(what: &str, extras: &BTreeMap<String, V>, properties: &BTreeMap<String, Schema>) {
    let unmatched: Vec<&str> = extras
        .keys()
        .filter(|k| !properties.contains_key(*k))
        .map(String::as_str)
        .collect();
    if !unmatched.is_empty() {
        warn!(
            unmatched_extras = ?unmatched,
            "Route's {what} has extra properties. These will be ignored: {}",
            unmatched.join(", ")
        );
    }
}

fn schema_description(schema: &Schema) -> Option<String> {
    schema.as_object().and_then(|o| o.description.clone())
}

fn schema_example(schema: &Schema) -> Option<Value> {
    schema.as_object().and_then(|o| o.keywords.get("example").cloned())
}

fn add_query_parameters(route: &RouteDescriptor, operation: &mut Operation) {
    let Some(querystring) = &route.schema.querystring else {
        return;
    };
    debug!("Adding query string to operation.");
    let Some(obj) = object_properties(querystring, "querystring") else {
        return;
    };

    let extras = route
        .oas
        .as_ref()
        .map(|o| o.querystring.clone())
        .unwrap_or_default();
    warn_unmatched("querystring", &extras, &obj.properties);

    for (name, property) in &obj.properties {
        let extra = extras.get(name).cloned().unwrap_or_default();
        let mut param = Parameter::new(name.clone(), ParameterLocation::Query);
        param.description = Some(
            extra
                .description
                .or_else(|| schema_description(property))
                .unwrap_or_else(|| NO_QUERY_DESCRIPTION.to_string()),
        );
        param.example = extra.example.or_else(|| schema_example(property));
        param.required = obj.required.contains(name);
        param.deprecated = extra.deprecated;
        param.style = extra.style;
        param.allow_empty_value = extra.allow_empty_value;
        param.allow_reserved = extra.allow_reserved;
        param.explode = extra.explode;
        param.schema = Some(extra.schema_override.unwrap_or_else(|| property.clone()));
        operation.parameters.push(ObjectOrReference::Object(param));
    }
}

fn add_path_parameters(route: &RouteDescriptor, operation: &mut Operation) {
    let Some(params) = &route.schema.params else {
        return;
    };
    debug!("Adding params to operation.");
    let Some(obj) = object_properties(params, "params") else {
        return;
    };

    let extras = route.oas.as_ref().map(|o| o.params.clone()).unwrap_or_default();
    warn_unmatched("params", &extras, &obj.properties);

    for (name, property) in &obj.properties {
        let extra = extras.get(name).cloned().unwrap_or_default();
        if !obj.required.contains(name) {
            warn!(param = %name, "Route's param is marked as not required. This will be ignored.");
        }
        let mut param = Parameter::new(name.clone(), ParameterLocation::Path);
        param.description = Some(
            extra
                .description
                .or_else(|| schema_description(property))
                .unwrap_or_else(|| NO_PATH_DESCRIPTION.to_string()),
        );
        param.example = extra.example.or_else(|| schema_example(property));
        param.schema = Some(extra.schema_override.unwrap_or_else(|| property.clone()));
        operation.parameters.push(ObjectOrReference::Object(param));
    }
}

fn synthesize_path_parameters(path: &TranslatedPath, operation: &mut Operation) {
    let declared: BTreeSet<String> = operation
        .parameters
        .iter()
        .filter_map(ObjectOrReference::as_object)
        .filter(|p| p.location == ParameterLocation::Path)
        .map(|p| p.name.clone())
        .collect();

    for name in &path.params {
        if declared.contains(name) {
            continue;
        }
        debug!(param = %name, "Synthesising undeclared path parameter.");
        let mut schema = Schema::string();
        if let Some(pattern) = path.param_patterns.get(name) {
            schema = schema.keyword("pattern", Value::String(pattern.clone()));
        }
        let mut param = Parameter::new(name.clone(), ParameterLocation::Path);
        param.description = Some(NO_PATH_DESCRIPTION.to_string());
        param.schema = Some(schema);
        operation.parameters.push(ObjectOrReference::Object(param));
    }
}

fn add_responses(route: &RouteDescriptor, operation: &mut Operation) {
    let extras = route
        .oas
        .as_ref()
        .map(|o| o.responses.clone())
        .unwrap_or_default();

    for (code, schema) in &route.schema.response {
        if code != "default" && !RESPONSE_CODE.is_match(code) {
            warn!(
                response_code = %code,
                "Route has a response schema of code '{code}', which is not supported."
            );
            continue;
        }
        let extra = extras.get(code).cloned().unwrap_or_default();
        let content_type = extra.content_type.unwrap_or_else(|| APPLICATION_JSON.to_string());
        let schema = extra.schema_override.unwrap_or_else(|| schema.clone());
        operation.responses.insert(
            code.clone(),
            ObjectOrReference::Object(Response {
                description: extra
                    .description
                    .unwrap_or_else(|| NO_RESPONSE_DESCRIPTION.to_string()),
                content: BTreeMap::from([(content_type, MediaType::with_schema(schema))]),
                ..Response::default()
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{BodyExtras, PathParamExtras, QueryParamExtras, ResponseExtras, RouteOasOptions};
    use crate::security::SecurityDeclaration;
    use crate::spec::{translate_path, SecurityRequirement};
    use serde_json::json;

    fn id_fn() -> OperationIdFn {
        Arc::new(default_operation_id)
    }

    fn build(route: &RouteDescriptor) -> Operation {
        let method = route.methods[0].clone();
        build_operation(route, &method, &translate_path(&route.url), &id_fn())
    }

    fn params_json(op: &Operation) -> Value {
        serde_json::to_value(&op.parameters).unwrap()
    }

    #[test]
    fn test_defaults() {
        let route = RouteDescriptor::new(Method::GET, "/pets/:petId");
        let op = build(&route);
        assert_eq!(op.operation_id.as_deref(), Some("petsPetIdGet"));
        assert_eq!(op.summary.as_deref(), Some("/pets/:petId"));
        assert_eq!(op.description.as_deref(), Some(NO_OPERATION_DESCRIPTION));
        assert!(op.security.is_none());
        assert!(op.request_body.is_none());
        assert!(op.responses.is_empty());
    }

    #[test]
    fn test_query_parameters_take_extras_then_schema() {
        let route = RouteDescriptor::new(Method::GET, "/pets")
            .querystring(
                Schema::object()
                    .required_property("limit", Schema::integer().description("page size"))
                    .property("q", Schema::string().keyword("example", json!("rex"))),
            )
            .oas(
                RouteOasOptions::new()
                    .query_param(
                        "q",
                        QueryParamExtras {
                            description: Some("search".into()),
                            allow_empty_value: Some(true),
                            ..QueryParamExtras::default()
                        },
                    )
                    .query_param("missing", QueryParamExtras::default()),
            );
        let op = build(&route);
        assert_eq!(
            params_json(&op),
            json!([
                {
                    "name": "limit", "in": "query", "description": "page size", "required": true,
                    "schema": { "type": "integer", "description": "page size" }
                },
                {
                    "name": "q", "in": "query", "description": "search", "allowEmptyValue": true,
                    "example": "rex",
                    "schema": { "type": "string", "example": "rex" }
                }
            ])
        );
    }

    #[test]
    fn test_path_parameters_and_synthesis() {
        let route = RouteDescriptor::new(Method::GET, r"/owners/:owner/pets/:id(\d+)")
            .params(Schema::object().property("owner", Schema::string()))
            .oas(RouteOasOptions::new().path_param(
                "owner",
                PathParamExtras {
                    description: Some("owner name".into()),
                    ..PathParamExtras::default()
                },
            ));
        let op = build(&route);
        assert_eq!(
            params_json(&op),
            json!([
                {
                    "name": "owner", "in": "path", "description": "owner name", "required": true,
                    "schema": { "type": "string" }
                },
                {
                    "name": "id", "in": "path", "description": NO_PATH_DESCRIPTION, "required": true,
                    "schema": { "type": "string", "pattern": "\\d+" }
                }
            ])
        );
    }

    #[test]
    fn test_non_object_querystring_is_skipped() {
        let route = RouteDescriptor::new(Method::GET, "/pets").querystring(Schema::string());
        assert!(build(&route).parameters.is_empty());
    }

    #[test]
    fn test_body_and_responses() {
        let route = RouteDescriptor::new(Method::POST, "/pets")
            .body(Schema::object())
            .response("201", Schema::object())
            .response("default", Schema::string())
            .response("2XX", Schema::string())
            .oas(
                RouteOasOptions::new()
                    .body_extras(BodyExtras {
                        content_type: Some("application/vnd.pet+json".into()),
                        ..BodyExtras::default()
                    })
                    .response_extras(
                        "201",
                        ResponseExtras {
                            description: Some("created".into()),
                            schema_override: Some(Schema::boolean()),
                            ..ResponseExtras::default()
                        },
                    ),
            );
        let op = build(&route);
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(
            value["requestBody"],
            json!({
                "description": NO_BODY_DESCRIPTION,
                "content": { "application/vnd.pet+json": { "schema": { "type": "object" } } }
            })
        );
        assert_eq!(
            value["responses"],
            json!({
                "201": { "description": "created", "content": { "application/json": { "schema": { "type": "boolean" } } } },
                "default": { "description": NO_RESPONSE_DESCRIPTION, "content": { "application/json": { "schema": { "type": "string" } } } }
            })
        );
    }

    #[test]
    fn test_security_mirrors_declaration_and_vendor_fields() {
        let route = RouteDescriptor::new(Method::DELETE, "/pets/:id").oas(
            RouteOasOptions::new()
                .security(SecurityRequirement::new().scheme("ApiKey"))
                .vendor_field("x-internal", json!(true))
                .vendor_field("internal", json!(true)),
        );
        let op = build(&route);
        assert_eq!(op.security, Some(vec![SecurityRequirement::new().scheme("ApiKey")]));
        assert_eq!(op.extensions.get("x-internal"), Some(&json!(true)));
        assert!(!op.extensions.contains_key("internal"));

        let open = RouteDescriptor::new(Method::GET, "/")
            .oas(RouteOasOptions::new().security(SecurityDeclaration::AnyOf(Vec::new())));
        assert_eq!(build(&open).security, Some(Vec::new()));
    }
}
