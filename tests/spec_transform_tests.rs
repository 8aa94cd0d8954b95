//! Integration tests for schema canonicalisation
//!
//! # Test Coverage
//!
//! - Discovery of tagged schemas in every structural position
//! - Registry construction: repeats, diamonds, collisions, cycles
//! - `$ref` fixup completeness across parameters, bodies and responses
//! - Idempotence of the full pass
//! - Nested tagged responses (a tagged object holding another tagged object)
//! - The universal schema is a leaf for discovery and fixup alike

use brrtdoc::error::SchemaGraphError;
use brrtdoc::schema::{schema_type, AdditionalProperties, Schema, SchemaTag};
use brrtdoc::spec::{
    Info, MediaType, ObjectOrReference, OpenApiDocument, Operation, Parameter, ParameterLocation,
    PathItem, RequestBody, Response,
};
use brrtdoc::transform::{canonicalize_schemas, find_tagged_schemas};
use brrtdoc::validator::{DocumentValidator, StructuralValidator};
use brrtdoc::canonicalize_annotated_schemas;
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn base_doc() -> OpenApiDocument {
    OpenApiDocument::new(Info::new("test", "0.1.0"))
}

fn query_param(name: &str, schema: Schema) -> ObjectOrReference<Parameter> {
    let mut p = Parameter::new(name, ParameterLocation::Query);
    p.schema = Some(schema);
    ObjectOrReference::Object(p)
}

fn json_response(schema: Schema) -> ObjectOrReference<Response> {
    ObjectOrReference::Object(Response {
        description: "ok".into(),
        content: BTreeMap::from([("application/json".to_string(), MediaType::with_schema(schema))]),
        ..Response::default()
    })
}

fn json_body(schema: Schema) -> ObjectOrReference<RequestBody> {
    ObjectOrReference::Object(RequestBody {
        content: BTreeMap::from([("application/json".to_string(), MediaType::with_schema(schema))]),
        ..RequestBody::default()
    })
}

/// MyTypeA and MyTypeB are leaves; MyTypeC holds both.
fn abc() -> (Schema, Schema, Schema) {
    let a = schema_type("MyTypeA", Schema::object().property("foo", Schema::string()));
    let b = schema_type("MyTypeB", Schema::object().property("bar", Schema::integer()));
    let c = schema_type(
        "MyTypeC",
        Schema::object().property("a", a.clone()).property("b", b.clone()),
    );
    (a, b, c)
}

fn tag_names(found: &[&Schema]) -> Vec<String> {
    found
        .iter()
        .filter_map(|s| s.tag().map(|t| t.name().to_string()))
        .collect()
}

#[test]
fn test_finds_tagged_schema_in_components() {
    let (_, _, c) = abc();
    let mut doc = base_doc();
    doc.components.schemas.insert("MyTypeC".into(), c);

    let found = find_tagged_schemas(&doc);
    assert_eq!(tag_names(&found), vec!["MyTypeC", "MyTypeA", "MyTypeB"]);
}

#[test]
fn test_finds_tagged_schema_in_body_response_and_parameters() {
    let (a, b, _) = abc();
    let mut doc = base_doc();
    let mut item = PathItem::default();
    item.parameters.push(query_param("shared", b.clone()));
    item.post = Some(Operation {
        request_body: Some(json_body(a.clone())),
        responses: BTreeMap::from([("200".to_string(), json_response(Schema::array(b)))]),
        ..Operation::default()
    });
    doc.paths.insert("/".into(), item);

    let mut names = tag_names(&find_tagged_schemas(&doc));
    names.sort();
    assert_eq!(names, vec!["MyTypeA", "MyTypeB", "MyTypeB"]);
}

#[test]
fn test_finds_tagged_variants_of_one_of_and_any_of() {
    let (a, b, _) = abc();
    let mut doc = base_doc();
    doc.components.schemas.insert(
        "Choice".into(),
        schema_type("Choice", Schema::one_of(vec![a.clone(), Schema::any_of(vec![b, Schema::string()])])),
    );
    let names = tag_names(&find_tagged_schemas(&doc));
    assert_eq!(names, vec!["Choice", "MyTypeA", "MyTypeB"]);
}

#[test]
fn test_finds_tagged_schema_in_callbacks() {
    let (a, _, _) = abc();
    let mut callback_item = PathItem::default();
    callback_item.post = Some(Operation {
        request_body: Some(json_body(a)),
        ..Operation::default()
    });
    let callback = BTreeMap::from([("{$request.body#/url}".to_string(), callback_item)]);

    let mut doc = base_doc();
    let mut item = PathItem::default();
    item.post = Some(Operation {
        callbacks: BTreeMap::from([("onEvent".to_string(), ObjectOrReference::Object(callback))]),
        ..Operation::default()
    });
    doc.paths.insert("/subscribe".into(), item);

    assert_eq!(tag_names(&find_tagged_schemas(&doc)), vec!["MyTypeA"]);

    canonicalize_annotated_schemas(&mut doc).unwrap();
    let value = doc.to_value().unwrap();
    assert_eq!(
        value["paths"]["/subscribe"]["post"]["callbacks"]["onEvent"]["{$request.body#/url}"]["post"]
            ["requestBody"]["content"]["application/json"]["schema"],
        json!({ "$ref": "#/components/schemas/MyTypeA" })
    );
}

#[test]
fn test_canonicalizes_nested_schema() {
    let (_, _, c) = abc();
    let mut doc = base_doc();
    doc.components.schemas.insert("MyTypeC".into(), c);

    let registry = canonicalize_schemas(find_tagged_schemas(&doc)).unwrap();
    assert_eq!(registry.len(), 3);
}

#[test]
fn test_canonicalization_is_idempotent() {
    let (a, b, c) = abc();
    let mut doc = base_doc();
    doc.components.schemas.insert("MyTypeC".into(), c);
    let mut item = PathItem::default();
    item.get = Some(Operation {
        parameters: vec![query_param("a", a), query_param("b", b)],
        ..Operation::default()
    });
    doc.paths.insert("/".into(), item);

    let first = canonicalize_schemas(find_tagged_schemas(&doc)).unwrap();
    let second = canonicalize_schemas(find_tagged_schemas(&doc)).unwrap();
    assert_eq!(first.keys().collect::<Vec<_>>(), second.keys().collect::<Vec<_>>());
    for (name, schema) in &first {
        assert_eq!(schema.tag(), second[name].tag());
    }

    canonicalize_annotated_schemas(&mut doc).unwrap();
    let once = doc.to_value().unwrap();
    canonicalize_annotated_schemas(&mut doc).unwrap();
    assert_eq!(doc.to_value().unwrap(), once);
}

#[test]
fn test_collision_between_distinct_types_is_fatal() {
    let first = schema_type("Pet", Schema::object().property("name", Schema::string()));
    let second = schema_type("pet", Schema::object().property("species", Schema::string()));

    let mut doc = base_doc();
    let mut item = PathItem::default();
    item.get = Some(Operation {
        responses: BTreeMap::from([
            ("200".to_string(), json_response(first)),
            ("201".to_string(), json_response(second)),
        ]),
        ..Operation::default()
    });
    doc.paths.insert("/pets".into(), item);

    let err = canonicalize_annotated_schemas(&mut doc).unwrap_err();
    match err {
        SchemaGraphError::NameCollision { name, existing, current } => {
            assert_eq!(name, "Pet");
            assert!(existing.contains("name"));
            assert!(current.contains("species"));
        }
        other => panic!("expected collision, got {other:?}"),
    }
}

#[test]
fn test_self_reachable_type_is_a_cycle() {
    let node = SchemaTag::new("Node");
    let inner = node.apply(Schema::object().property("value", Schema::integer()));
    let outer = node.apply(Schema::object().property("next", Schema::array(inner)));

    let mut doc = base_doc();
    doc.components.schemas.insert("Node".into(), outer);

    let err = canonicalize_annotated_schemas(&mut doc).unwrap_err();
    assert!(matches!(err, SchemaGraphError::Cycle { ref name } if name == "Node"));
}

#[test]
fn test_every_occurrence_but_the_registry_entry_becomes_a_ref() {
    let (a, b, c) = abc();
    let mut doc = base_doc();
    doc.components.schemas.insert("MyTypeC".into(), c);

    let mut item = PathItem::default();
    item.parameters.push(query_param("bar", b.clone()));
    item.get = Some(Operation {
        parameters: vec![query_param("foo", a.clone())],
        responses: BTreeMap::from([("200".to_string(), json_response(a.clone()))]),
        ..Operation::default()
    });
    item.post = Some(Operation {
        request_body: Some(json_body(a)),
        responses: BTreeMap::from([(
            "default".to_string(),
            json_response(Schema::object().property("wrapped", b)),
        )]),
        ..Operation::default()
    });
    doc.paths.insert("/".into(), item);

    canonicalize_annotated_schemas(&mut doc).unwrap();
    let value = doc.to_value().unwrap();

    let schemas = value["components"]["schemas"].as_object().unwrap();
    assert_eq!(schemas.len(), 3);
    assert_eq!(schemas["MyTypeA"], json!({ "type": "object", "properties": { "foo": { "type": "string" } } }));
    assert_eq!(schemas["MyTypeC"]["properties"]["a"], json!({ "$ref": "#/components/schemas/MyTypeA" }));
    assert_eq!(schemas["MyTypeC"]["properties"]["b"], json!({ "$ref": "#/components/schemas/MyTypeB" }));

    let path = &value["paths"]["/"];
    assert_eq!(path["parameters"][0]["schema"], json!({ "$ref": "#/components/schemas/MyTypeB" }));
    assert_eq!(path["get"]["parameters"][0]["schema"], json!({ "$ref": "#/components/schemas/MyTypeA" }));
    assert_eq!(
        path["get"]["responses"]["200"]["content"]["application/json"]["schema"],
        json!({ "$ref": "#/components/schemas/MyTypeA" })
    );
    assert_eq!(
        path["post"]["requestBody"]["content"]["application/json"]["schema"],
        json!({ "$ref": "#/components/schemas/MyTypeA" })
    );
    assert_eq!(
        path["post"]["responses"]["default"]["content"]["application/json"]["schema"]["properties"]["wrapped"],
        json!({ "$ref": "#/components/schemas/MyTypeB" })
    );

    // MyTypeA: 4 occurrences, all refs; 1 inline copy in the registry.
    let refs = count_refs(&value, "#/components/schemas/MyTypeA");
    assert_eq!(refs, 4);
}

#[test]
fn test_nested_tagged_response_registers_both_types() {
    let inner = schema_type("TestResponseInner", Schema::object().property("foo", Schema::string()));
    let outer = schema_type("TestResponse", Schema::object().property("bar", inner));

    let mut doc = base_doc();
    let mut item = PathItem::default();
    item.get = Some(Operation {
        responses: BTreeMap::from([("200".to_string(), json_response(outer))]),
        ..Operation::default()
    });
    doc.paths.insert("/nested".into(), item);

    canonicalize_annotated_schemas(&mut doc).unwrap();
    let value = doc.to_value().unwrap();
    assert!(value["components"]["schemas"]["TestResponse"].is_object());
    assert!(value["components"]["schemas"]["TestResponseInner"].is_object());
    assert_eq!(
        value["components"]["schemas"]["TestResponse"]["properties"]["bar"],
        json!({ "$ref": "#/components/schemas/TestResponseInner" })
    );
    assert_eq!(
        value["paths"]["/nested"]["get"]["responses"]["200"]["content"]["application/json"]["schema"],
        json!({ "$ref": "#/components/schemas/TestResponse" })
    );
}

#[test]
fn test_string_enum_inside_tagged_object() {
    let model = schema_type(
        "AsdfChoiceModel",
        Schema::object().required_property("choice", Schema::string_enum(["a", "s", "d", "f"])),
    );
    let mut doc = base_doc();
    let mut item = PathItem::default();
    item.post = Some(Operation {
        request_body: Some(json_body(model)),
        ..Operation::default()
    });
    doc.paths.insert("/choice".into(), item);

    canonicalize_annotated_schemas(&mut doc).unwrap();
    let value = doc.to_value().unwrap();
    assert_eq!(
        value["components"]["schemas"]["AsdfChoiceModel"],
        json!({
            "type": "object",
            "properties": { "choice": { "type": "string", "enum": ["a", "s", "d", "f"] } },
            "required": ["choice"]
        })
    );
}

#[test]
fn test_universal_schema_children_stay_inline() {
    let hidden = schema_type("Hidden", Schema::string());
    let mut doc = base_doc();
    doc.components.schemas.insert(
        "Loose".into(),
        Schema::any().additional_properties(AdditionalProperties::Schema(Box::new(hidden))),
    );

    canonicalize_annotated_schemas(&mut doc).unwrap();

    assert!(!doc.components.schemas.contains_key("Hidden"));
    let value = doc.to_value().unwrap();
    assert_eq!(
        value["components"]["schemas"]["Loose"],
        json!({ "additionalProperties": { "type": "string" } })
    );
    assert_eq!(StructuralValidator::new().validate(&value), vec![]);
}

#[test]
fn test_tagged_universal_schema_does_not_hoist_children() {
    let inner = schema_type("Inner", Schema::integer());
    let outer = schema_type(
        "Outer",
        Schema::any().additional_properties(AdditionalProperties::Schema(Box::new(inner))),
    );
    let mut doc = base_doc();
    doc.paths.insert(
        "/loose".into(),
        PathItem {
            get: Some(Operation {
                responses: BTreeMap::from([("200".to_string(), json_response(outer))]),
                ..Operation::default()
            }),
            ..PathItem::default()
        },
    );

    canonicalize_annotated_schemas(&mut doc).unwrap();

    let names: Vec<&String> = doc.components.schemas.keys().collect();
    assert_eq!(names, vec!["Outer"]);
    let value = doc.to_value().unwrap();
    assert_eq!(count_refs(&value, "#/components/schemas/Inner"), 0);
    assert_eq!(StructuralValidator::new().validate(&value), vec![]);
}

fn count_refs(value: &Value, target: &str) -> usize {
    match value {
        Value::Object(map) => {
            let own = usize::from(map.get("$ref").and_then(Value::as_str) == Some(target));
            own + map.values().map(|v| count_refs(v, target)).sum::<usize>()
        }
        Value::Array(items) => items.iter().map(|v| count_refs(v, target)).sum(),
        _ => 0,
    }
}
