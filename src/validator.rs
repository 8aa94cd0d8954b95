//! Structural checks for the assembled document.
//!
//! [`DocumentValidator`] is the seam the plugin calls once the document is
//! assembled. The default [`StructuralValidator`] checks a compact OpenAPI 3.1
//! meta-schema with `jsonschema` and then walks the document graph for
//! dangling schema references and undeclared path parameters.

use jsonschema::Validator;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{error, warn};

use crate::spec::PATH_ITEM_METHODS;

const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";
const PARAMETER_REF_PREFIX: &str = "#/components/parameters/";

/// One problem found in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub location: String,
    pub kind: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(location: impl Into<String>, kind: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            location: location.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.message)
    }
}

/// Log every issue at `warn`.
pub fn print_issues(issues: &[ValidationIssue]) {
    warn!(issue_count = issues.len(), "OpenAPI document validation failed.");
    for issue in issues {
        warn!(
            kind = %issue.kind,
            location = %issue.location,
            "{}",
            issue.message
        );
    }
}

/// Checks a serialized document. An empty result means the document passed.
pub trait DocumentValidator: Send + Sync {
    fn validate(&self, document: &Value) -> Vec<ValidationIssue>;
}

impl<F> DocumentValidator for F
where
    F: Fn(&Value) -> Vec<ValidationIssue> + Send + Sync,
{
    fn validate(&self, document: &Value) -> Vec<ValidationIssue> {
        self(document)
    }
}

static META_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["openapi", "info"],
        "properties": {
            "openapi": { "type": "string", "pattern": "^3\\.1\\.\\d+(-.+)?$" },
            "info": {
                "type": "object",
                "required": ["title", "version"],
                "properties": {
                    "title": { "type": "string" },
                    "version": { "type": "string" }
                }
            },
            "servers": { "type": "array", "items": { "$ref": "#/$defs/server" } },
            "paths": {
                "type": "object",
                "propertyNames": { "pattern": "^(/|x-)" },
                "patternProperties": { "^/": { "$ref": "#/$defs/pathItem" } }
            },
            "components": {
                "type": "object",
                "properties": {
                    "schemas": { "type": "object" },
                    "responses": { "type": "object", "additionalProperties": { "$ref": "#/$defs/responseOrRef" } },
                    "parameters": { "type": "object", "additionalProperties": { "$ref": "#/$defs/parameterOrRef" } },
                    "requestBodies": { "type": "object", "additionalProperties": { "$ref": "#/$defs/requestBodyOrRef" } },
                    "callbacks": { "type": "object" },
                    "securitySchemes": { "type": "object", "additionalProperties": { "$ref": "#/$defs/securityScheme" } }
                }
            },
            "security": { "$ref": "#/$defs/securityList" },
            "tags": {
                "type": "array",
                "items": { "type": "object", "required": ["name"] }
            }
        },
        "$defs": {
            "server": {
                "type": "object",
                "required": ["url"],
                "properties": { "url": { "type": "string" } }
            },
            "pathItem": {
                "type": "object",
                "properties": {
                    "get": { "$ref": "#/$defs/operation" },
                    "put": { "$ref": "#/$defs/operation" },
                    "post": { "$ref": "#/$defs/operation" },
                    "delete": { "$ref": "#/$defs/operation" },
                    "options": { "$ref": "#/$defs/operation" },
                    "head": { "$ref": "#/$defs/operation" },
                    "patch": { "$ref": "#/$defs/operation" },
                    "trace": { "$ref": "#/$defs/operation" },
                    "parameters": { "type": "array", "items": { "$ref": "#/$defs/parameterOrRef" } }
                }
            },
            "operation": {
                "type": "object",
                "properties": {
                    "operationId": { "type": "string" },
                    "tags": { "type": "array", "items": { "type": "string" } },
                    "deprecated": { "type": "boolean" },
                    "parameters": { "type": "array", "items": { "$ref": "#/$defs/parameterOrRef" } },
                    "requestBody": { "$ref": "#/$defs/requestBodyOrRef" },
                    "responses": {
                        "type": "object",
                        "propertyNames": { "pattern": "^(default|[1-5](XX|[0-9]{2})|x-.*)$" },
                        "additionalProperties": { "$ref": "#/$defs/responseOrRef" }
                    },
                    "callbacks": { "type": "object" },
                    "security": { "$ref": "#/$defs/securityList" }
                }
            },
            "parameterOrRef": {
                "if": { "type": "object", "required": ["$ref"] },
                "then": { "properties": { "$ref": { "type": "string" } } },
                "else": { "$ref": "#/$defs/parameter" }
            },
            "parameter": {
                "type": "object",
                "required": ["name", "in"],
                "properties": {
                    "name": { "type": "string" },
                    "in": { "enum": ["query", "header", "path", "cookie"] },
                    "required": { "type": "boolean" }
                },
                "if": { "properties": { "in": { "const": "path" } } },
                "then": {
                    "required": ["required"],
                    "properties": { "required": { "const": true } }
                }
            },
            "requestBodyOrRef": {
                "if": { "type": "object", "required": ["$ref"] },
                "then": { "properties": { "$ref": { "type": "string" } } },
                "else": {
                    "type": "object",
                    "required": ["content"],
                    "properties": { "content": { "type": "object" } }
                }
            },
            "responseOrRef": {
                "if": { "type": "object", "required": ["$ref"] },
                "then": { "properties": { "$ref": { "type": "string" } } },
                "else": {
                    "type": "object",
                    "required": ["description"],
                    "properties": {
                        "description": { "type": "string" },
                        "content": { "type": "object" }
                    }
                }
            },
            "securityList": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": { "type": "array", "items": { "type": "string" } }
                }
            },
            "securityScheme": {
                "type": "object",
                "required": ["type"],
                "properties": {
                    "type": { "enum": ["apiKey", "http", "mutualTLS", "oauth2", "openIdConnect"] }
                },
                "allOf": [
                    {
                        "if": { "properties": { "type": { "const": "apiKey" } } },
                        "then": {
                            "required": ["name", "in"],
                            "properties": { "in": { "enum": ["query", "header", "cookie"] } }
                        }
                    },
                    {
                        "if": { "properties": { "type": { "const": "http" } } },
                        "then": { "required": ["scheme"] }
                    }
                ]
            }
        }
    })
});

/// Meta-schema check plus reference and path-parameter checks.
pub struct StructuralValidator {
    meta: Option<Validator>,
}

impl StructuralValidator {
    #[must_use]
    pub fn new() -> Self {
        let meta = match jsonschema::validator_for(&META_SCHEMA) {
            Ok(v) => Some(v),
            Err(err) => {
                error!(error = %err, "Failed to compile OpenAPI meta-schema; structural checks disabled.");
                None
            }
        };
        Self { meta }
    }

    fn check_structure(&self, document: &Value, issues: &mut Vec<ValidationIssue>) {
        let Some(meta) = &self.meta else {
            return;
        };
        for err in meta.iter_errors(document) {
            issues.push(ValidationIssue::new("$", "Schema", err.to_string()));
        }
    }
}

impl Default for StructuralValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StructuralValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuralValidator")
            .field("meta_schema", &self.meta.is_some())
            .finish()
    }
}

impl DocumentValidator for StructuralValidator {
    fn validate(&self, document: &Value) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        self.check_structure(document, &mut issues);
        check_schema_refs(document, &mut issues);
        check_path_parameters(document, &mut issues);
        issues
    }
}

fn check_schema_refs(document: &Value, issues: &mut Vec<ValidationIssue>) {
    let registered: BTreeSet<&str> = document
        .pointer("/components/schemas")
        .and_then(Value::as_object)
        .map(|m| m.keys().map(String::as_str).collect())
        .unwrap_or_default();

    let mut stack: Vec<(String, &Value)> = vec![("#".to_string(), document)];
    while let Some((location, node)) = stack.pop() {
        match node {
            Value::Object(map) => {
                if let Some(Value::String(target)) = map.get("$ref") {
                    if let Some(name) = target.strip_prefix(SCHEMA_REF_PREFIX) {
                        if !registered.contains(name) {
                            issues.push(ValidationIssue::new(
                                location.clone(),
                                "UnresolvedRef",
                                format!("reference '{target}' does not resolve"),
                            ));
                        }
                    }
                }
                for (key, child) in map {
                    stack.push((format!("{location}/{}", escape_pointer(key)), child));
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    stack.push((format!("{location}/{i}"), child));
                }
            }
            _ => {}
        }
    }
}

fn check_path_parameters(document: &Value, issues: &mut Vec<ValidationIssue>) {
    let Some(paths) = document.get("paths").and_then(Value::as_object) else {
        return;
    };

    for (template, item) in paths {
        if !template.starts_with('/') {
            continue;
        }
        let templated = template_params(template);
        if templated.is_empty() {
            continue;
        }
        let shared = declared_path_params(document, item.get("parameters"));

        for method in PATH_ITEM_METHODS {
            let Some(operation) = item.get(method) else {
                continue;
            };
            let own = declared_path_params(document, operation.get("parameters"));
            for name in &templated {
                if !own.contains(name.as_str()) && !shared.contains(name.as_str()) {
                    issues.push(ValidationIssue::new(
                        format!("{template} {method}"),
                        "UndeclaredPathParameter",
                        format!("path parameter '{name}' is not declared"),
                    ));
                }
            }
        }
    }
}

fn template_params(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            break;
        };
        names.push(after[..end].to_string());
        rest = &after[end + 1..];
    }
    names
}

fn declared_path_params<'a>(document: &'a Value, parameters: Option<&'a Value>) -> BTreeSet<&'a str> {
    let Some(list) = parameters.and_then(Value::as_array) else {
        return BTreeSet::new();
    };
    list.iter()
        .filter_map(|p| match p.get("$ref").and_then(Value::as_str) {
            Some(target) => target
                .strip_prefix(PARAMETER_REF_PREFIX)
                .and_then(|name| document.pointer(&format!("/components/parameters/{}", escape_pointer(name)))),
            None => Some(p),
        })
        .filter(|p| p.get("in").and_then(Value::as_str) == Some("path"))
        .filter_map(|p| p.get("name").and_then(Value::as_str))
        .collect()
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}
