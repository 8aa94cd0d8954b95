//! Route descriptors: what the host framework knows about a route, plus the
//! optional OpenAPI options attached to it.
//!
//! ```
//! use brrtdoc::route::{RouteDescriptor, RouteOasOptions};
//! use brrtdoc::schema::Schema;
//! use http::Method;
//!
//! let route = RouteDescriptor::new(Method::GET, "/pets/:id")
//!     .params(Schema::object().required_property("id", Schema::string()))
//!     .response("200", Schema::object())
//!     .oas(RouteOasOptions::new().summary("Fetch a pet").tag("pets"));
//! assert_eq!(route.method_label(), "GET");
//! ```

use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::schema::Schema;
use crate::security::SecurityDeclaration;
use crate::spec::{Callback, Extensions, ExternalDocumentation, ObjectOrReference, ParameterStyle};

/// The validation schemas a route was registered with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteSchema {
    pub body: Option<Schema>,
    /// Object schema whose properties are the path parameters.
    pub params: Option<Schema>,
    /// Object schema whose properties are the query parameters.
    pub querystring: Option<Schema>,
    /// Keyed by status code or `default`.
    pub response: BTreeMap<String, Schema>,
}

/// One registered route.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDescriptor {
    pub methods: Vec<Method>,
    /// Framework template, e.g. `/pets/:id(\d+)`.
    pub url: String,
    pub schema: RouteSchema,
    pub oas: Option<RouteOasOptions>,
}

impl RouteDescriptor {
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            methods: vec![method],
            url: url.into(),
            schema: RouteSchema::default(),
            oas: None,
        }
    }

    /// Register the same handler for several methods.
    #[must_use]
    pub fn with_methods(methods: impl IntoIterator<Item = Method>, url: impl Into<String>) -> Self {
        Self {
            methods: methods.into_iter().collect(),
            url: url.into(),
            schema: RouteSchema::default(),
            oas: None,
        }
    }

    #[must_use]
    pub fn body(mut self, schema: Schema) -> Self {
        self.schema.body = Some(schema);
        self
    }

    #[must_use]
    pub fn params(mut self, schema: Schema) -> Self {
        self.schema.params = Some(schema);
        self
    }

    #[must_use]
    pub fn querystring(mut self, schema: Schema) -> Self {
        self.schema.querystring = Some(schema);
        self
    }

    #[must_use]
    pub fn response(mut self, code: impl Into<String>, schema: Schema) -> Self {
        self.schema.response.insert(code.into(), schema);
        self
    }

    #[must_use]
    pub fn oas(mut self, options: RouteOasOptions) -> Self {
        self.oas = Some(options);
        self
    }

    /// `GET` or `GET,HEAD`, for logs and error messages.
    #[must_use]
    pub fn method_label(&self) -> String {
        self.methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    #[must_use]
    pub fn is_omitted(&self) -> bool {
        self.oas.as_ref().is_some_and(|o| o.omit)
    }

    #[must_use]
    pub fn declared_security(&self) -> Option<&SecurityDeclaration> {
        self.oas.as_ref().and_then(|o| o.security.as_ref())
    }
}

/// Request body overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BodyExtras {
    pub description: Option<String>,
    pub content_type: Option<String>,
    pub schema_override: Option<Schema>,
}

/// Per query parameter overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryParamExtras {
    pub deprecated: Option<bool>,
    pub description: Option<String>,
    pub example: Option<Value>,
    pub allow_empty_value: Option<bool>,
    pub allow_reserved: Option<bool>,
    pub style: Option<ParameterStyle>,
    pub explode: Option<bool>,
    pub schema_override: Option<Schema>,
}

/// Per path parameter overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PathParamExtras {
    pub description: Option<String>,
    pub example: Option<Value>,
    pub schema_override: Option<Schema>,
}

/// Per response code overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResponseExtras {
    pub description: Option<String>,
    pub content_type: Option<String>,
    pub schema_override: Option<Schema>,
}

/// OpenAPI options for a route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteOasOptions {
    pub operation_id: Option<String>,
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub deprecated: Option<bool>,
    pub external_docs: Option<ExternalDocumentation>,
    pub callbacks: BTreeMap<String, ObjectOrReference<Callback>>,
    /// Overrides the root requirement; an empty list disables security.
    /// Still applied when `omit` is set.
    pub security: Option<SecurityDeclaration>,
    /// Leave the route out of the document.
    pub omit: bool,
    /// Merged into the operation; keys must start with `x-`.
    pub vendor_prefixed_fields: Extensions,
    pub body: Option<BodyExtras>,
    pub querystring: BTreeMap<String, QueryParamExtras>,
    pub params: BTreeMap<String, PathParamExtras>,
    pub responses: BTreeMap<String, ResponseExtras>,
}

impl RouteOasOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn summary(mut self, text: impl Into<String>) -> Self {
        self.summary = Some(text.into());
        self
    }

    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    #[must_use]
    pub fn deprecated(mut self, on: bool) -> Self {
        self.deprecated = Some(on);
        self
    }

    #[must_use]
    pub fn security(mut self, declaration: impl Into<SecurityDeclaration>) -> Self {
        self.security = Some(declaration.into());
        self
    }

    /// Explicitly empty requirement: no check, even under a root requirement.
    #[must_use]
    pub fn no_security(mut self) -> Self {
        self.security = Some(SecurityDeclaration::AnyOf(Vec::new()));
        self
    }

    #[must_use]
    pub fn omit(mut self) -> Self {
        self.omit = true;
        self
    }

    #[must_use]
    pub fn vendor_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.vendor_prefixed_fields.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn body_extras(mut self, extras: BodyExtras) -> Self {
        self.body = Some(extras);
        self
    }

    #[must_use]
    pub fn query_param(mut self, name: impl Into<String>, extras: QueryParamExtras) -> Self {
        self.querystring.insert(name.into(), extras);
        self
    }

    #[must_use]
    pub fn path_param(mut self, name: impl Into<String>, extras: PathParamExtras) -> Self {
        self.params.insert(name.into(), extras);
        self
    }

    #[must_use]
    pub fn response_extras(mut self, code: impl Into<String>, extras: ResponseExtras) -> Self {
        self.responses.insert(code.into(), extras);
        self
    }
}
