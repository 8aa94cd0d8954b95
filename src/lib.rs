//! # brrtdoc
//!
//! **brrtdoc** turns a web framework's route table into an
//! [OpenAPI 3.1.0](https://spec.openapis.org/oas/v3.1.0) document and wires
//! declarative request authorization onto the same routes.
//!
//! ## Overview
//!
//! The host framework registers each route with an [`OpenApiPlugin`]. Routes
//! carry their validation schemas and optional OpenAPI options. Once every
//! route is known, [`OpenApiPlugin::ready`] assembles the document, hoists
//! every tagged schema into `components.schemas`, validates the result and
//! publishes it. At registration time each route also receives a
//! [`security::SecurityHook`] that evaluates its security requirement per
//! request.
//!
//! ## Architecture
//!
//! - **[`spec`]** - Typed OpenAPI 3.1 document model and path template translation
//! - **[`schema`]** - Schema model and identity tags used for deduplication
//! - **[`transform`]** - Tagged schema discovery, canonicalisation and `$ref` fixup
//! - **[`security`]** - Scheme registry, OR-of-AND evaluator, failure handling
//! - **[`route`]** - Route descriptors and per-route OpenAPI options
//! - **[`plugin`]** - Builder, route registration and document assembly
//! - **[`config`]** - File and environment configuration
//! - **[`validator`]** - Structural validation of the assembled document
//! - **[`request`]** - Borrowed request view consumed by security evaluators
//! - **[`logging`]** - `tracing` subscriber setup
//!
//! ### Document Assembly Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Host as Host framework
//!     participant Plugin as plugin::OpenApiPlugin
//!     participant Sec as security::EvaluatorCache
//!     participant Op as plugin::build_operation
//!     participant Tx as transform
//!     participant Val as validator
//!
//!     Host->>Plugin: register_route(route)
//!     Plugin->>Sec: get_or_compile(clauses)
//!     Sec-->>Plugin: Arc<RequestEvaluator>
//!     Plugin-->>Host: RouteRegistration { hook }
//!     Host->>Plugin: ready()
//!     Plugin->>Op: build_operation(route, method)
//!     Plugin->>Tx: canonicalize_annotated_schemas(doc)
//!     Tx-->>Plugin: doc with $refs
//!     Plugin->>Val: validate(doc)
//!     Plugin-->>Host: Arc<PublishedDocument>
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtdoc::config::{AutowiredSecurityConfig, PluginConfig};
//! use brrtdoc::request::RequestParts;
//! use brrtdoc::route::{RouteDescriptor, RouteOasOptions};
//! use brrtdoc::schema::{schema_type, Schema};
//! use brrtdoc::security::{AuthDecision, SecurityDeclaration, SecurityScheme};
//! use brrtdoc::spec::{ApiKeyLocation, Info, SecurityRequirement};
//! use http::Method;
//!
//! let mut config = PluginConfig::new(Info::new("Pet Store", "1.0.0"));
//! config.autowired_security = Some(AutowiredSecurityConfig {
//!     root_security: Some(SecurityDeclaration::from(SecurityRequirement::new().scheme("ApiKey"))),
//!     ..AutowiredSecurityConfig::default()
//! });
//!
//! let mut plugin = brrtdoc::OpenApiPlugin::builder(config)
//!     .scheme(
//!         "ApiKey",
//!         SecurityScheme::api_key("X-API-KEY", ApiKeyLocation::Header, |key, _, _| {
//!             Ok(if key == Some("test123") { AuthDecision::Allow } else { AuthDecision::unauthorized() })
//!         }),
//!     )
//!     .build()?;
//!
//! let pet = schema_type("Pet", Schema::object().required_property("name", Schema::string()));
//! let registration = plugin.register_route(
//!     RouteDescriptor::new(Method::GET, "/pets")
//!         .response("200", Schema::array(pet))
//!         .oas(RouteOasOptions::new().summary("List pets")),
//! )?;
//!
//! let published = plugin.ready()?;
//! assert!(published.document().components.schemas.contains_key("Pet"));
//!
//! let hook = registration.hook.expect("root security applies");
//! let anonymous = RequestParts::new("GET", "/pets");
//! let denied = hook.run(&anonymous.as_security_request()).expect("denied");
//! assert_eq!(denied.status, 401);
//! # Ok::<(), brrtdoc::Error>(())
//! ```
//!
//! ## Schema Identity
//!
//! Schemas are deduplicated by identity, not by name. [`schema::schema_type`]
//! attaches a fresh [`schema::SchemaTag`]; every clone of the tagged schema is
//! the same type and ends up as one `components.schemas` entry. Two separately
//! tagged schemas with the same name are a [`error::SchemaGraphError`].
//!
//! ## Configuration
//!
//! ```yaml
//! openapiInfo:
//!   title: Pet Store
//!   version: 1.0.0
//! exitOnInvalidDocument: true
//! autowiredSecurity:
//!   allowEmptySecurityWithNoRoot: false
//!   rootSecurity:
//!     - ApiKey: []
//!   securitySchemes:
//!     ApiKey:
//!       type: apiKey
//!       in: header
//!       name: X-API-KEY
//! ```
//!
//! Load with [`config::PluginConfig::load_with_env`] and bind evaluators by
//! name with [`plugin::OpenApiPluginBuilder::scheme_validator`].
//!
//! ## Logging
//!
//! All phases emit `tracing` events. [`logging::init_logging`] installs a JSON
//! or pretty subscriber configured from `BRRTDOC_LOG_*` variables.

pub mod config;
pub mod error;
pub mod logging;
pub mod naming;
pub mod plugin;
pub mod request;
pub mod route;
pub mod schema;
pub mod security;
pub mod spec;
pub mod transform;
pub mod validator;

pub use error::{ConfigError, Error, Result, SchemaGraphError};
pub use plugin::{DocumentHandle, OpenApiPlugin, PublishedDocument, RouteRegistration};
pub use schema::{schema_type, Schema};
pub use spec::{translate_path, OpenApiDocument};
pub use transform::canonicalize_annotated_schemas;
