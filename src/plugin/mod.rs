//! # Plugin Module
//!
//! Ties routes, security and document assembly together.
//!
//! ## Lifecycle
//!
//! 1. [`OpenApiPlugin::builder`] takes the [`PluginConfig`], scheme validators,
//!    hooks, the operation-id function, the failure handler and the document
//!    validator. [`OpenApiPluginBuilder::build`] checks the configuration.
//! 2. [`OpenApiPlugin::register_route`] is called once per route. It resolves
//!    the route's security requirement, compiles (or reuses) an evaluator, and
//!    records the route for documentation unless it is omitted.
//! 3. [`OpenApiPlugin::ready`] assembles the document: pre-parse hook,
//!    operations, schema canonicalisation, post-parse hook, validation. The
//!    result is published atomically through a [`DocumentHandle`].
//!
//! ## Example
//!
//! ```rust
//! use brrtdoc::plugin::OpenApiPlugin;
//! use brrtdoc::config::PluginConfig;
//! use brrtdoc::route::{RouteDescriptor, RouteOasOptions};
//! use brrtdoc::schema::{schema_type, Schema};
//! use brrtdoc::spec::Info;
//! use http::Method;
//!
//! let pet = schema_type("Pet", Schema::object().required_property("name", Schema::string()));
//!
//! let mut plugin = OpenApiPlugin::builder(PluginConfig::new(Info::new("Pets", "1.0.0")))
//!     .build()
//!     .unwrap();
//! plugin
//!     .register_route(
//!         RouteDescriptor::new(Method::GET, "/pets/:id")
//!             .response("200", pet.clone())
//!             .oas(RouteOasOptions::new().operation_id("getPet")),
//!     )
//!     .unwrap();
//!
//! let published = plugin.ready().unwrap();
//! let doc = published.value();
//! assert_eq!(
//!     doc["paths"]["/pets/{id}"]["get"]["responses"]["200"]["content"]["application/json"]["schema"]["$ref"],
//!     "#/components/schemas/Pet"
//! );
//! ```

mod operation;

pub use operation::{build_operation, default_operation_id, OperationIdFn, APPLICATION_JSON};

use arc_swap::ArcSwapOption;
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn};

use crate::config::{PluginConfig, PublishConfig, SchemeValidator};
use crate::error::{Error, Result};
use crate::request::{HandlerResponse, HeaderVec};
use crate::route::RouteDescriptor;
use crate::security::{
    default_failure_response, resolve_route_security, EvaluatorCache, FailureHandler, PolicyOptions,
    SchemeRegistry, SecurityHook, SecurityScheme,
};
use crate::spec::{translate_path, Info, OpenApiDocument, Operation};
use crate::transform::canonicalize_annotated_schemas;
use crate::validator::{print_issues, DocumentValidator, StructuralValidator};

/// Hook over the whole document (`pre_parse`, `post_parse`).
pub type DocumentHook = Box<dyn Fn(&mut OpenApiDocument) + Send + Sync>;

/// Hook over each built operation, before it is added to the document.
/// Tagged schemas are still inline here.
pub type OperationHook = Box<dyn Fn(&RouteDescriptor, &mut Operation) + Send + Sync>;

/// Builder for [`OpenApiPlugin`].
pub struct OpenApiPluginBuilder {
    config: PluginConfig,
    schemes: SchemeRegistry,
    validators: BTreeMap<String, SchemeValidator>,
    pre_parse: Option<DocumentHook>,
    post_parse: Option<DocumentHook>,
    post_operation_build: Option<OperationHook>,
    operation_id_fn: Option<OperationIdFn>,
    failure_handler: Option<Arc<dyn FailureHandler>>,
    document_validator: Option<Arc<dyn DocumentValidator>>,
}

impl OpenApiPluginBuilder {
    /// Register a scheme built in code. Replaces a configured scheme of the
    /// same name.
    #[must_use]
    pub fn scheme(mut self, name: impl Into<String>, scheme: SecurityScheme) -> Self {
        self.schemes.insert(name, scheme);
        self
    }

    /// Bind an evaluator to the scheme declared as `name` in configuration.
    #[must_use]
    pub fn scheme_validator(mut self, name: impl Into<String>, validator: SchemeValidator) -> Self {
        self.validators.insert(name.into(), validator);
        self
    }

    /// Runs before any route is walked.
    #[must_use]
    pub fn pre_parse(mut self, hook: impl Fn(&mut OpenApiDocument) + Send + Sync + 'static) -> Self {
        self.pre_parse = Some(Box::new(hook));
        self
    }

    /// Runs after canonicalisation, before validation.
    #[must_use]
    pub fn post_parse(mut self, hook: impl Fn(&mut OpenApiDocument) + Send + Sync + 'static) -> Self {
        self.post_parse = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn post_operation_build(
        mut self,
        hook: impl Fn(&RouteDescriptor, &mut Operation) + Send + Sync + 'static,
    ) -> Self {
        self.post_operation_build = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn operation_id_fn(
        mut self,
        f: impl Fn(&RouteDescriptor, &http::Method) -> String + Send + Sync + 'static,
    ) -> Self {
        self.operation_id_fn = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn failure_handler(mut self, handler: impl FailureHandler + 'static) -> Self {
        self.failure_handler = Some(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn document_validator(mut self, validator: impl DocumentValidator + 'static) -> Self {
        self.document_validator = Some(Arc::new(validator));
        self
    }

    /// Check the configuration and bind configured schemes.
    pub fn build(self) -> Result<OpenApiPlugin> {
        let info = self.config.info()?.clone();
        debug!(title = %info.title, version = %info.version, "Initializing OpenAPI plugin.");

        let policy = match self.config.active_security() {
            Some(security) => {
                let mut registry = security.build_registry(self.validators)?;
                for (name, scheme) in self.schemes.iter() {
                    if registry.get(name).is_some() {
                        warn!(security_scheme = name, "Code-registered scheme replaces configured scheme.");
                    }
                    registry.insert(name, scheme.clone());
                }
                Some((registry, security.policy_options()))
            }
            None => {
                info!("OpenAPI plugin security autowire is disabled.");
                None
            }
        };

        let (registry, policy) = match policy {
            Some((registry, options)) => (registry, Some(options)),
            None => (self.schemes, None),
        };

        Ok(OpenApiPlugin {
            document: DocumentHandle::new(self.config.publish.clone()),
            config: self.config,
            info,
            registry,
            policy,
            evaluators: EvaluatorCache::new(),
            routes: Vec::new(),
            pre_parse: self.pre_parse,
            post_parse: self.post_parse,
            post_operation_build: self.post_operation_build,
            operation_id_fn: self
                .operation_id_fn
                .unwrap_or_else(|| Arc::new(default_operation_id)),
            failure_handler: self
                .failure_handler
                .unwrap_or_else(|| Arc::new(default_failure_response)),
            document_validator: self
                .document_validator
                .unwrap_or_else(|| Arc::new(StructuralValidator::new())),
        })
    }
}

/// What registering a route produced.
#[derive(Debug, Clone, Default)]
pub struct RouteRegistration {
    /// Pre-handler to run before the route's handler. `None` when the route
    /// needs no check or security wiring is off.
    pub hook: Option<SecurityHook>,
}

/// Route collector and document assembler.
pub struct OpenApiPlugin {
    config: PluginConfig,
    info: Info,
    registry: SchemeRegistry,
    /// `None` when security wiring is absent or disabled.
    policy: Option<PolicyOptions>,
    evaluators: EvaluatorCache,
    routes: Vec<RouteDescriptor>,
    pre_parse: Option<DocumentHook>,
    post_parse: Option<DocumentHook>,
    post_operation_build: Option<OperationHook>,
    operation_id_fn: OperationIdFn,
    failure_handler: Arc<dyn FailureHandler>,
    document_validator: Arc<dyn DocumentValidator>,
    document: DocumentHandle,
}

impl OpenApiPlugin {
    #[must_use]
    pub fn builder(config: PluginConfig) -> OpenApiPluginBuilder {
        OpenApiPluginBuilder {
            config,
            schemes: SchemeRegistry::new(),
            validators: BTreeMap::new(),
            pre_parse: None,
            post_parse: None,
            post_operation_build: None,
            operation_id_fn: None,
            failure_handler: None,
            document_validator: None,
        }
    }

    /// Attach security to `route` and record it for documentation.
    ///
    /// Omitted routes are not documented but still get their security hook.
    pub fn register_route(&mut self, route: RouteDescriptor) -> Result<RouteRegistration> {
        let method = route.method_label();
        let _span = info_span!("register_route", method = %method, url = %route.url).entered();

        let hook = match &self.policy {
            None => {
                debug!("Autowire disabled; skipping.");
                None
            }
            Some(policy) => {
                match resolve_route_security(route.declared_security(), policy, &method, &route.url)? {
                    None => None,
                    Some(clauses) => {
                        let evaluator = self.evaluators.get_or_compile(&clauses, &self.registry, policy)?;
                        Some(SecurityHook::new(evaluator, Arc::clone(&self.failure_handler)))
                    }
                }
            }
        };

        if route.is_omitted() {
            debug!("Route has omit = true; not documenting.");
        } else {
            self.routes.push(route);
        }

        Ok(RouteRegistration { hook })
    }

    /// Assemble, validate and publish the document.
    pub fn ready(&self) -> Result<Arc<PublishedDocument>> {
        let _span = info_span!("openapi_ready").entered();
        match self.assemble() {
            Ok(published) => Ok(published),
            Err(err) => {
                error!(error = %err, "Error during OpenAPI document assembly.");
                Err(err)
            }
        }
    }

    fn assemble(&self) -> Result<Arc<PublishedDocument>> {
        let mut doc = OpenApiDocument::new(self.info.clone());

        if let Some(hook) = &self.pre_parse {
            debug!("Calling preParse.");
            hook(&mut doc);
        }

        for route in &self.routes {
            self.add_route(&mut doc, route);
        }

        if let Some(policy) = &self.policy {
            if doc.security.is_none() {
                doc.security = policy.root_security.as_ref().map(|d| d.clauses());
            }
            for (name, object) in self.registry.document_objects() {
                debug!(security_scheme = %name, "Attaching security scheme.");
                doc.components.security_schemes.entry(name).or_insert(object);
            }
        }

        canonicalize_annotated_schemas(&mut doc)?;

        if let Some(hook) = &self.post_parse {
            debug!("Calling postParse.");
            hook(&mut doc);
        }

        let value = doc.to_value()?;
        let issues = self.document_validator.validate(&value);
        if !issues.is_empty() {
            print_issues(&issues);
            if self.config.print_specification_on_validation_failure {
                warn!(document = %value, "Invalid OpenAPI document.");
            }
            if self.config.exit_on_invalid_document {
                error!(issue_count = issues.len(), "Errors in OpenAPI validation.");
                return Err(Error::InvalidDocument(issues));
            }
        }

        debug!("Publishing completed OpenAPI document.");
        let published = Arc::new(PublishedDocument::new(doc, value));
        self.document.publish(Arc::clone(&published));
        Ok(published)
    }

    fn add_route(&self, doc: &mut OpenApiDocument, route: &RouteDescriptor) {
        let _span = info_span!("route", method = %route.method_label(), url = %route.url).entered();

        if route.url.starts_with(&self.config.publish.ui_path) {
            debug!("Skipping UI route.");
            return;
        }
        if route.oas.is_none() && !self.config.include_unconfigured_operations {
            debug!("Route has no OpenAPI options; skipping.");
            return;
        }

        let translated = translate_path(&route.url);
        info!(oas_url = %translated.url, "Building operation for route.");

        if route.methods.len() > 1 && route.oas.as_ref().is_some_and(|o| o.operation_id.is_some()) {
            warn!("Explicit operationId is shared by every method of this route.");
        }

        for method in &route.methods {
            let slot_name = method.as_str().to_ascii_lowercase();
            let mut operation = build_operation(route, method, &translated, &self.operation_id_fn);
            if let Some(hook) = &self.post_operation_build {
                hook(route, &mut operation);
            }

            let item = doc.paths.entry(translated.url.clone()).or_default();
            let Some(slot) = item.slot_mut(&slot_name) else {
                warn!(method = %method, "Method has no OpenAPI operation slot; skipping.");
                continue;
            };
            if slot.is_some() {
                warn!(method = %method, "Replacing operation already documented for this path.");
            }
            *slot = Some(operation);
        }
    }

    /// Shared handle to the published document.
    #[must_use]
    pub fn document(&self) -> DocumentHandle {
        self.document.clone()
    }

    #[must_use]
    pub fn registry(&self) -> &SchemeRegistry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Routes recorded for documentation, in registration order.
    #[must_use]
    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }

    /// Number of distinct compiled evaluators.
    #[must_use]
    pub fn evaluator_count(&self) -> usize {
        self.evaluators.len()
    }
}

impl fmt::Debug for OpenApiPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenApiPlugin")
            .field("info", &self.info)
            .field("registry", &self.registry)
            .field("policy", &self.policy)
            .field("routes", &self.routes.len())
            .field("evaluators", &self.evaluators)
            .finish_non_exhaustive()
    }
}

/// A finished document with lazily rendered JSON and YAML.
#[derive(Debug)]
pub struct PublishedDocument {
    document: OpenApiDocument,
    value: Value,
    json: OnceCell<String>,
    yaml: OnceCell<String>,
}

impl PublishedDocument {
    fn new(document: OpenApiDocument, value: Value) -> Self {
        Self {
            document,
            value,
            json: OnceCell::new(),
            yaml: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn document(&self) -> &OpenApiDocument {
        &self.document
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Pretty JSON, rendered on first use.
    pub fn json(&self) -> Result<&str, serde_json::Error> {
        self.json
            .get_or_try_init(|| serde_json::to_string_pretty(&self.value))
            .map(String::as_str)
    }

    /// YAML, rendered on first use.
    pub fn yaml(&self) -> Result<&str, serde_yaml::Error> {
        self.yaml
            .get_or_try_init(|| serde_yaml::to_string(&self.value))
            .map(String::as_str)
    }
}

/// Read side of the published document. Cheap to clone; every clone sees the
/// latest publish.
#[derive(Clone)]
pub struct DocumentHandle {
    current: Arc<ArcSwapOption<PublishedDocument>>,
    publish: Arc<PublishConfig>,
}

impl DocumentHandle {
    fn new(publish: PublishConfig) -> Self {
        Self {
            current: Arc::new(ArcSwapOption::empty()),
            publish: Arc::new(publish),
        }
    }

    fn publish(&self, document: Arc<PublishedDocument>) {
        self.current.store(Some(document));
    }

    /// `None` until `ready()` has succeeded once.
    #[must_use]
    pub fn current(&self) -> Option<Arc<PublishedDocument>> {
        self.current.load_full()
    }

    /// Response for the configured JSON or YAML path, or `None` when `path`
    /// is neither or nothing is published yet.
    #[must_use]
    pub fn serve(&self, path: &str) -> Option<HandlerResponse> {
        let doc = self.current()?;
        let path = path.trim_start_matches('/');

        let (content_type, rendered) = if self.publish.json.as_deref() == Some(path) {
            ("application/json; charset=utf-8", doc.json().map(str::to_string).map_err(|e| e.to_string()))
        } else if self.publish.yaml.as_deref() == Some(path) {
            ("application/x-yaml; charset=utf-8", doc.yaml().map(str::to_string).map_err(|e| e.to_string()))
        } else {
            return None;
        };

        Some(match rendered {
            Ok(body) => {
                let mut headers = HeaderVec::new();
                headers.push((Arc::from("content-type"), content_type.to_string()));
                headers.push((Arc::from("content-disposition"), "inline".to_string()));
                HandlerResponse::new(200, headers, Value::String(body))
            }
            Err(err) => {
                error!(error = %err, path, "Failed to render OpenAPI document.");
                HandlerResponse::error(500, "Internal Server Error")
            }
        })
    }
}

impl fmt::Debug for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentHandle")
            .field("published", &self.current.load().is_some())
            .field("publish", &self.publish)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AutowiredSecurityConfig;
    use crate::route::RouteOasOptions;
    use crate::security::AuthDecision;
    use crate::spec::{ApiKeyLocation, SecurityRequirement};
    use http::Method;
    use serde_json::json;

    fn config() -> PluginConfig {
        PluginConfig::new(Info::new("test", "1.0.0"))
    }

    #[test]
    fn test_missing_info_fails_build() {
        let err = OpenApiPlugin::builder(PluginConfig::default()).build().unwrap_err();
        assert!(matches!(err, Error::Config(crate::error::ConfigError::MissingInfo)));
    }

    #[test]
    fn test_unconfigured_and_ui_routes_are_skipped() {
        let mut plugin = OpenApiPlugin::builder(config()).build().unwrap();
        plugin.register_route(RouteDescriptor::new(Method::GET, "/bare")).unwrap();
        plugin
            .register_route(RouteDescriptor::new(Method::GET, "/docs/static").oas(RouteOasOptions::new()))
            .unwrap();
        plugin
            .register_route(RouteDescriptor::new(Method::GET, "/pets").oas(RouteOasOptions::new()))
            .unwrap();

        let published = plugin.ready().unwrap();
        let paths: Vec<&String> = published.document().paths.keys().collect();
        assert_eq!(paths, vec!["/pets"]);
    }

    #[test]
    fn test_multiple_methods_share_a_path_item() {
        let mut plugin = OpenApiPlugin::builder(PluginConfig {
            include_unconfigured_operations: true,
            ..config()
        })
        .build()
        .unwrap();
        plugin
            .register_route(RouteDescriptor::with_methods([Method::GET, Method::HEAD], "/health"))
            .unwrap();
        let published = plugin.ready().unwrap();
        let item = &published.value()["paths"]["/health"];
        assert_eq!(item["get"]["operationId"], "healthGet");
        assert_eq!(item["head"]["operationId"], "healthHead");
    }

    #[test]
    fn test_security_disabled_means_no_hooks() {
        let mut cfg = config();
        cfg.autowired_security = Some(AutowiredSecurityConfig {
            disabled: true,
            allow_empty_security_with_no_root: false,
            ..AutowiredSecurityConfig::default()
        });
        let mut plugin = OpenApiPlugin::builder(cfg).build().unwrap();
        let reg = plugin
            .register_route(
                RouteDescriptor::new(Method::GET, "/pets")
                    .oas(RouteOasOptions::new().security(SecurityRequirement::new().scheme("Nope"))),
            )
            .unwrap();
        assert!(reg.hook.is_none());
    }

    #[test]
    fn test_serve_renders_configured_paths() {
        let mut cfg = config();
        cfg.autowired_security = Some(AutowiredSecurityConfig::default());
        let mut plugin = OpenApiPlugin::builder(cfg)
            .scheme(
                "Key",
                SecurityScheme::api_key("X-KEY", ApiKeyLocation::Header, |_, _, _| Ok(AuthDecision::Allow)),
            )
            .build()
            .unwrap();
        plugin
            .register_route(RouteDescriptor::new(Method::GET, "/pets").oas(RouteOasOptions::new()))
            .unwrap();

        let handle = plugin.document();
        assert!(handle.serve("/openapi.json").is_none());
        plugin.ready().unwrap();

        let json_response = handle.serve("/openapi.json").unwrap();
        assert_eq!(json_response.status, 200);
        assert_eq!(
            json_response.get_header("content-type"),
            Some("application/json; charset=utf-8")
        );
        let body: Value = serde_json::from_str(json_response.body.as_str().unwrap()).unwrap();
        assert_eq!(
            body["components"]["securitySchemes"]["Key"],
            json!({ "type": "apiKey", "name": "X-KEY", "in": "header" })
        );

        let yaml_response = handle.serve("openapi.yaml").unwrap();
        let yaml = yaml_response.body.as_str().unwrap();
        assert!(yaml.contains("openapi:") && yaml.contains("3.1.0"));
        assert!(handle.serve("/other").is_none());
    }
}
