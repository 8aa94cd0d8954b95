//! # Security Module
//!
//! Declarative request authorization for routes, following the OpenAPI
//! `security` model.
//!
//! ## Overview
//!
//! Schemes are declared once, by name, in a [`SchemeRegistry`]:
//!
//! - **API key**: read from a header (case-insensitive), a cookie (name
//!   lower-cased) or a query parameter
//! - **HTTP Basic**: `Authorization: Basic <base64(user:pass)>`
//! - **HTTP Bearer**: `Authorization: Bearer <token>`
//!
//! Each scheme carries an evaluator returning an [`AuthDecision`]. Routes
//! declare a requirement: one clause, or a list of clauses. Scheme names
//! inside a clause are AND'd, clauses are OR'd:
//!
//! ```text
//! security:
//!   - ApiKey: []          # either an API key ...
//!   - Bearer: []          # ... or a bearer token
//!     TenantHeader: []    #     together with a tenant header
//! ```
//!
//! ## Evaluation
//!
//! A [`RequestEvaluator`] runs the clauses in declaration order. The first
//! clause whose schemes all allow ends evaluation; later clauses and schemes
//! never run. Inside a clause the first denial ends the clause. When every
//! clause fails, `Forbidden` (403) is reported if any scheme said so,
//! otherwise `Unauthorized` (401).
//!
//! Evaluators never propagate failures: an `Err` or a panic from a scheme's
//! evaluator is logged and counted as a 401.
//!
//! ## Example
//!
//! ```rust
//! use brrtdoc::request::RequestParts;
//! use brrtdoc::security::{
//!     AuthDecision, PolicyOptions, RequestEvaluator, SchemeRegistry, SecurityDeclaration,
//!     SecurityScheme,
//! };
//! use brrtdoc::spec::{ApiKeyLocation, SecurityRequirement};
//!
//! let registry = SchemeRegistry::new().with(
//!     "ApiKey",
//!     SecurityScheme::api_key("X-API-KEY", ApiKeyLocation::Header, |key, _req, _ctx| {
//!         Ok(match key {
//!             Some("admin") => AuthDecision::Allow,
//!             Some(_) => AuthDecision::forbidden(),
//!             None => AuthDecision::unauthorized(),
//!         })
//!     }),
//! );
//! let declared = SecurityDeclaration::from(SecurityRequirement::new().scheme("ApiKey"));
//! let evaluator =
//!     RequestEvaluator::compile(&declared.clauses(), &registry, &PolicyOptions::default()).unwrap();
//!
//! let req = RequestParts::new("GET", "/pets").header("x-api-key", "admin");
//! assert_eq!(evaluator.evaluate(&req.as_security_request()), AuthDecision::Allow);
//! ```

mod failure;
mod handlers;
mod policy;
mod scheme;

pub use failure::{default_failure_response, FailureHandler, SecurityHook};
pub use handlers::{build_handler, decode_basic_auth_header, WrappedHandler};
pub use policy::{
    resolve_route_security, EvaluatorCache, PolicyOptions, RequestEvaluator, SecurityDeclaration,
};
pub use scheme::{
    BasicCredentials, BasicValidatorFn, SchemeKind, SchemeOptions, SchemeRegistry,
    SecurityContext, SecurityScheme, TokenValidatorFn,
};

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyCode {
    /// 401: the caller is not known.
    Unauthorized,
    /// 403: the caller is known and not allowed.
    Forbidden,
}

impl DenyCode {
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            DenyCode::Unauthorized => 401,
            DenyCode::Forbidden => 403,
        }
    }
}

/// Result of one scheme check, or of a whole requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthDecision {
    Allow,
    Deny(DenyCode),
}

impl AuthDecision {
    #[must_use]
    pub const fn unauthorized() -> Self {
        AuthDecision::Deny(DenyCode::Unauthorized)
    }

    #[must_use]
    pub const fn forbidden() -> Self {
        AuthDecision::Deny(DenyCode::Forbidden)
    }

    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, AuthDecision::Allow)
    }
}
