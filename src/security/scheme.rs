use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::AuthDecision;
use crate::request::SecurityRequest;
use crate::spec::{ApiKeyLocation, SecuritySchemeObject};

/// Extra data handed to evaluators that set `requires_parsed_body`.
#[derive(Debug, Clone, Copy)]
pub struct SecurityContext<'a> {
    pub body: Option<&'a Value>,
}

/// Decoded HTTP Basic credentials. Both halves are non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// Evaluator for API key and bearer schemes.
///
/// The credential is `None` only when the scheme passes null for a missing
/// credential. An `Err` (or a panic) denies the request with 401.
pub type TokenValidatorFn = Arc<
    dyn Fn(Option<&str>, &SecurityRequest<'_>, Option<&SecurityContext<'_>>) -> anyhow::Result<AuthDecision>
        + Send
        + Sync,
>;

/// Evaluator for HTTP Basic schemes.
pub type BasicValidatorFn = Arc<
    dyn Fn(
            Option<&BasicCredentials>,
            &SecurityRequest<'_>,
            Option<&SecurityContext<'_>>,
        ) -> anyhow::Result<AuthDecision>
        + Send
        + Sync,
>;

/// Behaviour flags shared by every scheme kind. Never written to the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemeOptions {
    /// Call the evaluator with `None` instead of denying when no credential
    /// was supplied.
    pub pass_null_if_none_provided: bool,
    /// Pass the parsed request body in a [`SecurityContext`].
    pub requires_parsed_body: bool,
}

/// The supported scheme kinds.
#[derive(Clone)]
pub enum SchemeKind {
    ApiKey {
        /// Header, cookie or query parameter name.
        name: String,
        location: ApiKeyLocation,
        validator: TokenValidatorFn,
    },
    HttpBasic {
        validator: BasicValidatorFn,
    },
    HttpBearer {
        bearer_format: Option<String>,
        validator: TokenValidatorFn,
    },
}

impl SchemeKind {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            SchemeKind::ApiKey { .. } => "apiKey",
            SchemeKind::HttpBasic { .. } => "http basic",
            SchemeKind::HttpBearer { .. } => "http bearer",
        }
    }
}

/// A named, configured authorization check.
#[derive(Clone)]
pub struct SecurityScheme {
    pub kind: SchemeKind,
    pub description: Option<String>,
    pub options: SchemeOptions,
}

impl SecurityScheme {
    /// API key read from `location` under `name`.
    ///
    /// ```
    /// use brrtdoc::security::{AuthDecision, SecurityScheme};
    /// use brrtdoc::spec::ApiKeyLocation;
    ///
    /// let scheme = SecurityScheme::api_key("X-API-KEY", ApiKeyLocation::Header, |key, _req, _ctx| {
    ///     Ok(if key == Some("secret") { AuthDecision::Allow } else { AuthDecision::unauthorized() })
    /// });
    /// assert_eq!(scheme.kind.label(), "apiKey");
    /// ```
    pub fn api_key<F>(name: impl Into<String>, location: ApiKeyLocation, f: F) -> Self
    where
        F: Fn(Option<&str>, &SecurityRequest<'_>, Option<&SecurityContext<'_>>) -> anyhow::Result<AuthDecision>
            + Send
            + Sync
            + 'static,
    {
        Self::from_kind(SchemeKind::ApiKey {
            name: name.into(),
            location,
            validator: Arc::new(f),
        })
    }

    pub fn http_basic<F>(f: F) -> Self
    where
        F: Fn(
                Option<&BasicCredentials>,
                &SecurityRequest<'_>,
                Option<&SecurityContext<'_>>,
            ) -> anyhow::Result<AuthDecision>
            + Send
            + Sync
            + 'static,
    {
        Self::from_kind(SchemeKind::HttpBasic {
            validator: Arc::new(f),
        })
    }

    pub fn http_bearer<F>(f: F) -> Self
    where
        F: Fn(Option<&str>, &SecurityRequest<'_>, Option<&SecurityContext<'_>>) -> anyhow::Result<AuthDecision>
            + Send
            + Sync
            + 'static,
    {
        Self::from_kind(SchemeKind::HttpBearer {
            bearer_format: None,
            validator: Arc::new(f),
        })
    }

    #[must_use]
    pub fn from_kind(kind: SchemeKind) -> Self {
        Self {
            kind,
            description: None,
            options: SchemeOptions::default(),
        }
    }

    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Document hint for bearer schemes; ignored by other kinds.
    #[must_use]
    pub fn bearer_format(mut self, format: impl Into<String>) -> Self {
        if let SchemeKind::HttpBearer { bearer_format, .. } = &mut self.kind {
            *bearer_format = Some(format.into());
        }
        self
    }

    #[must_use]
    pub fn pass_null_if_none_provided(mut self, on: bool) -> Self {
        self.options.pass_null_if_none_provided = on;
        self
    }

    #[must_use]
    pub fn requires_parsed_body(mut self, on: bool) -> Self {
        self.options.requires_parsed_body = on;
        self
    }

    /// Public description of this scheme, without evaluator or flags.
    #[must_use]
    pub fn to_document_object(&self) -> SecuritySchemeObject {
        match &self.kind {
            SchemeKind::ApiKey { name, location, .. } => SecuritySchemeObject::ApiKey {
                name: name.clone(),
                location: *location,
                description: self.description.clone(),
            },
            SchemeKind::HttpBasic { .. } => SecuritySchemeObject::Http {
                scheme: "basic".to_string(),
                bearer_format: None,
                description: self.description.clone(),
            },
            SchemeKind::HttpBearer { bearer_format, .. } => SecuritySchemeObject::Http {
                scheme: "bearer".to_string(),
                bearer_format: bearer_format.clone(),
                description: self.description.clone(),
            },
        }
    }
}

impl fmt::Debug for SecurityScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("SecurityScheme");
        s.field("kind", &self.kind.label());
        if let SchemeKind::ApiKey { name, location, .. } = &self.kind {
            s.field("name", name).field("in", location);
        }
        s.field("description", &self.description)
            .field("options", &self.options)
            .finish()
    }
}

/// Named schemes, declared once at configuration time and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct SchemeRegistry {
    schemes: BTreeMap<String, SecurityScheme>,
}

impl SchemeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `scheme` under `name`, replacing any earlier entry.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, scheme: SecurityScheme) -> Self {
        self.insert(name, scheme);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, scheme: SecurityScheme) {
        self.schemes.insert(name.into(), scheme);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SecurityScheme> {
        self.schemes.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SecurityScheme)> {
        self.schemes.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }

    /// Entries for `components.securitySchemes`.
    #[must_use]
    pub fn document_objects(&self) -> BTreeMap<String, SecuritySchemeObject> {
        self.schemes
            .iter()
            .map(|(name, scheme)| (name.clone(), scheme.to_document_object()))
            .collect()
    }
}
