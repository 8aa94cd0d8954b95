//! # Plugin Configuration
//!
//! [`PluginConfig`] is read from a YAML, JSON or TOML file (chosen by
//! extension) and then adjusted from the environment.
//!
//! ## Environment Variables
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `BRRTDOC_EXIT_ON_INVALID_DOCUMENT` | `exitOnInvalidDocument` |
//! | `BRRTDOC_ALLOW_UNRECOGNIZED_SECURITY` | `autowiredSecurity.allowUnrecognizedSecurity` |
//! | `BRRTDOC_ALLOW_EMPTY_SECURITY_WITH_NO_ROOT` | `autowiredSecurity.allowEmptySecurityWithNoRoot` |
//! | `BRRTDOC_UI_PATH` | `publish.uiPath` |
//!
//! Boolean variables accept `1`/`true`/`yes`/`on` and `0`/`false`/`no`/`off`;
//! anything else is ignored with a warning.
//!
//! ## Example
//!
//! ```yaml
//! openapiInfo:
//!   title: Pet Store
//!   version: 1.0.0
//! exitOnInvalidDocument: true
//! autowiredSecurity:
//!   rootSecurity:
//!     - ApiKey: []
//!   securitySchemes:
//!     ApiKey:
//!       type: apiKey
//!       in: header
//!       name: X-API-KEY
//! ```
//!
//! Scheme declarations carry no code. Evaluators are bound by name with
//! [`AutowiredSecurityConfig::build_registry`].

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::request::SecurityRequest;
use crate::security::{
    AuthDecision, BasicCredentials, BasicValidatorFn, PolicyOptions, SchemeKind, SchemeRegistry,
    SecurityContext, SecurityDeclaration, SecurityScheme, TokenValidatorFn,
};
use crate::spec::{ApiKeyLocation, Info};

fn default_ui_path() -> String {
    "/docs".to_string()
}

fn default_json_path() -> Option<String> {
    Some("openapi.json".to_string())
}

fn default_yaml_path() -> Option<String> {
    Some("openapi.yaml".to_string())
}

/// Top-level plugin configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginConfig {
    /// Copied verbatim into the document's `info`. Required.
    pub openapi_info: Option<Info>,
    /// Fail `ready()` when the assembled document does not validate.
    pub exit_on_invalid_document: bool,
    /// Document routes that carry no OpenAPI options.
    pub include_unconfigured_operations: bool,
    /// Log the whole document when validation fails.
    pub print_specification_on_validation_failure: bool,
    pub publish: PublishConfig,
    /// `None` disables security wiring entirely.
    pub autowired_security: Option<AutowiredSecurityConfig>,
}

/// Where the finished document is served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublishConfig {
    /// Routes under this prefix are never documented.
    pub ui_path: String,
    /// Path (without leading `/`) of the JSON rendering; `None` to skip.
    pub json: Option<String>,
    /// Path (without leading `/`) of the YAML rendering; `None` to skip.
    pub yaml: Option<String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            ui_path: default_ui_path(),
            json: default_json_path(),
            yaml: default_yaml_path(),
        }
    }
}

/// Security wiring options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutowiredSecurityConfig {
    pub disabled: bool,
    pub allow_unrecognized_security: bool,
    pub allow_empty_security_with_no_root: bool,
    pub root_security: Option<SecurityDeclaration>,
    pub security_schemes: BTreeMap<String, SchemeDeclaration>,
}

impl Default for AutowiredSecurityConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            allow_unrecognized_security: false,
            allow_empty_security_with_no_root: true,
            root_security: None,
            security_schemes: BTreeMap::new(),
        }
    }
}

/// A scheme as written in configuration. Loosely typed; checked when bound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemeDeclaration {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_format: Option<String>,
    #[serde(default)]
    pub pass_null_if_none_provided: bool,
    #[serde(default)]
    pub requires_parsed_body: bool,
}

/// Code half of a scheme, bound to a [`SchemeDeclaration`] by name.
#[derive(Clone)]
pub enum SchemeValidator {
    /// For `apiKey` and `http bearer`.
    Token(TokenValidatorFn),
    /// For `http basic`.
    Basic(BasicValidatorFn),
}

impl SchemeValidator {
    pub fn token<F>(f: F) -> Self
    where
        F: Fn(Option<&str>, &SecurityRequest<'_>, Option<&SecurityContext<'_>>) -> anyhow::Result<AuthDecision>
            + Send
            + Sync
            + 'static,
    {
        SchemeValidator::Token(Arc::new(f))
    }

    pub fn basic<F>(f: F) -> Self
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
        SchemeValidator::Basic(Arc::new(f))
    }
}

impl std::fmt::Debug for SchemeValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemeValidator::Token(_) => f.write_str("SchemeValidator::Token"),
            SchemeValidator::Basic(_) => f.write_str("SchemeValidator::Basic"),
        }
    }
}

impl SchemeDeclaration {
    /// Bind `validator` to this declaration, registered as `name`.
    pub fn into_scheme(&self, name: &str, validator: SchemeValidator) -> Result<SecurityScheme, ConfigError> {
        let http_scheme = self.scheme.as_deref().map(str::to_ascii_lowercase);
        let kind = match (self.kind.as_str(), http_scheme.as_deref()) {
            ("apiKey", _) => {
                let location = self.api_key_location(name)?;
                let key_name = self
                    .name
                    .clone()
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| ConfigError::MissingApiKeyName { name: name.to_string() })?;
                SchemeKind::ApiKey {
                    name: key_name,
                    location,
                    validator: expect_token(name, validator)?,
                }
            }
            ("http", Some("basic")) => SchemeKind::HttpBasic {
                validator: expect_basic(name, validator)?,
            },
            ("http", Some("bearer")) => SchemeKind::HttpBearer {
                bearer_format: self.bearer_format.clone(),
                validator: expect_token(name, validator)?,
            },
            ("http", other) => {
                return Err(ConfigError::UnsupportedSchemeKind {
                    name: name.to_string(),
                    kind: format!("http {}", other.unwrap_or("<none>")),
                })
            }
            (other, _) => {
                return Err(ConfigError::UnsupportedSchemeKind {
                    name: name.to_string(),
                    kind: other.to_string(),
                })
            }
        };

        let mut scheme = SecurityScheme::from_kind(kind)
            .pass_null_if_none_provided(self.pass_null_if_none_provided)
            .requires_parsed_body(self.requires_parsed_body);
        scheme.description = self.description.clone();
        Ok(scheme)
    }

    fn api_key_location(&self, name: &str) -> Result<ApiKeyLocation, ConfigError> {
        match self.location.as_deref() {
            Some("header") => Ok(ApiKeyLocation::Header),
            Some("cookie") => Ok(ApiKeyLocation::Cookie),
            Some("query") => Ok(ApiKeyLocation::Query),
            other => Err(ConfigError::InvalidApiKeyLocation {
                name: name.to_string(),
                location: other.unwrap_or("<none>").to_string(),
            }),
        }
    }
}

fn expect_token(name: &str, validator: SchemeValidator) -> Result<TokenValidatorFn, ConfigError> {
    match validator {
        SchemeValidator::Token(f) => Ok(f),
        SchemeValidator::Basic(_) => Err(ConfigError::ValidatorMismatch {
            name: name.to_string(),
            expected: "token",
        }),
    }
}

fn expect_basic(name: &str, validator: SchemeValidator) -> Result<BasicValidatorFn, ConfigError> {
    match validator {
        SchemeValidator::Basic(f) => Ok(f),
        SchemeValidator::Token(_) => Err(ConfigError::ValidatorMismatch {
            name: name.to_string(),
            expected: "basic",
        }),
    }
}

impl AutowiredSecurityConfig {
    /// Bind every declared scheme to its validator from `validators`.
    ///
    /// Unsupported kinds (`oauth2`, `openIdConnect`, ...) fail unless
    /// `allow_unrecognized_security` is set, in which case they are skipped
    /// with a warning. A declaration without a validator always fails.
    pub fn build_registry(
        &self,
        mut validators: BTreeMap<String, SchemeValidator>,
    ) -> Result<SchemeRegistry, ConfigError> {
        let mut registry = SchemeRegistry::new();

        for (name, declaration) in &self.security_schemes {
            let Some(validator) = validators.remove(name) else {
                return Err(ConfigError::MissingValidator { name: name.clone() });
            };
            match declaration.into_scheme(name, validator) {
                Ok(scheme) => {
                    debug!(security_scheme = %name, kind = scheme.kind.label(), "Registered security scheme.");
                    registry.insert(name.clone(), scheme);
                }
                Err(err @ ConfigError::UnsupportedSchemeKind { .. }) if self.allow_unrecognized_security => {
                    warn!(security_scheme = %name, error = %err, "Ignoring unsupported security scheme.");
                }
                Err(err) => return Err(err),
            }
        }

        for name in validators.keys() {
            warn!(security_scheme = %name, "Validator supplied for undeclared security scheme; ignoring.");
        }

        Ok(registry)
    }

    #[must_use]
    pub fn policy_options(&self) -> PolicyOptions {
        PolicyOptions {
            allow_unrecognized_security: self.allow_unrecognized_security,
            allow_empty_security_with_no_root: self.allow_empty_security_with_no_root,
            root_security: self.root_security.clone(),
        }
    }
}

impl PluginConfig {
    #[must_use]
    pub fn new(info: Info) -> Self {
        Self {
            openapi_info: Some(info),
            ..Self::default()
        }
    }

    /// Load from `path`. `.yaml`/`.yml` and `.toml` are recognised; anything
    /// else is read as JSON.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let config: PluginConfig = match extension {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "toml" => toml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };
        debug!(path = %path.display(), "Loaded plugin configuration.");
        Ok(config)
    }

    /// [`PluginConfig::load`] followed by [`PluginConfig::apply_env_overrides`].
    pub fn load_with_env(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `BRRTDOC_*` overrides. Security overrides create the
    /// `autowiredSecurity` section only if it already exists.
    pub fn apply_env_overrides(&mut self) {
        if let Some(on) = env_flag("BRRTDOC_EXIT_ON_INVALID_DOCUMENT") {
            self.exit_on_invalid_document = on;
        }
        if let Ok(path) = env::var("BRRTDOC_UI_PATH") {
            if !path.is_empty() {
                self.publish.ui_path = path;
            }
        }
        if let Some(security) = self.autowired_security.as_mut() {
            if let Some(on) = env_flag("BRRTDOC_ALLOW_UNRECOGNIZED_SECURITY") {
                security.allow_unrecognized_security = on;
            }
            if let Some(on) = env_flag("BRRTDOC_ALLOW_EMPTY_SECURITY_WITH_NO_ROOT") {
                security.allow_empty_security_with_no_root = on;
            }
        }
    }

    /// The document info, or [`ConfigError::MissingInfo`].
    pub fn info(&self) -> Result<&Info, ConfigError> {
        self.openapi_info.as_ref().ok_or(ConfigError::MissingInfo)
    }

    /// Security wiring that is present and not disabled.
    #[must_use]
    pub fn active_security(&self) -> Option<&AutowiredSecurityConfig> {
        self.autowired_security.as_ref().filter(|s| !s.disabled)
    }
}

fn env_flag(key: &str) -> Option<bool> {
    let raw = env::var(key).ok()?;
    match parse_flag(&raw) {
        Some(on) => Some(on),
        None => {
            warn!(variable = key, value = %raw, "Ignoring unparseable boolean environment variable.");
            None
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
