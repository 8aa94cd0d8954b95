//! Error types.
//!
//! Configuration and schema-graph errors abort startup. Authorization
//! failures are never errors; they are [`crate::security::AuthDecision`]
//! values.

use thiserror::Error;

use crate::validator::ValidationIssue;

/// Problems with plugin configuration, scheme declarations or a route's
/// security requirement. Raised at build or registration time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("openapi_info is required")]
    MissingInfo,

    #[error("security scheme '{name}' has unsupported kind '{kind}'; use http bearer or apiKey instead")]
    UnsupportedSchemeKind { name: String, kind: String },

    #[error("security scheme '{name}': apiKey requires 'in' to be header, cookie or query (got '{location}')")]
    InvalidApiKeyLocation { name: String, location: String },

    #[error("security scheme '{name}': apiKey requires a 'name'")]
    MissingApiKeyName { name: String },

    #[error("security scheme '{name}' expects a {expected} validator")]
    ValidatorMismatch { name: String, expected: &'static str },

    #[error("security scheme '{name}' is declared but no validator was registered for it")]
    MissingValidator { name: String },

    #[error("security scheme '{name}' not defined")]
    UnknownScheme { name: String },

    #[error("route {method} {url} has no security defined and no root security is configured; set allow_empty_security_with_no_root to permit this")]
    NoSecurity { method: String, url: String },
}

/// Fatal problems found while canonicalising tagged schemas.
#[derive(Debug, Error)]
pub enum SchemaGraphError {
    #[error("all schemas must be tagged with a non-empty name")]
    EmptyName,

    #[error("schema '{name}' is reachable from itself")]
    Cycle { name: String },

    #[error("duplicate schemas found with tag '{name}':\n\n{existing}\n\n{current}")]
    NameCollision {
        name: String,
        existing: String,
        current: String,
    },

    #[error("components.schemas already holds a different schema under '{name}'")]
    ComponentConflict { name: String },
}

/// Anything that can stop document assembly.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    SchemaGraph(#[from] SchemaGraphError),

    #[error("generated OpenAPI document is invalid ({} issue(s))", .0.len())]
    InvalidDocument(Vec<ValidationIssue>),

    #[error("failed to serialize document: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
