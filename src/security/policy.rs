//! Security requirement resolution, compilation and evaluation.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::handlers::{build_handler, WrappedHandler};
use super::scheme::SchemeRegistry;
use super::{AuthDecision, DenyCode};
use crate::error::ConfigError;
use crate::request::SecurityRequest;
use crate::spec::SecurityRequirement;

/// A declared requirement: one clause, or a list of alternatives.
///
/// ```
/// use brrtdoc::security::SecurityDeclaration;
///
/// let single: SecurityDeclaration = serde_json::from_str(r#"{"ApiKey": []}"#).unwrap();
/// let any: SecurityDeclaration = serde_json::from_str(r#"[{"ApiKey": []}, {"Bearer": []}]"#).unwrap();
/// assert_eq!(single.clauses().len(), 1);
/// assert_eq!(any.clauses().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SecurityDeclaration {
    Single(SecurityRequirement),
    AnyOf(Vec<SecurityRequirement>),
}

impl SecurityDeclaration {
    /// Normalise to a list of OR'd clauses.
    #[must_use]
    pub fn clauses(&self) -> Vec<SecurityRequirement> {
        match self {
            SecurityDeclaration::Single(req) => vec![req.clone()],
            SecurityDeclaration::AnyOf(reqs) => reqs.clone(),
        }
    }

    /// Explicitly empty list: no security for the route.
    #[must_use]
    pub fn is_none_required(&self) -> bool {
        matches!(self, SecurityDeclaration::AnyOf(reqs) if reqs.is_empty())
    }
}

impl From<SecurityRequirement> for SecurityDeclaration {
    fn from(req: SecurityRequirement) -> Self {
        SecurityDeclaration::Single(req)
    }
}

impl From<Vec<SecurityRequirement>> for SecurityDeclaration {
    fn from(reqs: Vec<SecurityRequirement>) -> Self {
        SecurityDeclaration::AnyOf(reqs)
    }
}

/// Flags that govern compilation.
#[derive(Debug, Clone, Default)]
pub struct PolicyOptions {
    /// Warn about and skip scheme names missing from the registry instead of
    /// failing.
    pub allow_unrecognized_security: bool,
    /// Permit routes with no declared security when no root security exists.
    pub allow_empty_security_with_no_root: bool,
    /// Default requirement for routes that declare none.
    pub root_security: Option<SecurityDeclaration>,
}

/// Decide which clauses guard a route.
///
/// Returns `Ok(None)` when the route needs no check: it declared an empty
/// list, or neither it nor the root declares anything and that is allowed.
pub fn resolve_route_security(
    route_security: Option<&SecurityDeclaration>,
    options: &PolicyOptions,
    method: &str,
    url: &str,
) -> Result<Option<Vec<SecurityRequirement>>, ConfigError> {
    if route_security.is_some_and(SecurityDeclaration::is_none_required) {
        debug!(method, url, "Route security explicitly disabled; skipping.");
        return Ok(None);
    }

    match route_security.or(options.root_security.as_ref()) {
        Some(decl) => Ok(Some(decl.clauses())),
        None if options.allow_empty_security_with_no_root => {
            debug!(method, url, "No security defined at any level; skipping.");
            Ok(None)
        }
        None => Err(ConfigError::NoSecurity {
            method: method.to_string(),
            url: url.to_string(),
        }),
    }
}

struct CompiledClause {
    entries: Vec<(String, WrappedHandler)>,
}

/// OR-of-AND evaluator compiled from a list of clauses.
pub struct RequestEvaluator {
    clauses: Vec<CompiledClause>,
}

impl RequestEvaluator {
    /// Compile `clauses` against `registry`.
    ///
    /// Scopes are ignored. Unknown scheme names fail unless
    /// `allow_unrecognized_security` is set, in which case they are dropped
    /// from their clause.
    pub fn compile(
        clauses: &[SecurityRequirement],
        registry: &SchemeRegistry,
        options: &PolicyOptions,
    ) -> Result<Self, ConfigError> {
        let mut compiled = Vec::with_capacity(clauses.len());

        for clause in clauses {
            let mut entries = Vec::with_capacity(clause.len());
            for (name, _scopes) in clause.iter() {
                let Some(scheme) = registry.get(name) else {
                    warn!(security_scheme = name, "Unrecognized security scheme.");
                    if !options.allow_unrecognized_security {
                        return Err(ConfigError::UnknownScheme {
                            name: name.to_string(),
                        });
                    }
                    warn!(
                        security_scheme = name,
                        "Ignoring unrecognized security scheme; it must be enforced elsewhere."
                    );
                    continue;
                };
                entries.push((name.to_string(), build_handler(name, scheme)));
            }
            if entries.is_empty() && !clause.is_empty() {
                warn!(
                    security_clause = ?clause,
                    "Every scheme in this security clause was ignored; the clause allows all requests."
                );
            }
            compiled.push(CompiledClause { entries });
        }

        Ok(Self { clauses: compiled })
    }

    /// Evaluate the clauses against `req`.
    ///
    /// Clauses run in order and the first one whose entries all allow wins;
    /// later clauses are not run. Within a clause the first denial ends the
    /// clause. If every clause fails the result is `Forbidden` when any
    /// recorded denial was `Forbidden`, else `Unauthorized`. With no clauses
    /// at all the request is allowed.
    #[must_use]
    pub fn evaluate(&self, req: &SecurityRequest<'_>) -> AuthDecision {
        if self.clauses.is_empty() {
            return AuthDecision::Allow;
        }

        let mut failures: Vec<DenyCode> = Vec::new();

        for (group, clause) in self.clauses.iter().enumerate() {
            debug!(handler_group_index = group, "Checking security handler group.");
            let mut all_allowed = true;

            for (index, (name, handler)) in clause.entries.iter().enumerate() {
                match handler(req) {
                    AuthDecision::Allow => {}
                    AuthDecision::Deny(code) => {
                        debug!(
                            handler_group_index = group,
                            handler_index = index,
                            security_scheme = %name,
                            code = code.status(),
                            "Security scheme denied request."
                        );
                        failures.push(code);
                        all_allowed = false;
                        break;
                    }
                }
            }

            if all_allowed {
                debug!(handler_group_index = group, "Security handler group succeeded.");
                return AuthDecision::Allow;
            }
        }

        debug!("All security handlers failed for route.");
        if failures.contains(&DenyCode::Forbidden) {
            AuthDecision::Deny(DenyCode::Forbidden)
        } else {
            AuthDecision::Deny(DenyCode::Unauthorized)
        }
    }

    #[must_use]
    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }

    /// Scheme names per clause, after unknown names were dropped.
    #[must_use]
    pub fn scheme_names(&self) -> Vec<Vec<&str>> {
        self.clauses
            .iter()
            .map(|c| c.entries.iter().map(|(n, _)| n.as_str()).collect())
            .collect()
    }
}

impl fmt::Debug for RequestEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestEvaluator")
            .field("clauses", &self.scheme_names())
            .finish()
    }
}

/// Compiled evaluators shared by structurally equal requirements.
#[derive(Default)]
pub struct EvaluatorCache {
    entries: DashMap<String, Arc<RequestEvaluator>>,
}

impl EvaluatorCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached evaluator for `clauses`, compiling it on first use.
    ///
    /// Two concurrent first uses may both compile; the first insert wins and
    /// both callers receive equivalent evaluators.
    pub fn get_or_compile(
        &self,
        clauses: &[SecurityRequirement],
        registry: &SchemeRegistry,
        options: &PolicyOptions,
    ) -> Result<Arc<RequestEvaluator>, ConfigError> {
        let key = serde_json::to_string(clauses).unwrap_or_else(|_| format!("{clauses:?}"));
        if let Some(hit) = self.entries.get(&key) {
            return Ok(Arc::clone(hit.value()));
        }

        let compiled = Arc::new(RequestEvaluator::compile(clauses, registry, options)?);
        let entry = self.entries.entry(key).or_insert(compiled);
        Ok(Arc::clone(entry.value()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for EvaluatorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluatorCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}
