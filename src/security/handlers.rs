//! Per-kind adapters from a [`SecurityScheme`] to a request check.
//!
//! Each adapter extracts the credential, applies the missing-credential rule,
//! invokes the scheme's evaluator and contains any failure: an `Err` or a
//! panic from the evaluator becomes a 401.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{trace, warn};

use super::scheme::{
    BasicCredentials, BasicValidatorFn, SchemeKind, SchemeOptions, SecurityContext, SecurityScheme,
    TokenValidatorFn,
};
use super::AuthDecision;
use crate::request::SecurityRequest;
use crate::spec::ApiKeyLocation;

/// A compiled check for one named scheme.
pub type WrappedHandler = Arc<dyn Fn(&SecurityRequest<'_>) -> AuthDecision + Send + Sync>;

/// Build the request check for `scheme`, registered as `scheme_name`.
#[must_use]
pub fn build_handler(scheme_name: &str, scheme: &SecurityScheme) -> WrappedHandler {
    let scheme_name: Arc<str> = Arc::from(scheme_name);
    match &scheme.kind {
        SchemeKind::ApiKey {
            name,
            location,
            validator,
        } => build_api_key_handler(scheme_name, name, *location, Arc::clone(validator), scheme.options),
        SchemeKind::HttpBasic { validator } => {
            build_http_basic_handler(scheme_name, Arc::clone(validator), scheme.options)
        }
        SchemeKind::HttpBearer { validator, .. } => {
            build_http_bearer_handler(scheme_name, Arc::clone(validator), scheme.options)
        }
    }
}

fn build_api_key_handler(
    scheme_name: Arc<str>,
    name: &str,
    location: ApiKeyLocation,
    validator: TokenValidatorFn,
    options: SchemeOptions,
) -> WrappedHandler {
    let key_name = match location {
        ApiKeyLocation::Cookie => name.to_lowercase(),
        ApiKeyLocation::Header | ApiKeyLocation::Query => name.to_string(),
    };
    Arc::new(move |req: &SecurityRequest<'_>| {
        guarded(&scheme_name, || {
            trace!(scheme = %scheme_name, "Entering API key handler.");
            let ctx = context_for(options, req);
            let value = match location {
                ApiKeyLocation::Header => req.get_header(&key_name),
                ApiKeyLocation::Cookie => req.get_cookie(&key_name),
                ApiKeyLocation::Query => req.get_query(&key_name),
            };
            match value {
                Some(v) => validator(Some(v), req, ctx.as_ref()),
                None if options.pass_null_if_none_provided => validator(None, req, ctx.as_ref()),
                None => Ok(AuthDecision::unauthorized()),
            }
        })
    })
}

fn build_http_basic_handler(
    scheme_name: Arc<str>,
    validator: BasicValidatorFn,
    options: SchemeOptions,
) -> WrappedHandler {
    Arc::new(move |req: &SecurityRequest<'_>| {
        guarded(&scheme_name, || {
            let ctx = context_for(options, req);
            let Some(header) = req.get_header("authorization").filter(|h| !h.is_empty()) else {
                return if options.pass_null_if_none_provided {
                    validator(None, req, ctx.as_ref())
                } else {
                    Ok(AuthDecision::unauthorized())
                };
            };
            // A malformed header is never "no credential supplied".
            match decode_basic_auth_header(header) {
                Some(credentials) => validator(Some(&credentials), req, ctx.as_ref()),
                None => Ok(AuthDecision::unauthorized()),
            }
        })
    })
}

fn build_http_bearer_handler(
    scheme_name: Arc<str>,
    validator: TokenValidatorFn,
    options: SchemeOptions,
) -> WrappedHandler {
    Arc::new(move |req: &SecurityRequest<'_>| {
        guarded(&scheme_name, || {
            let ctx = context_for(options, req);
            match req
                .get_header("authorization")
                .and_then(|h| h.strip_prefix("Bearer "))
            {
                Some(token) => validator(Some(token), req, ctx.as_ref()),
                None if options.pass_null_if_none_provided => validator(None, req, ctx.as_ref()),
                None => Ok(AuthDecision::unauthorized()),
            }
        })
    })
}

fn context_for<'a>(options: SchemeOptions, req: &SecurityRequest<'a>) -> Option<SecurityContext<'a>> {
    options
        .requires_parsed_body
        .then_some(SecurityContext { body: req.body })
}

/// Decode `Basic <base64(user:pass)>`. Splits on the first `:`; both halves
/// must be non-empty.
#[must_use]
pub fn decode_basic_auth_header(header: &str) -> Option<BasicCredentials> {
    let encoded = header.strip_prefix("Basic ")?.trim();
    let bytes = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    let (username, password) = decoded.split_once(':')?;
    if username.is_empty() || password.is_empty() {
        return None;
    }
    Some(BasicCredentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

fn guarded<F>(scheme_name: &str, f: F) -> AuthDecision
where
    F: FnOnce() -> anyhow::Result<AuthDecision>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(decision)) => decision,
        Ok(Err(err)) => {
            warn!(scheme = scheme_name, error = %err, "Uncaught error in security handler.");
            AuthDecision::unauthorized()
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(scheme = scheme_name, panic = %message, "Security handler panicked.");
            AuthDecision::unauthorized()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestParts;
    use crate::security::DenyCode;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn basic(user_pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(user_pass))
    }

    #[test]
    fn test_decode_basic_auth_header() {
        let c = decode_basic_auth_header(&basic("alice:s3:cr3t")).unwrap();
        assert_eq!(c.username, "alice");
        assert_eq!(c.password, "s3:cr3t");

        assert!(decode_basic_auth_header(&basic("alice:")).is_none());
        assert!(decode_basic_auth_header(&basic(":pw")).is_none());
        assert!(decode_basic_auth_header(&basic("nocolon")).is_none());
        assert!(decode_basic_auth_header("Basic !!!not-base64").is_none());
        assert!(decode_basic_auth_header("Bearer abc").is_none());
    }

    #[test]
    fn test_api_key_header_lookup_is_case_insensitive() {
        let scheme = SecurityScheme::api_key("X-Api-Key", ApiKeyLocation::Header, |v, _, _| {
            Ok(if v == Some("test") { AuthDecision::Allow } else { AuthDecision::unauthorized() })
        });
        let handler = build_handler("key", &scheme);

        let ok = RequestParts::new("GET", "/").header("x-api-key", "test");
        assert_eq!(handler(&ok.as_security_request()), AuthDecision::Allow);

        let missing = RequestParts::new("GET", "/");
        assert_eq!(handler(&missing.as_security_request()), AuthDecision::Deny(DenyCode::Unauthorized));
    }

    #[test]
    fn test_api_key_cookie_uses_lowercased_name() {
        let scheme = SecurityScheme::api_key("Session", ApiKeyLocation::Cookie, |v, _, _| {
            Ok(if v == Some("c1") { AuthDecision::Allow } else { AuthDecision::forbidden() })
        });
        let handler = build_handler("cookie", &scheme);
        let req = RequestParts::new("GET", "/").header("cookie", "session=c1");
        assert_eq!(handler(&req.as_security_request()), AuthDecision::Allow);
    }

    #[test]
    fn test_api_key_query() {
        let scheme = SecurityScheme::api_key("api_key", ApiKeyLocation::Query, |v, _, _| {
            Ok(if v == Some("q") { AuthDecision::Allow } else { AuthDecision::unauthorized() })
        });
        let handler = build_handler("query", &scheme);
        let req = RequestParts::new("GET", "/pets?api_key=q");
        assert_eq!(handler(&req.as_security_request()), AuthDecision::Allow);
    }

    #[test]
    fn test_pass_null_invokes_validator_with_none() {
        let scheme = SecurityScheme::http_bearer(|token, _, _| {
            Ok(if token.is_none() { AuthDecision::Allow } else { AuthDecision::forbidden() })
        })
        .pass_null_if_none_provided(true);
        let handler = build_handler("bearer", &scheme);

        let none = RequestParts::new("GET", "/");
        assert_eq!(handler(&none.as_security_request()), AuthDecision::Allow);

        // Wrong prefix counts as absent for bearer.
        let basic_header = RequestParts::new("GET", "/").header("authorization", "Basic abc");
        assert_eq!(handler(&basic_header.as_security_request()), AuthDecision::Allow);

        let token = RequestParts::new("GET", "/").header("authorization", "Bearer abc");
        assert_eq!(handler(&token.as_security_request()), AuthDecision::forbidden());
    }

    #[test]
    fn test_malformed_basic_is_401_even_when_passing_null() {
        let called = Arc::new(AtomicBool::new(false));
        let seen = Arc::clone(&called);
        let scheme = SecurityScheme::http_basic(move |_, _, _| {
            seen.store(true, Ordering::SeqCst);
            Ok(AuthDecision::Allow)
        })
        .pass_null_if_none_provided(true);
        let handler = build_handler("basic", &scheme);

        let req = RequestParts::new("GET", "/").header("authorization", basic("user:"));
        assert_eq!(handler(&req.as_security_request()), AuthDecision::unauthorized());
        assert!(!called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_empty_basic_header_counts_as_absent() {
        let called = Arc::new(AtomicBool::new(false));
        let seen = Arc::clone(&called);
        let scheme = SecurityScheme::http_basic(move |creds, _, _| {
            seen.store(true, Ordering::SeqCst);
            Ok(if creds.is_none() { AuthDecision::Allow } else { AuthDecision::forbidden() })
        })
        .pass_null_if_none_provided(true);
        let handler = build_handler("basic", &scheme);

        let req = RequestParts::new("GET", "/").header("authorization", "");
        assert_eq!(handler(&req.as_security_request()), AuthDecision::Allow);
        assert!(called.load(Ordering::SeqCst));

        let strict = build_handler("basic", &SecurityScheme::http_basic(|_, _, _| Ok(AuthDecision::Allow)));
        assert_eq!(strict(&req.as_security_request()), AuthDecision::unauthorized());
    }

    #[test]
    fn test_context_carries_body_only_when_requested() {
        let scheme = SecurityScheme::http_bearer(|_, _, ctx| {
            let body = ctx.and_then(|c| c.body).cloned();
            Ok(if body == Some(json!({ "tenant": "a" })) {
                AuthDecision::Allow
            } else {
                AuthDecision::forbidden()
            })
        });
        let req = RequestParts::new("POST", "/")
            .header("authorization", "Bearer t")
            .body(json!({ "tenant": "a" }));

        let without = build_handler("b", &scheme);
        assert_eq!(without(&req.as_security_request()), AuthDecision::forbidden());

        let with = build_handler("b", &scheme.clone().requires_parsed_body(true));
        assert_eq!(with(&req.as_security_request()), AuthDecision::Allow);
    }

    #[test]
    fn test_errors_and_panics_become_401() {
        let failing = SecurityScheme::http_bearer(|_, _, _| Err(anyhow::anyhow!("backend down")));
        let panicking = SecurityScheme::http_bearer(|_, _, _| panic!("boom"));
        let req = RequestParts::new("GET", "/").header("authorization", "Bearer t");

        assert_eq!(
            build_handler("f", &failing)(&req.as_security_request()),
            AuthDecision::unauthorized()
        );
        assert_eq!(
            build_handler("p", &panicking)(&req.as_security_request()),
            AuthDecision::unauthorized()
        );
    }
}
