//! Request and response shapes exchanged with the host HTTP layer.
//!
//! The host owns parsing. It hands security hooks a [`RequestParts`]
//! (or anything it can borrow a [`SecurityRequest`] from) after the body has
//! been parsed, and receives a [`HandlerResponse`] when a request is denied.

use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum headers/cookies stored inline before spilling to the heap.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Maximum query parameters stored inline before spilling to the heap.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Header or cookie pairs. Names are `Arc<str>` so clones are cheap.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Query parameter pairs.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Parse a `Cookie` header value into name/value pairs.
#[must_use]
pub fn parse_cookies(header: &str) -> HeaderVec {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            let name = name.trim();
            (!name.is_empty()).then(|| (Arc::from(name), value.trim().to_string()))
        })
        .collect()
}

/// Parse the query string of `path` (everything after `?`), URL-decoding
/// names and values.
#[must_use]
pub fn parse_query_params(path: &str) -> ParamVec {
    match path.split_once('?') {
        Some((_, query)) => url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
            .collect(),
        None => ParamVec::new(),
    }
}

/// Owned request data a host can build once per request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParts {
    pub method: String,
    /// Path including any query string.
    pub path: String,
    pub headers: HeaderVec,
    pub cookies: HeaderVec,
    pub query: ParamVec,
    /// Parsed body, when the host has one.
    pub body: Option<Value>,
}

impl RequestParts {
    /// Start from a method and a path; the query string is parsed eagerly.
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        let query = parse_query_params(&path);
        Self {
            method: method.into(),
            path,
            query,
            ..Self::default()
        }
    }

    /// Add a header. A `cookie` header also populates the cookie jar.
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if name.eq_ignore_ascii_case("cookie") {
            self.cookies.extend(parse_cookies(&value));
        }
        self.headers.push((Arc::from(name.to_ascii_lowercase()), value));
        self
    }

    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Copy method, URI, headers and cookies from an `http::Request`.
    /// Header values that are not visible ASCII are skipped.
    #[must_use]
    pub fn from_http<B>(req: &http::Request<B>, body: Option<Value>) -> Self {
        let mut parts = Self::new(req.method().as_str(), req.uri().to_string());
        for (name, value) in req.headers() {
            if let Ok(v) = value.to_str() {
                parts = parts.header(name.as_str(), v);
            }
        }
        parts.body = body;
        parts
    }

    #[must_use]
    pub fn as_security_request(&self) -> SecurityRequest<'_> {
        SecurityRequest {
            headers: &self.headers,
            query: &self.query,
            cookies: &self.cookies,
            body: self.body.as_ref(),
        }
    }
}

/// Borrowed view of a request handed to security evaluators.
#[derive(Debug, Clone, Copy)]
pub struct SecurityRequest<'a> {
    pub headers: &'a HeaderVec,
    pub query: &'a ParamVec,
    pub cookies: &'a HeaderVec,
    /// Parsed body. Only passed on to evaluators that ask for it.
    pub body: Option<&'a Value>,
}

impl<'a> SecurityRequest<'a> {
    /// Get a header by name (case-insensitive). First occurrence wins.
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by exact name. Last occurrence wins.
    #[inline]
    #[must_use]
    pub fn get_query(&self, name: &str) -> Option<&'a str> {
        self.query
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a cookie by exact name.
    #[inline]
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&'a str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Response a hook returns to short-circuit a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerResponse {
    pub status: u16,
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    pub body: Value,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// JSON response with a `content-type` header.
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self {
            status,
            headers,
            body,
        }
    }

    /// `{"error": message}` with `status`.
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }))
    }

    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_cookies() {
        let jar = parse_cookies("session=abc; theme = dark ;flag;=orphan");
        let names: Vec<&str> = jar.iter().map(|(k, _)| k.as_ref()).collect();
        assert_eq!(names, vec!["session", "theme", "flag"]);
        assert_eq!(jar[1].1, "dark");
        assert_eq!(jar[2].1, "");
    }

    #[test]
    fn test_parse_query_params_decodes() {
        let q = parse_query_params("/items?name=a%20b&limit=10&limit=20");
        assert_eq!(q.len(), 3);
        assert_eq!(q[0].1, "a b");
        assert!(parse_query_params("/items").is_empty());
    }

    #[test]
    fn test_security_request_lookups() {
        let parts = RequestParts::new("GET", "/pets?api_key=q1")
            .header("X-API-KEY", "h1")
            .header("Cookie", "Session=c1");
        let req = parts.as_security_request();
        assert_eq!(req.get_header("x-api-key"), Some("h1"));
        assert_eq!(req.get_query("api_key"), Some("q1"));
        assert_eq!(req.get_cookie("Session"), Some("c1"));
        assert_eq!(req.get_cookie("session"), None);
        assert!(req.body.is_none());
    }

    #[test]
    fn test_from_http_request() {
        let req = http::Request::builder()
            .method("POST")
            .uri("/pets?x=1")
            .header("authorization", "Bearer t")
            .body(())
            .unwrap();
        let parts = RequestParts::from_http(&req, Some(json!({ "a": 1 })));
        assert_eq!(parts.method, "POST");
        assert_eq!(parts.as_security_request().get_header("Authorization"), Some("Bearer t"));
        assert_eq!(parts.as_security_request().get_query("x"), Some("1"));
        assert_eq!(parts.body, Some(json!({ "a": 1 })));
    }

    #[test]
    fn test_error_response() {
        let r = HandlerResponse::error(403, "Forbidden");
        assert_eq!(r.status, 403);
        assert_eq!(r.body, json!({ "error": "Forbidden" }));
        assert_eq!(r.get_header("Content-Type"), Some("application/json"));
    }
}
