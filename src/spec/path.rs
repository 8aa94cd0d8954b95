//! Route template translation (`/pets/:id(\d+)` -> `/pets/{id}`).

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

/// `:name` optionally followed by a parenthesised regex body without nested `)`.
static PARAM_TOKEN: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r":([A-Za-z0-9_]+)(\([^)]+\))?").expect("valid path token regex")
});

/// Result of [`translate_path`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslatedPath {
    /// OpenAPI-style template with `{name}` placeholders.
    pub url: String,
    /// Placeholder names in order of appearance.
    pub params: Vec<String>,
    /// Inline regex constraints, parentheses stripped, keyed by parameter name.
    pub param_patterns: BTreeMap<String, String>,
}

/// Translate a framework route template into an OpenAPI path template.
///
/// ```
/// use brrtdoc::spec::translate_path;
///
/// let t = translate_path(r"/api/:apiVersion(v1|v2)/:resource/:id(\d+)-:status([a-z]+)");
/// assert_eq!(t.url, "/api/{apiVersion}/{resource}/{id}-{status}");
/// assert_eq!(t.param_patterns["id"], r"\d+");
/// assert!(!t.param_patterns.contains_key("resource"));
/// ```
#[must_use]
pub fn translate_path(template: &str) -> TranslatedPath {
    let mut params = Vec::new();
    let mut param_patterns = BTreeMap::new();

    let url = PARAM_TOKEN
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            if let Some(re) = caps.get(2) {
                let body = re.as_str();
                param_patterns.insert(name.to_string(), body[1..body.len() - 1].to_string());
            }
            params.push(name.to_string());
            format!("{{{name}}}")
        })
        .into_owned();

    TranslatedPath {
        url,
        params,
        param_patterns,
    }
}
