//! Context matching: does a proxying rule apply to this request?
//!
//! # Responsibilities
//! - Validate a raw context value once, at configuration time
//! - Classify it as a literal path, a pattern set, or a predicate
//! - Evaluate it against a request URI with OR / AND-NOT semantics
//!
//! # Design Decisions
//! - Mixed literal/glob arrays are rejected at construction, so the hot
//!   path never re-validates
//! - A set with negated entries means "positives (or everything) except
//!   the negated globs"
//! - Predicates return anything [`Truthy`]; the coercion table is explicit

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use crate::config::ConfigError;
use crate::http::RequestView;
use crate::routing::pattern::{self, Pattern};

/// Boolean coercion for predicate results.
///
/// | type | truthy when |
/// |---|---|
/// | `bool` | `true` |
/// | `&str` / `String` | non-empty |
/// | integers | non-zero |
/// | floats | non-zero and not NaN |
/// | `Option<T>` | `Some(v)` and `v` is truthy |
/// | `()` | never |
pub trait Truthy {
    fn is_truthy(&self) -> bool;
}

impl Truthy for bool {
    fn is_truthy(&self) -> bool {
        *self
    }
}

impl Truthy for &str {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for String {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for () {
    fn is_truthy(&self) -> bool {
        false
    }
}

impl<T: Truthy> Truthy for Option<T> {
    fn is_truthy(&self) -> bool {
        self.as_ref().is_some_and(Truthy::is_truthy)
    }
}

macro_rules! truthy_int {
    ($($t:ty),*) => {
        $(impl Truthy for $t {
            fn is_truthy(&self) -> bool {
                *self != 0
            }
        })*
    };
}

truthy_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl Truthy for f32 {
    fn is_truthy(&self) -> bool {
        *self != 0.0 && !self.is_nan()
    }
}

impl Truthy for f64 {
    fn is_truthy(&self) -> bool {
        *self != 0.0 && !self.is_nan()
    }
}

/// Predicate invoked with `(pathname, request)`.
pub type PredicateFn = dyn Fn(&str, &RequestView<'_>) -> bool + Send + Sync;

/// Compiled array context, split by polarity.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    positive: Vec<Pattern>,
    negated: Vec<Pattern>,
}

impl PatternSet {
    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.negated.is_empty()
    }

    fn is_match(&self, path: &str) -> bool {
        if self.negated.is_empty() {
            return self.positive.iter().any(|p| p.is_match(path));
        }
        let included = self.positive.is_empty() || self.positive.iter().any(|p| p.is_match(path));
        included && !self.negated.iter().any(|p| p.is_match(path))
    }
}

/// Where a proxying rule applies.
#[derive(Clone)]
pub enum ContextSpec {
    /// Single path-segment prefix (`""` and `"/"` match everything).
    Literal(String),
    /// One or more patterns of a single kind: all literal or all glob.
    GlobSet(PatternSet),
    /// User function deciding per request.
    Predicate(Arc<PredicateFn>),
}

impl ContextSpec {
    /// Build a context from a raw configuration value.
    ///
    /// Accepts a string or an array of strings; everything else is rejected.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::String(s) => s.parse(),
            Value::Array(items) => {
                let patterns = items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s.as_str()),
                        other => Err(ConfigError::InvalidContext(format!(
                            "array entries must be strings, got {other}"
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Self::from_patterns(patterns)
            }
            other => Err(ConfigError::InvalidContext(format!("unsupported value {other}"))),
        }
    }

    /// Build a set from a list of patterns, enforcing homogeneity.
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compiled = patterns
            .into_iter()
            .map(|p| Pattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let globs = compiled.iter().filter(|p| p.is_glob()).count();
        if globs != 0 && globs != compiled.len() {
            let listed = compiled.iter().map(Pattern::source).collect::<Vec<_>>();
            return Err(ConfigError::InvalidContext(format!(
                "cannot mix plain paths and glob patterns: {listed:?}"
            )));
        }

        let (negated, positive) = compiled.into_iter().partition(Pattern::is_negated);
        Ok(ContextSpec::GlobSet(PatternSet { positive, negated }))
    }

    /// Wrap a user predicate; its result is coerced through [`Truthy`].
    pub fn predicate<F, R>(f: F) -> Self
    where
        F: Fn(&str, &RequestView<'_>) -> R + Send + Sync + 'static,
        R: Truthy,
    {
        ContextSpec::Predicate(Arc::new(move |path: &str, req: &RequestView<'_>| {
            f(path, req).is_truthy()
        }))
    }

    /// Decide whether a request URI falls under this context.
    pub fn matches(&self, uri: &str, req: &RequestView<'_>) -> bool {
        let path = pattern::url_path(uri);
        match self {
            ContextSpec::Literal(prefix) => pattern::matches_prefix(prefix, &path),
            ContextSpec::GlobSet(set) => set.is_match(&path),
            ContextSpec::Predicate(f) => f(&path, req),
        }
    }
}

impl Default for ContextSpec {
    fn default() -> Self {
        ContextSpec::Literal("/".to_string())
    }
}

impl FromStr for ContextSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if pattern::is_glob(s) {
            Self::from_patterns([s])
        } else {
            Ok(ContextSpec::Literal(s.to_string()))
        }
    }
}

impl fmt::Debug for ContextSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextSpec::Literal(p) => f.debug_tuple("Literal").field(p).finish(),
            ContextSpec::GlobSet(set) => f.debug_tuple("GlobSet").field(set).finish(),
            ContextSpec::Predicate(_) => f.write_str("Predicate(<fn>)"),
        }
    }
}

impl fmt::Display for ContextSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextSpec::Literal(p) => write!(f, "{p:?}"),
            ContextSpec::GlobSet(set) => {
                let all = set.positive.iter().chain(&set.negated).map(Pattern::source);
                f.debug_list().entries(all).finish()
            }
            ContextSpec::Predicate(_) => f.write_str("[Function]"),
        }
    }
}

/// Validate a raw context and evaluate it in one step.
pub fn match_context(context: &Value, uri: &str, req: &RequestView<'_>) -> Result<bool, ConfigError> {
    let spec = ContextSpec::from_value(context)?;
    Ok(spec.matches(uri, req))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;

    const URL: &str = "http://localhost/api/foo/bar";

    fn fake_request() -> Request<Body> {
        Request::builder().uri("/").body(Body::empty()).unwrap()
    }

    fn check(context: Value, uri: &str) -> bool {
        let req = fake_request();
        match_context(&context, uri, &RequestView::from_request(&req)).unwrap()
    }

    #[test]
    fn test_single_path() {
        assert!(check(json!(""), URL));
        assert!(check(json!("/"), URL));
        assert!(check(json!("/api"), URL));
        assert!(!check(json!("/abc"), URL));
        assert!(!check(json!("/foo"), URL));
        assert!(!check(json!("api"), URL));
    }

    #[test]
    fn test_multi_path() {
        assert!(check(json!(["/api"]), URL));
        assert!(check(json!(["/api", "/ajax"]), "http://localhost/ajax/foo/bar"));
        assert!(!check(json!(["/api", "/ajax"]), "http://localhost/foo/bar"));
        assert!(!check(json!([]), URL));
    }

    #[test]
    fn test_multi_glob() {
        let pattern = json!(["/api/**", "/ajax/**"]);
        assert!(check(pattern.clone(), "http://localhost/api/foo/bar.json"));
        assert!(check(pattern.clone(), "http://localhost/ajax/foo/bar.json"));
        assert!(!check(pattern, "http://localhost/rest/foo/bar.json"));

        let pattern = json!(["/**/*.html", "/**/*.jpeg"]);
        assert!(check(pattern.clone(), "http://localhost/api/foo/bar.html"));
        assert!(check(pattern.clone(), "http://localhost/api/foo/bar.jpeg"));
        assert!(!check(pattern, "http://localhost/api/foo/bar.gif"));
    }

    #[test]
    fn test_negation() {
        let url = "http://localhost/api/foo/bar.html";
        assert!(!check(json!(["**", "!**/*.html"]), url));
        assert!(check(json!(["**", "!**/*.json"]), url));
        assert!(!check(json!("!**/*.html"), url));
        assert!(check(json!(["!**/*.json", "!**/*.php"]), url));
        assert!(!check(json!(["!**/*.json", "!**/*.html"]), url));
    }

    #[test]
    fn test_negated_globstar_rejects_bare_prefix() {
        assert!(check(json!("/api/**"), "http://localhost/api"));
        assert!(!check(json!(["**", "!/api/**"]), "http://localhost/api"));
        assert!(!check(json!(["**", "!/api/**"]), "http://localhost/api/foo"));
        assert!(check(json!(["**", "!/api/**"]), "http://localhost/rest"));
    }

    #[test]
    fn test_negation_order_is_irrelevant() {
        let url = "http://localhost/api/foo/bar.html";
        assert_eq!(
            check(json!(["!**/*.html", "**"]), url),
            check(json!(["**", "!**/*.html"]), url)
        );
    }

    #[test]
    fn test_predicate_truthiness() {
        fn run<R: Truthy>(value: R) -> bool
        where
            R: Clone + Send + Sync + 'static,
        {
            let spec = ContextSpec::predicate(move |_path: &str, _req: &RequestView<'_>| value.clone());
            let req = fake_request();
            spec.matches(URL, &RequestView::from_request(&req))
        }

        assert!(run(true));
        assert!(run("true"));
        assert!(run(String::from("x")));
        assert!(run(1));
        assert!(run(Some(true)));

        assert!(!run(false));
        assert!(!run(""));
        assert!(!run(0));
        assert!(!run(f64::NAN));
        assert!(!run(None::<bool>));
        assert!(!run(()));
    }

    #[test]
    fn test_predicate_receives_pathname() {
        let spec = ContextSpec::predicate(|path: &str, req: &RequestView<'_>| {
            path == "/api/foo/bar" && req.method() == "GET"
        });
        let req = fake_request();
        assert!(spec.matches("http://localhost/api/foo/bar?x=1", &RequestView::from_request(&req)));
    }

    #[test]
    fn test_invalid_contexts() {
        let req = fake_request();
        let view = RequestView::from_request(&req);
        for bad in [
            json!(null),
            json!({}),
            json!(123),
            json!(true),
            json!(["/api", 1]),
            json!(["/api", "!*.html"]),
            json!(["/api", "/**"]),
        ] {
            assert!(
                match_context(&bad, URL, &view).is_err(),
                "expected {bad} to be rejected"
            );
        }
    }

    #[test]
    fn test_valid_contexts() {
        let req = fake_request();
        let view = RequestView::from_request(&req);
        for good in [json!("/123"), json!(["/123"]), json!("/**"), json!(["/**", "!*.html"])] {
            assert!(match_context(&good, URL, &view).is_ok(), "expected {good} to be accepted");
        }
    }
}
