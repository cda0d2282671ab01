//! Path rewriting before forwarding.
//!
//! # Responsibilities
//! - Compile an ordered `pattern -> replacement` table once per config
//! - Or wrap a user function `(path, request) -> new path`
//! - Apply it to the original URL (path and query) of a routed request
//!
//! # Design Decisions
//! - First matching rule wins; later rules are never consulted
//! - Only the first occurrence of the pattern is substituted
//! - No rewrite configured is `None`, not an error; any other malformed
//!   shape fails at construction

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::config::ConfigError;
use crate::http::RequestView;

/// User rewrite function.
pub type RewriteFn = dyn Fn(&str, &RequestView<'_>) -> String + Send + Sync;

/// One compiled table entry.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    matcher: Regex,
    replacement: String,
}

impl RewriteRule {
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, ConfigError> {
        let matcher = Regex::new(pattern)
            .map_err(|e| ConfigError::InvalidPathRewrite(format!("{pattern}: {e}")))?;
        Ok(Self {
            matcher,
            replacement: replacement.into(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.matcher.as_str()
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }
}

/// A reusable rewrite function.
#[derive(Clone)]
pub enum PathRewriter {
    Rules(Arc<[RewriteRule]>),
    Function(Arc<RewriteFn>),
}

impl PathRewriter {
    /// Compile an ordered table of `(pattern, replacement)` pairs.
    pub fn from_rules<I, K, V>(rules: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let compiled = rules
            .into_iter()
            .map(|(pattern, replacement)| RewriteRule::new(pattern.as_ref(), replacement))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PathRewriter::Rules(compiled.into()))
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str, &RequestView<'_>) -> String + Send + Sync + 'static,
    {
        PathRewriter::Function(Arc::new(f))
    }

    /// Compiled table entries, empty for function rewriters.
    pub fn rules(&self) -> &[RewriteRule] {
        match self {
            PathRewriter::Rules(rules) => rules,
            PathRewriter::Function(_) => &[],
        }
    }

    /// Produce the forwarded path for `path`.
    pub fn rewrite(&self, path: &str, req: &RequestView<'_>) -> String {
        match self {
            PathRewriter::Function(f) => f(path, req),
            PathRewriter::Rules(rules) => rules
                .iter()
                .find(|rule| rule.matcher.is_match(path))
                .map(|rule| {
                    rule.matcher
                        .replacen(path, 1, rule.replacement.as_str())
                        .into_owned()
                })
                .unwrap_or_else(|| path.to_string()),
        }
    }
}

impl fmt::Debug for PathRewriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathRewriter::Rules(rules) => f.debug_tuple("Rules").field(rules).finish(),
            PathRewriter::Function(_) => f.write_str("Function(<fn>)"),
        }
    }
}

/// Build a rewriter from a raw configuration value.
///
/// `None` and `null` mean "no rewriting configured" and yield `Ok(None)`.
/// An object becomes an ordered rule table (its values must be strings).
/// Any other shape is a [`ConfigError::InvalidPathRewrite`].
pub fn create_path_rewriter(config: Option<&Value>) -> Result<Option<PathRewriter>, ConfigError> {
    match config {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(table)) => {
            let rules = table
                .iter()
                .map(|(pattern, replacement)| match replacement {
                    Value::String(s) => Ok((pattern.as_str(), s.clone())),
                    other => Err(ConfigError::InvalidPathRewrite(format!(
                        "replacement for {pattern:?} must be a string, got {other}"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            PathRewriter::from_rules(rules).map(Some)
        }
        Some(other) => Err(ConfigError::InvalidPathRewrite(format!("unsupported value {other}"))),
    }
}
