//! Single-pattern evaluation.
//!
//! # Responsibilities
//! - Classify a pattern as a literal path prefix or a glob
//! - Compile globs once (`**` spans segments, `*` stays inside one)
//! - A trailing `/**` also covers the bare prefix (`/api/**` matches `/api`)
//! - Test a request path against one compiled pattern
//!
//! # Design Decisions
//! - Query strings and fragments are stripped before any test
//! - Literal prefixes only match on a path-segment boundary
//! - A leading `!` marks a negated glob; the pattern itself still stores
//!   the positive glob and the caller decides what negation means

use std::str::FromStr;

use axum::http::Uri;
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};

use crate::config::ConfigError;

/// Returns true if `pattern` must be evaluated with glob semantics.
pub fn is_glob(pattern: &str) -> bool {
    pattern.starts_with('!') || pattern.contains('*')
}

/// Cuts the query string and fragment off a path.
pub fn strip_query(path: &str) -> &str {
    match path.find(['?', '#']) {
        Some(idx) => &path[..idx],
        None => path,
    }
}

/// Extracts the pathname of an absolute URL or an origin-form request target.
pub fn url_path(uri: &str) -> String {
    match Uri::from_str(uri) {
        Ok(parsed) if parsed.scheme().is_some() || uri.starts_with('/') => parsed.path().to_string(),
        _ => strip_query(uri).to_string(),
    }
}

/// A compiled context pattern.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Path-segment prefix test.
    Prefix(String),
    /// Glob test; `negated` records a leading `!` in the source.
    Glob {
        source: String,
        matcher: GlobSet,
        negated: bool,
    },
}

impl Pattern {
    /// Compile a single pattern.
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        if !is_glob(source) {
            return Ok(Pattern::Prefix(source.to_string()));
        }

        let (negated, glob) = match source.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, source),
        };

        let invalid = |e: globset::Error| ConfigError::InvalidContext(format!("{source}: {e}"));

        let mut set = GlobSetBuilder::new();
        set.add(compile_glob(glob).map_err(invalid)?);
        if let Some(base) = glob.strip_suffix("/**").filter(|base| !base.is_empty()) {
            set.add(compile_glob(base).map_err(invalid)?);
        }
        let matcher = set.build().map_err(invalid)?;

        Ok(Pattern::Glob {
            source: source.to_string(),
            matcher,
            negated,
        })
    }

    /// The pattern as written in configuration.
    pub fn source(&self) -> &str {
        match self {
            Pattern::Prefix(prefix) => prefix,
            Pattern::Glob { source, .. } => source,
        }
    }

    pub fn is_glob(&self) -> bool {
        matches!(self, Pattern::Glob { .. })
    }

    pub fn is_negated(&self) -> bool {
        matches!(self, Pattern::Glob { negated: true, .. })
    }

    /// Tests the path against the pattern, ignoring any negation flag.
    pub fn is_match(&self, path: &str) -> bool {
        let path = strip_query(path);
        match self {
            Pattern::Prefix(prefix) => matches_prefix(prefix, path),
            Pattern::Glob { matcher, .. } => matcher.is_match(path),
        }
    }
}

/// Tests one raw pattern against a path.
///
/// A negated glob (`!**/*.html`) is true when the underlying glob does NOT
/// match. Patterns that fail to compile never match.
pub fn match_one(pattern: &str, path: &str) -> bool {
    match Pattern::parse(pattern) {
        Ok(compiled) => compiled.is_match(path) != compiled.is_negated(),
        Err(e) => {
            tracing::warn!(
                pattern,
                error = %e,
                "failed to compile context glob; treating as non-match"
            );
            false
        }
    }
}

fn compile_glob(glob: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(glob).literal_separator(true).build()
}

/// Path-segment prefix test; `""` and `"/"` cover every path.
pub(crate) fn matches_prefix(prefix: &str, path: &str) -> bool {
    if prefix.is_empty() || prefix == "/" {
        return true;
    }
    if !prefix.starts_with('/') {
        return false;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => prefix.ends_with('/') || rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
