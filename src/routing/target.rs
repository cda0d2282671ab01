//! Per-request re-targeting.
//!
//! A route forwards to its default target unless a target table picks a
//! different upstream for the request's host (and optionally path).
//!
//! Table keys without a `/` compare against the Host header exactly; keys
//! with a `/` match when `host + originalUrl` contains them. Entries are
//! tried in declaration order and the first hit wins.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use url::Url;

use crate::config::ConfigError;
use crate::http::RequestView;

pub type TargetFn = dyn Fn(&RequestView<'_>) -> Option<Url> + Send + Sync;

#[derive(Clone)]
pub enum TargetTable {
    Table(Arc<[(String, Url)]>),
    Function(Arc<TargetFn>),
}

impl TargetTable {
    /// Build from a raw `{ "host[/path]": "http://target" }` object.
    pub fn from_value(value: Option<&Value>) -> Result<Option<Self>, ConfigError> {
        let table = match value {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Object(table)) => table,
            Some(other) => {
                return Err(ConfigError::InvalidRouter(format!(
                    "expected a table of host -> target, got {other}"
                )))
            }
        };

        let entries = table
            .iter()
            .map(|(key, target)| {
                let target = target.as_str().ok_or_else(|| {
                    ConfigError::InvalidRouter(format!("target for {key:?} must be a string"))
                })?;
                let url = parse_target(target)?;
                Ok((key.clone(), url))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Some(TargetTable::Table(entries.into())))
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&RequestView<'_>) -> Option<Url> + Send + Sync + 'static,
    {
        TargetTable::Function(Arc::new(f))
    }

    /// The target chosen for this request, if any.
    pub fn resolve(&self, req: &RequestView<'_>) -> Option<Url> {
        match self {
            TargetTable::Function(f) => f(req),
            TargetTable::Table(entries) => {
                let host = req.host().unwrap_or_default();
                let host_and_path = format!("{host}{}", req.original_url());
                entries
                    .iter()
                    .find(|(key, _)| {
                        if key.contains('/') {
                            host_and_path.contains(key.as_str())
                        } else {
                            key == host
                        }
                    })
                    .map(|(_, url)| url.clone())
            }
        }
    }
}

impl fmt::Debug for TargetTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetTable::Table(entries) => f.debug_tuple("Table").field(entries).finish(),
            TargetTable::Function(_) => f.write_str("Function(<fn>)"),
        }
    }
}

/// Parse an upstream URL; only absolute URLs with a host are accepted.
pub fn parse_target(target: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(target).map_err(|e| ConfigError::InvalidTarget {
        target: target.to_string(),
        reason: e.to_string(),
    })?;
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidTarget {
            target: target.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}
