//! Ordered prefix → origin routing table for the development proxy.
//!
//! Matching is plain string-prefix in declaration order: the first route whose
//! prefix starts the request path wins, so `/chat` also captures `/chats/...`
//! when it is declared first. Re-declaring a prefix replaces the target of the
//! existing route without moving it.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Replaces a leading path segment before forwarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rewrite {
    pub from: String,
    #[serde(default)]
    pub to: String,
}

/// A single proxy entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRoute {
    pub prefix: String,
    /// Origin such as `http://localhost:8080`, without a trailing slash.
    pub target: String,
    /// Send the target's authority as `Host` instead of the client's.
    pub change_origin: bool,
    pub rewrite: Option<Rewrite>,
}

impl ProxyRoute {
    pub fn new(prefix: impl Into<String>, target: impl Into<String>) -> Result<Self, ConfigError> {
        let prefix = prefix.into();
        let target = target.into();

        if !prefix.starts_with('/') {
            return Err(ConfigError::InvalidRoute {
                prefix,
                reason: "prefix must start with '/'".into(),
            });
        }
        if !(target.starts_with("http://") || target.starts_with("https://")) {
            return Err(ConfigError::InvalidRoute {
                prefix,
                reason: format!("target must be an http(s) origin, got {:?}", target),
            });
        }

        Ok(Self {
            prefix,
            target: target.trim_end_matches('/').to_string(),
            change_origin: false,
            rewrite: None,
        })
    }

    pub fn with_change_origin(mut self, enabled: bool) -> Self {
        self.change_origin = enabled;
        self
    }

    pub fn with_rewrite(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rewrite = Some(Rewrite {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }

    /// Authority part of the target (`host[:port]`).
    pub fn target_authority(&self) -> &str {
        let rest = self
            .target
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.target);
        rest.split('/').next().unwrap_or(rest)
    }

    /// Builds the upstream URL for a request's path and query.
    pub fn upstream_uri(&self, path_and_query: &str) -> String {
        let (path, query) = match path_and_query.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path_and_query, None),
        };

        let mut path = match &self.rewrite {
            Some(rw) if path.starts_with(&rw.from) => format!("{}{}", rw.to, &path[rw.from.len()..]),
            _ => path.to_string(),
        };
        if !path.starts_with('/') {
            path.insert(0, '/');
        }

        match query {
            Some(q) => format!("{}{}?{}", self.target, path, q),
            None => format!("{}{}", self.target, path),
        }
    }
}

impl fmt::Display for ProxyRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.prefix, self.target)?;
        if self.change_origin {
            write!(f, " (changeOrigin)")?;
        }
        if let Some(rw) = &self.rewrite {
            write!(f, " (rewrite {} => {})", rw.from, rw.to)?;
        }
        Ok(())
    }
}

/// Ordered set of proxy routes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyTable {
    routes: Vec<ProxyRoute>,
}

impl ProxyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table served by the development proxy when no file is configured.
    pub fn default_table() -> Self {
        let mut table = Self::new();
        for (prefix, target) in [
            ("/chat", "http://localhost:8000"),
            ("/documents", "http://localhost:8080"),
            ("/chats", "http://localhost:8080"),
        ] {
            if let Ok(route) = ProxyRoute::new(prefix, target) {
                table.insert(route);
            }
        }
        table
    }

    /// Loads a table from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Appends a route, or replaces the target of an existing route with the
    /// same prefix while keeping its position.
    pub fn insert(&mut self, route: ProxyRoute) {
        match self.routes.iter_mut().find(|r| r.prefix == route.prefix) {
            Some(existing) => *existing = route,
            None => self.routes.push(route),
        }
    }

    pub fn routes(&self) -> &[ProxyRoute] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// First route, in declaration order, whose prefix matches `path`.
    pub fn resolve(&self, path: &str) -> Option<&ProxyRoute> {
        self.routes.iter().find(|r| r.matches(path))
    }

    /// Pairs of `(earlier, later)` prefixes where `later` can never match
    /// because `earlier` is declared first and is a prefix of it.
    pub fn shadowed(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        for (i, later) in self.routes.iter().enumerate() {
            if let Some(earlier) = self.routes[..i].iter().find(|r| later.prefix.starts_with(&r.prefix)) {
                out.push((earlier.prefix.as_str(), later.prefix.as_str()));
            }
        }
        out
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RouteSpec {
    Target(String),
    #[serde(rename_all = "camelCase")]
    Detailed {
        target: String,
        #[serde(default)]
        change_origin: bool,
        #[serde(default)]
        rewrite: Option<Rewrite>,
    },
}

impl RouteSpec {
    fn into_route(self, prefix: String) -> Result<ProxyRoute, ConfigError> {
        match self {
            RouteSpec::Target(target) => ProxyRoute::new(prefix, target),
            RouteSpec::Detailed {
                target,
                change_origin,
                rewrite,
            } => {
                let mut route = ProxyRoute::new(prefix, target)?.with_change_origin(change_origin);
                route.rewrite = rewrite;
                Ok(route)
            }
        }
    }
}

// Object keys are visited in document order, including duplicates, which a
// HashMap-based deserialize would lose.
impl<'de> Deserialize<'de> for ProxyTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = ProxyTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of path prefixes to proxy targets")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<ProxyTable, A::Error> {
                let mut table = ProxyTable::new();
                while let Some((prefix, spec)) = map.next_entry::<String, RouteSpec>()? {
                    let route = spec.into_route(prefix).map_err(de::Error::custom)?;
                    table.insert(route);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}
