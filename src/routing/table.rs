//! Route table construction.
//!
//! # Responsibilities
//! - Parse the raw route text (JSON object, key order preserved)
//! - Classify each entry as proxy or redirect from its target marker
//! - Validate every target as an absolute URL
//!
//! # Design Decisions
//! - Markers are parsed once here; the rest of the crate sees `RouteAction`
//! - Any invalid entry rejects the whole table
//! - `RouteTable::build` fails open: a rejected table is an empty table

use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

/// Prefix marking a target that is proxied rather than redirected.
pub const PROXY_MARKER: &str = "proxy:";

/// Legacy prefix explicitly marking a redirect target.
pub const REDIRECT_MARKER: &str = "redirect:";

/// Suffix that turns a pattern into a prefix match and a target into a
/// subpath template.
pub const WILDCARD_SUFFIX: &str = "/*";

/// Errors that reject a route table.
#[derive(Debug, Error)]
pub enum RouteTableError {
    #[error("route configuration is not a JSON object: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("route '{0}' must start with '/'")]
    PatternWithoutSlash(String),

    #[error("route '{0}' has a non-string target")]
    NonStringTarget(String),

    #[error("route '{pattern}' target '{target}' is not an absolute URL: {source}")]
    InvalidTarget {
        pattern: String,
        target: String,
        source: url::ParseError,
    },
}

/// Whether a matched route forwards or redirects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Proxy,
    Redirect,
}

/// Destination of a route, with the wildcard marker already removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    url: Url,
    wildcard: bool,
}

impl RouteTarget {
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// True when the configured target ended in `/*`, i.e. the unmatched
    /// remainder of the request path is appended to it.
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }
}

/// What to do with a request that matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAction {
    Proxy(RouteTarget),
    Redirect(RouteTarget),
}

/// A single validated route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pattern: String,
    wildcard: bool,
    action: RouteAction,
}

impl RouteEntry {
    /// Parse one `pattern → target` pair.
    pub fn parse(pattern: &str, raw_target: &str) -> Result<Self, RouteTableError> {
        if !pattern.starts_with('/') {
            return Err(RouteTableError::PatternWithoutSlash(pattern.to_string()));
        }

        let (kind, target) = if let Some(rest) = raw_target.strip_prefix(PROXY_MARKER) {
            (RouteKind::Proxy, rest)
        } else if let Some(rest) = raw_target.strip_prefix(REDIRECT_MARKER) {
            (RouteKind::Redirect, rest)
        } else {
            (RouteKind::Redirect, raw_target)
        };

        let wildcard = pattern.ends_with(WILDCARD_SUFFIX);
        let target_wildcard = target.ends_with(WILDCARD_SUFFIX);
        if wildcard && !target_wildcard {
            tracing::warn!(
                pattern = %pattern,
                target = %target,
                "Wildcard route has a target without '/*'; subpaths will not be preserved"
            );
        }

        let base = target.strip_suffix(WILDCARD_SUFFIX).unwrap_or(target);
        let url = Url::parse(base).map_err(|source| RouteTableError::InvalidTarget {
            pattern: pattern.to_string(),
            target: raw_target.to_string(),
            source,
        })?;

        let target = RouteTarget {
            url,
            wildcard: target_wildcard,
        };
        let action = match kind {
            RouteKind::Proxy => RouteAction::Proxy(target),
            RouteKind::Redirect => RouteAction::Redirect(target),
        };

        Ok(Self {
            pattern: pattern.to_string(),
            wildcard,
            action,
        })
    }

    /// The pattern exactly as configured (including any `/*`).
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// The pattern without its wildcard suffix.
    pub fn prefix(&self) -> &str {
        if self.wildcard {
            &self.pattern[..self.pattern.len() - WILDCARD_SUFFIX.len()]
        } else {
            &self.pattern
        }
    }

    /// Source-side mount point, never ending in `/` (empty for the root).
    pub fn base_path(&self) -> &str {
        self.prefix().trim_end_matches('/')
    }

    pub fn action(&self) -> &RouteAction {
        &self.action
    }

    pub fn kind(&self) -> RouteKind {
        match self.action {
            RouteAction::Proxy(_) => RouteKind::Proxy,
            RouteAction::Redirect(_) => RouteKind::Redirect,
        }
    }

    pub fn target(&self) -> &RouteTarget {
        match &self.action {
            RouteAction::Proxy(target) | RouteAction::Redirect(target) => target,
        }
    }
}

/// Ordered, immutable set of routes. First match wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Build a table, failing open: any error is logged and yields an empty
    /// table so every request passes through untouched.
    pub fn build(raw: &str) -> Self {
        match Self::try_parse(raw) {
            Ok(table) => table,
            Err(e) => {
                tracing::error!(error = %e, "Rejecting route table; passing all requests through");
                Self::default()
            }
        }
    }

    /// Parse and validate a table, reporting the first problem found.
    pub fn try_parse(raw: &str) -> Result<Self, RouteTableError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        let map: Map<String, Value> = serde_json::from_str(raw)?;
        let mut entries = Vec::with_capacity(map.len());
        for (pattern, value) in &map {
            let target = value
                .as_str()
                .ok_or_else(|| RouteTableError::NonStringTarget(pattern.clone()))?;
            entries.push(RouteEntry::parse(pattern, target)?);
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
