//! Route matching logic.
//!
//! # Responsibilities
//! - Match a request path against wildcard and exact patterns
//! - Split a matched path into the mount prefix and the remainder
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Wildcards only match on a `/` boundary (`/app` never matches `/app-x`)
//! - No regex to guarantee O(n) matching

use crate::routing::table::{RouteEntry, RouteTable};

impl RouteEntry {
    /// Returns true if the path (no query string) matches this route.
    pub fn matches(&self, path: &str) -> bool {
        if !self.is_wildcard() {
            return path == self.pattern();
        }

        let prefix = self.prefix();
        match path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

impl RouteTable {
    /// First route, in table order, matching the path.
    pub fn find(&self, path: &str) -> Option<&RouteEntry> {
        self.entries().iter().find(|entry| entry.matches(path))
    }
}

/// The part of a matched path below the route's prefix, always starting
/// with `/`. A path equal to the prefix (with or without a trailing slash)
/// leaves `/`.
pub fn remaining_path<'p>(entry: &RouteEntry, path: &'p str) -> &'p str {
    let prefix = entry.prefix();
    match path.strip_prefix(prefix) {
        Some("") | Some("/") | None => "/",
        Some(rest) if rest.starts_with('/') => rest,
        Some(_) => "/",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pattern: &str) -> RouteEntry {
        RouteEntry::parse(pattern, "proxy:https://target.example.com/*").unwrap()
    }

    #[test]
    fn test_wildcard_matches_prefix_and_subpaths() {
        let route = entry("/app-one/*");
        assert!(route.matches("/app-one"));
        assert!(route.matches("/app-one/"));
        assert!(route.matches("/app-one/x/y"));
    }

    #[test]
    fn test_wildcard_requires_segment_boundary() {
        let route = entry("/app-one/*");
        assert!(!route.matches("/app-one-extra"));
        assert!(!route.matches("/app-on"));
        assert!(!route.matches("/other"));
    }

    #[test]
    fn test_exact_route() {
        let route = entry("/docs");
        assert!(route.matches("/docs"));
        assert!(!route.matches("/docs/"));
        assert!(!route.matches("/docs/intro"));
    }

    #[test]
    fn test_root_wildcard_matches_everything() {
        let route = entry("/*");
        assert!(route.matches("/"));
        assert!(route.matches("/anything/at/all"));
    }

    #[test]
    fn test_first_match_wins() {
        let table = RouteTable::try_parse(
            r#"{
                "/app/*": "proxy:https://first.example.com/*",
                "/app/admin/*": "proxy:https://second.example.com/*"
            }"#,
        )
        .unwrap();

        let found = table.find("/app/admin/users").unwrap();
        assert_eq!(found.pattern(), "/app/*");
    }

    #[test]
    fn test_no_match() {
        let table = RouteTable::try_parse(r#"{"/app/*": "proxy:https://a.example.com/*"}"#).unwrap();
        assert!(table.find("/elsewhere").is_none());
        assert!(RouteTable::default().find("/").is_none());
    }

    #[test]
    fn test_remaining_path() {
        let route = entry("/app-one/*");
        assert_eq!(remaining_path(&route, "/app-one"), "/");
        assert_eq!(remaining_path(&route, "/app-one/"), "/");
        assert_eq!(remaining_path(&route, "/app-one/x/y"), "/x/y");

        let exact = entry("/docs");
        assert_eq!(remaining_path(&exact, "/docs"), "/");
    }
}
