//! Target URL reconstruction.

use std::fmt;

use url::{Position, Url};

use crate::routing::matcher::remaining_path;
use crate::routing::table::{RouteEntry, RouteKind, RouteTable};

/// A destination URL carrying the client's query string byte for byte.
///
/// `Url` re-encodes queries on parse and on `set_query`, so the query is
/// held apart and only joined when the URL is serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUrl {
    url: Url,
    query: Option<String>,
}

impl TargetUrl {
    /// `url`'s own query is discarded in favour of `query`. An empty query
    /// is treated as none.
    pub fn new(mut url: Url, query: Option<&str>) -> Self {
        url.set_query(None);
        Self {
            url,
            query: query.filter(|q| !q.is_empty()).map(str::to_string),
        }
    }

    /// The destination without its query.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Origin-form-ready absolute URI: no fragment.
    pub fn request_target(&self) -> String {
        let mut out = self.url[..Position::AfterPath].to_string();
        if let Some(query) = &self.query {
            out.push('?');
            out.push_str(query);
        }
        out
    }
}

impl fmt::Display for TargetUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.request_target())?;
        f.write_str(&self.url[Position::AfterQuery..])
    }
}

/// A resolved route: the entry that matched and where the request goes.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    pub entry: &'a RouteEntry,
    pub target_url: TargetUrl,
}

impl RouteMatch<'_> {
    pub fn kind(&self) -> RouteKind {
        self.entry.kind()
    }
}

/// Match the request path against the table and build its destination.
/// `query` is the raw query string exactly as the client sent it.
pub fn resolve<'a>(table: &'a RouteTable, path: &str, query: Option<&str>) -> Option<RouteMatch<'a>> {
    let entry = table.find(path)?;
    Some(RouteMatch {
        entry,
        target_url: build_target_url(entry, path, query),
    })
}

/// Build the destination URL for a matched entry.
///
/// Wildcard targets get the unmatched remainder of the path appended to
/// their own path; other targets are used as given. The incoming query
/// string always replaces the target's.
pub fn build_target_url(entry: &RouteEntry, path: &str, query: Option<&str>) -> TargetUrl {
    let target = entry.target();
    let mut url = target.url().clone();

    if target.is_wildcard() {
        let remaining = remaining_path(entry, path);
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base}{remaining}"));
    }

    TargetUrl::new(url, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_raw<'a>(table: &'a RouteTable, path_and_query: &str) -> Option<RouteMatch<'a>> {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path_and_query, None),
        };
        resolve(table, path, query)
    }

    fn table() -> RouteTable {
        RouteTable::try_parse(
            r#"{
                "/app-one/*": "proxy:https://target.example.com/*",
                "/nested/*": "proxy:https://target.example.com/base/*",
                "/docs": "https://docs.example.com/start",
                "/legacy/*": "redirect:https://legacy.example.com/home"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_wildcard_preserves_subpath_and_query() {
        let table = table();
        let m = resolve_raw(&table, "/app-one/x/y?q=1").unwrap();
        assert_eq!(m.kind(), RouteKind::Proxy);
        assert_eq!(m.target_url.to_string(), "https://target.example.com/x/y?q=1");
    }

    #[test]
    fn test_bare_prefix_maps_to_target_root() {
        let table = table();
        for path in ["/app-one", "/app-one/"] {
            let m = resolve_raw(&table, path).unwrap();
            assert_eq!(m.target_url.to_string(), "https://target.example.com/");
        }
    }

    #[test]
    fn test_non_root_target_path_is_concatenated() {
        let table = table();
        let m = resolve_raw(&table, "/nested/page").unwrap();
        assert_eq!(m.target_url.to_string(), "https://target.example.com/base/page");

        let m = resolve_raw(&table, "/nested").unwrap();
        assert_eq!(m.target_url.to_string(), "https://target.example.com/base/");
    }

    #[test]
    fn test_redirect_preserves_query() {
        let table = table();
        let m = resolve_raw(&table, "/docs?utm=mail").unwrap();
        assert_eq!(m.kind(), RouteKind::Redirect);
        assert_eq!(
            m.target_url.to_string(),
            "https://docs.example.com/start?utm=mail"
        );
    }

    #[test]
    fn test_non_wildcard_target_ignores_subpath() {
        let table = table();
        let m = resolve_raw(&table, "/legacy/some/deep/page").unwrap();
        assert_eq!(m.target_url.to_string(), "https://legacy.example.com/home");
    }

    #[test]
    fn test_query_is_copied_verbatim() {
        let table = table();
        let m = resolve_raw(&table, "/docs?name='bob'&x=a%20b&y=c+d").unwrap();
        assert_eq!(
            m.target_url.to_string(),
            "https://docs.example.com/start?name='bob'&x=a%20b&y=c+d"
        );

        let m = resolve_raw(&table, "/app-one/p?q='x'").unwrap();
        assert_eq!(m.target_url.request_target(), "https://target.example.com/p?q='x'");
    }

    #[test]
    fn test_empty_query_is_dropped() {
        let table = table();
        let m = resolve_raw(&table, "/docs?").unwrap();
        assert_eq!(m.target_url.to_string(), "https://docs.example.com/start");
    }

    #[test]
    fn test_target_fragment_kept_for_display_only() {
        let url = Url::parse("https://docs.example.com/start?old=1#intro").unwrap();
        let target = TargetUrl::new(url, Some("new=2"));
        assert_eq!(target.to_string(), "https://docs.example.com/start?new=2#intro");
        assert_eq!(target.request_target(), "https://docs.example.com/start?new=2");
        assert_eq!(target.url().query(), None);
    }

    #[test]
    fn test_shared_string_prefix_does_not_resolve() {
        let table = table();
        assert!(resolve_raw(&table, "/app-one-extra").is_none());
    }
}
