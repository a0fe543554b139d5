//! Cache-Control policy for proxied responses.
//!
//! Rules, first applicable wins:
//! 1. hashed `.js`/`.css` asset with a restrictive upstream header → immutable
//! 2. image with image caching enabled and a restrictive header → one week
//! 3. no upstream header → `no-cache` for HTML, one year otherwise
//! 4. otherwise the upstream header is kept

use std::collections::HashSet;

use axum::http::{header, HeaderMap, HeaderValue};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::http::response::{content_type, is_html};

pub const HASHED_ASSET_CACHE: &str = "public, max-age=31536000, immutable";
pub const IMAGE_CACHE: &str = "public, max-age=604800";
pub const HTML_DEFAULT_CACHE: &str = "no-cache";
pub const ASSET_DEFAULT_CACHE: &str = "public, max-age=31536000";

const RESTRICTIVE_DIRECTIVES: &[&str] = &["max-age=0", "no-cache", "no-store", "must-revalidate"];

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "svg", "ico", "bmp", "avif", "tiff", "tif",
];

static HASHED_ASSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.-][A-Za-z0-9]{8,}\.(?:js|css)$").expect("valid regex"));

/// Which routes get extended caching for images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageCacheConfig {
    Global(bool),
    Routes(HashSet<String>),
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        ImageCacheConfig::Global(false)
    }
}

impl ImageCacheConfig {
    /// Parse the descriptor: `true`/`false`, a JSON array of route patterns,
    /// or a comma-separated list. Anything unreadable disables image caching.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return Self::default();
        };

        match raw {
            "" | "false" => Self::Global(false),
            "true" => Self::Global(true),
            list if list.starts_with('[') => match serde_json::from_str::<Vec<String>>(list) {
                Ok(patterns) => Self::Routes(patterns.into_iter().collect()),
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring unreadable image cache list");
                    Self::default()
                }
            },
            list => Self::Routes(
                list.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
        }
    }

    /// Whether the route with this pattern gets image caching.
    pub fn enabled_for(&self, pattern: &str) -> bool {
        match self {
            ImageCacheConfig::Global(enabled) => *enabled,
            ImageCacheConfig::Routes(patterns) => patterns.contains(pattern),
        }
    }
}

/// Outcome of the policy for one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    Set(&'static str),
    Keep,
}

/// Decide the outgoing `Cache-Control` for a response.
pub fn decide(
    content_type: Option<&str>,
    path: &str,
    image_cache_enabled: bool,
    upstream: Option<&str>,
) -> CacheDecision {
    let restrictive = upstream.map(is_restrictive).unwrap_or(false);
    let filename = path.rsplit('/').next().unwrap_or(path);

    if restrictive && is_hashed_asset(filename) {
        return CacheDecision::Set(HASHED_ASSET_CACHE);
    }

    if restrictive && image_cache_enabled && is_image(filename) {
        return CacheDecision::Set(IMAGE_CACHE);
    }

    if upstream.is_none() {
        return if is_html(content_type, path) {
            CacheDecision::Set(HTML_DEFAULT_CACHE)
        } else {
            CacheDecision::Set(ASSET_DEFAULT_CACHE)
        };
    }

    CacheDecision::Keep
}

/// Apply the policy to a response's headers in place.
pub fn apply_cache_policy(headers: &mut HeaderMap, path: &str, image_cache_enabled: bool) {
    let upstream = headers
        .get(header::CACHE_CONTROL)
        .map(|v| v.to_str().unwrap_or_default());

    let decision = decide(content_type(headers), path, image_cache_enabled, upstream);
    if let CacheDecision::Set(value) = decision {
        tracing::trace!(path = %path, cache_control = value, "Rewriting Cache-Control");
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(value));
    }
}

fn is_restrictive(cache_control: &str) -> bool {
    let lower = cache_control.to_ascii_lowercase();
    RESTRICTIVE_DIRECTIVES.iter().any(|d| lower.contains(d))
}

fn is_hashed_asset(filename: &str) -> bool {
    HASHED_ASSET.is_match(filename)
}

fn is_image(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
