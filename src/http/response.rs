//! Response construction and classification.
//!
//! # Responsibilities
//! - Build redirect and fallback responses
//! - Classify responses as HTML (drives cache defaults and rewriting)
//! - Strip hop-by-hop headers from forwarded messages

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Response, StatusCode},
};
use crate::error::EdgeError;
use crate::routing::TargetUrl;

/// Headers that describe a single connection and are never forwarded.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// 302 pointing at `location`, no body.
pub fn redirect(location: &TargetUrl) -> Result<Response<Body>, EdgeError> {
    let value = HeaderValue::from_str(&location.to_string())
        .map_err(|e| EdgeError::Internal(format!("invalid redirect location {location}: {e}")))?;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::FOUND;
    response.headers_mut().insert(header::LOCATION, value);
    Ok(response)
}

/// Response for unmatched requests when no fallback origin is configured.
pub fn not_found() -> Response<Body> {
    let mut response = Response::new(Body::from("No matching route"));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

/// HTML by content type (`text/html`, `application/xhtml+xml`) or by a
/// `.html` path suffix.
pub fn is_html(content_type: Option<&str>, path: &str) -> bool {
    let by_type = content_type
        .map(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.contains("text/html") || ct.contains("application/xhtml+xml")
        })
        .unwrap_or(false);

    by_type || path.ends_with(".html")
}

pub fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}
