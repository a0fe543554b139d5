//! Incoming request inspection.
//!
//! # Responsibilities
//! - Reconstruct the absolute URL the client asked for
//!
//! # Design Decisions
//! - Scheme comes from `x-forwarded-proto` (first value), defaulting to http
//! - Authority comes from the Host header, then the request URI
//! - The reconstructed origin is the "source origin" used by HTML rewriting

use axum::http::{header, Request};
use url::Url;

use crate::error::EdgeError;

pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Absolute URL of the inbound request.
pub fn incoming_url<B>(request: &Request<B>) -> Result<Url, EdgeError> {
    let headers = request.headers();

    let scheme = headers
        .get(X_FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("http");

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().authority().map(|a| a.as_str()))
        .unwrap_or("localhost");

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Url::parse(&format!("{scheme}://{host}{path_and_query}"))
        .map_err(|e| EdgeError::Internal(format!("cannot reconstruct request URL: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_uses_host_header() {
        let req = Request::builder()
            .uri("/app/page?x=1")
            .header("Host", "source.example.com")
            .body(Body::empty())
            .unwrap();
        let url = incoming_url(&req).unwrap();
        assert_eq!(url.as_str(), "http://source.example.com/app/page?x=1");
    }

    #[test]
    fn test_forwarded_proto() {
        let req = Request::builder()
            .uri("/")
            .header("Host", "source.example.com")
            .header(X_FORWARDED_PROTO, "https, http")
            .body(Body::empty())
            .unwrap();
        let url = incoming_url(&req).unwrap();
        assert_eq!(url.origin().ascii_serialization(), "https://source.example.com");
    }

    #[test]
    fn test_falls_back_to_uri_authority() {
        let req = Request::builder()
            .uri("http://other.example.com:8080/x")
            .body(Body::empty())
            .unwrap();
        let url = incoming_url(&req).unwrap();
        assert_eq!(url.as_str(), "http://other.example.com:8080/x");
    }

    #[test]
    fn test_invalid_host_is_internal_error() {
        let req = Request::builder()
            .uri("/x")
            .header("Host", "bad host")
            .body(Body::empty())
            .unwrap();
        assert!(matches!(incoming_url(&req), Err(EdgeError::Internal(_))));
    }
}
