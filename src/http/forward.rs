//! Outbound forwarding and loop protection.
//!
//! # Responsibilities
//! - Refuse requests that already passed through this router (508)
//! - Stamp the loop guard header on outbound requests
//! - Strip `Host`, `Accept-Encoding` and hop-by-hop headers
//! - Map transport failures to 502 naming the origin
//!
//! # Design Decisions
//! - `Upstream` is the seam to the network; tests substitute their own
//! - No retries: a failed call is reported once
//! - The production client never follows redirects; they go back to the client
//! - `Accept-Encoding` is dropped so the client negotiates and decodes
//!   compression itself, keeping HTML bodies rewritable

use std::time::Duration;

use axum::{
    body::{Body, HttpBody},
    http::{header, HeaderValue, Request, Response, Uri},
};
use futures_util::future::BoxFuture;

use crate::config::TimeoutConfig;
use crate::error::{BoxError, EdgeError};
use crate::http::response::strip_hop_by_hop;
use crate::routing::TargetUrl;

/// Marker header stamped on every forwarded request.
pub const LOOP_GUARD_HEADER: &str = "x-edge-router-loop";

/// "Fetch this outbound request and return a response."
pub trait Upstream: Send + Sync {
    fn fetch(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>, BoxError>>;
}

/// Whether the request already carries the loop guard.
pub fn is_looping<B>(request: &Request<B>) -> bool {
    request.headers().contains_key(LOOP_GUARD_HEADER)
}

/// Forward `request` to `target` through the loop guard.
pub async fn forward(
    upstream: &dyn Upstream,
    request: Request<Body>,
    target: &TargetUrl,
) -> Result<Response<Body>, EdgeError> {
    if is_looping(&request) {
        tracing::warn!(target = %target, "Loop guard header present; refusing to forward");
        return Err(EdgeError::LoopDetected);
    }

    let outbound = prepare_outbound(request, target)?;

    tracing::debug!(method = %outbound.method(), target = %target, "Forwarding request");

    upstream.fetch(outbound).await.map_err(|source| {
        let origin = target.url().origin().ascii_serialization();
        tracing::error!(origin = %origin, error = %source, "Upstream unreachable");
        EdgeError::Unreachable { origin, source }
    })
}

/// Rebuild the inbound request for the origin: new URI, no `Host`, loop
/// guard stamped. Method, remaining headers and body are kept.
pub fn prepare_outbound(request: Request<Body>, target: &TargetUrl) -> Result<Request<Body>, EdgeError> {
    let (mut parts, body) = request.into_parts();

    parts.uri = target
        .request_target()
        .parse::<Uri>()
        .map_err(|e| EdgeError::Internal(format!("invalid target URI {target}: {e}")))?;

    parts.headers.remove(header::HOST);
    parts.headers.remove(header::ACCEPT_ENCODING);
    strip_hop_by_hop(&mut parts.headers);
    parts
        .headers
        .insert(LOOP_GUARD_HEADER, HeaderValue::from_static("1"));

    Ok(Request::from_parts(parts, body))
}

/// Production upstream over reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestUpstream {
    client: reqwest::Client,
    response_timeout: Duration,
}

impl ReqwestUpstream {
    pub fn new(timeouts: &TimeoutConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()?;

        Ok(Self {
            client,
            response_timeout: Duration::from_secs(timeouts.request_secs),
        })
    }

    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, BoxError> {
        let (parts, body) = request.into_parts();

        let mut builder = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers);
        if body.size_hint().exact() != Some(0) {
            builder = builder.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let upstream = tokio::time::timeout(self.response_timeout, builder.send())
            .await
            .map_err(|_| {
                format!(
                    "no response headers within {}s",
                    self.response_timeout.as_secs()
                )
            })??;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

impl Upstream for ReqwestUpstream {
    fn fetch(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>, BoxError>> {
        Box::pin(self.send(request))
    }
}
