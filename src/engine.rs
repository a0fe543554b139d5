//! Per-request match-and-transform engine.
//!
//! # Data Flow
//! ```text
//! Request + RoutingConfig
//!     → RouteTable::build (fail open)
//!     → routing::resolve
//!         → None: PassThrough(request)
//!         → Redirect: 302 Location=target
//!         → Proxy: forward (loop guard) → cache policy → HTML rewrite
//! ```
//!
//! Every failure ends in a response; nothing propagates to the caller.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, Response},
    response::IntoResponse,
};
use url::Url;

use crate::config::RoutingConfig;
use crate::error::EdgeError;
use crate::http::cache::{apply_cache_policy, ImageCacheConfig};
use crate::http::forward::{forward, Upstream};
use crate::http::html::{rewrite_body, RewriteContext};
use crate::http::request::incoming_url;
use crate::http::response::{self, content_type, is_html};
use crate::routing::{resolve, RouteAction, RouteMatch, RouteTable, TargetUrl};

/// What the engine decided for one request.
pub enum Outcome {
    /// No route matched; the caller handles the request as it sees fit.
    PassThrough(Request<Body>),
    /// A redirect, a proxied response, or an error response.
    Respond(Response<Body>),
}

/// The routing engine. Holds only the upstream; routes arrive per request.
#[derive(Clone)]
pub struct EdgeRouter {
    upstream: Arc<dyn Upstream>,
}

impl EdgeRouter {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self { upstream }
    }

    /// Route one request against the given settings.
    pub async fn handle(&self, settings: &RoutingConfig, request: Request<Body>) -> Outcome {
        match self.dispatch(settings, request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::debug!(error = %e, status = %e.status(), "Request ended with error response");
                Outcome::Respond(e.into_response())
            }
        }
    }

    /// Default handling for unmatched requests: forward unmodified to the
    /// fallback origin, or 404 when there is none.
    pub async fn pass_through(&self, settings: &RoutingConfig, request: Request<Body>) -> Response<Body> {
        let Some(raw) = settings.fallback_origin.as_deref() else {
            return response::not_found();
        };

        let origin = match Url::parse(raw) {
            Ok(origin) => origin,
            Err(e) => {
                tracing::error!(fallback_origin = %raw, error = %e, "Invalid fallback origin");
                return response::not_found();
            }
        };

        let mut url = origin;
        url.set_path(request.uri().path());
        let target = TargetUrl::new(url, request.uri().query());

        match forward(self.upstream.as_ref(), request, &target).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }

    async fn dispatch(&self, settings: &RoutingConfig, request: Request<Body>) -> Result<Outcome, EdgeError> {
        let table = RouteTable::build(&settings.routes);
        let incoming = incoming_url(&request)?;

        let Some(route) = resolve(&table, incoming.path(), request.uri().query()) else {
            tracing::trace!(path = %incoming.path(), "No route matched");
            return Ok(Outcome::PassThrough(request));
        };

        match route.entry.action() {
            RouteAction::Redirect(_) => {
                tracing::debug!(
                    pattern = %route.entry.pattern(),
                    location = %route.target_url,
                    "Redirecting"
                );
                response::redirect(&route.target_url).map(Outcome::Respond)
            }
            RouteAction::Proxy(_) => {
                let image_cache = ImageCacheConfig::parse(settings.image_cache.as_deref());
                self.proxy(request, &route, &incoming, &image_cache)
                    .await
                    .map(Outcome::Respond)
            }
        }
    }

    async fn proxy(
        &self,
        request: Request<Body>,
        route: &RouteMatch<'_>,
        incoming: &Url,
        image_cache: &ImageCacheConfig,
    ) -> Result<Response<Body>, EdgeError> {
        let response = forward(self.upstream.as_ref(), request, &route.target_url).await?;
        let (mut parts, body) = response.into_parts();

        let path = route.target_url.url().path();
        let html = is_html(content_type(&parts.headers), path);
        apply_cache_policy(
            &mut parts.headers,
            path,
            image_cache.enabled_for(route.entry.pattern()),
        );

        if !html {
            return Ok(Response::from_parts(parts, body));
        }

        let encoded = parts
            .headers
            .get(header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|v| !v.eq_ignore_ascii_case("identity"))
            .unwrap_or(false);
        if encoded {
            tracing::warn!(target = %route.target_url, "Compressed HTML from origin; skipping rewrite");
            return Ok(Response::from_parts(parts, body));
        }

        parts.headers.remove(header::CONTENT_LENGTH);
        let ctx = RewriteContext::new(route.entry.base_path(), incoming, route.target_url.url());
        Ok(Response::from_parts(parts, rewrite_body(body, ctx)))
    }
}
