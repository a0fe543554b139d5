//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all handler
//! - Wire up middleware (tracing, timeout, request ID, panic catching)
//! - Dispatch every request to the routing engine
//! - Apply live configuration updates
//! - Graceful shutdown

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{RouterConfig, RoutingConfig};
use crate::engine::{EdgeRouter, Outcome};
use crate::http::forward::{ReqwestUpstream, Upstream};
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: EdgeRouter,
    pub routing: Arc<ArcSwap<RoutingConfig>>,
}

/// HTTP server for the edge router.
pub struct HttpServer {
    router: Router,
    routing: Arc<ArcSwap<RoutingConfig>>,
    config: RouterConfig,
}

impl HttpServer {
    /// Create a server that forwards over the network.
    pub fn new(config: RouterConfig) -> Result<Self, reqwest::Error> {
        let upstream = ReqwestUpstream::new(&config.timeouts)?;
        Ok(Self::with_upstream(config, Arc::new(upstream)))
    }

    /// Create a server with a caller-supplied upstream.
    pub fn with_upstream(config: RouterConfig, upstream: Arc<dyn Upstream>) -> Self {
        let routing = Arc::new(ArcSwap::from_pointee(config.routing.clone()));
        let state = AppState {
            engine: EdgeRouter::new(upstream),
            routing: routing.clone(),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            routing,
            config,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RouterConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(edge_handler))
            .route("/", any(edge_handler))
            .with_state(state)
            .layer(CatchPanicLayer::new())
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.connect_secs + config.timeouts.request_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Replace the routing settings used by subsequent requests.
    pub fn update_routing(&self, routing: RoutingConfig) {
        self.routing.store(Arc::new(routing));
    }

    /// Run the server until `shutdown` fires, applying config updates as
    /// they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<RouterConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let routing = self.routing.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                routing.store(Arc::new(new_config.routing));
                tracing::info!("Routing configuration reloaded");
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config the server was started with.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }
}

/// Catch-all handler: run the engine, handle pass-through, record metrics.
async fn edge_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let routing = state.routing.load_full();

    let (response, outcome) = match state.engine.handle(&routing, request).await {
        Outcome::Respond(response) => (response, "routed"),
        Outcome::PassThrough(request) => {
            let response = state.engine.pass_through(&routing, request).await;
            (response, "pass_through")
        }
    };

    metrics::record_request(&method, response.status().as_u16(), outcome, start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use axum::http::{header, StatusCode};
    use futures_util::future::BoxFuture;
    use tower::ServiceExt;

    struct PanickingUpstream;

    impl Upstream for PanickingUpstream {
        fn fetch(&self, _request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>, BoxError>> {
            panic!("upstream exploded")
        }
    }

    fn server(routes: &str) -> HttpServer {
        let mut config = RouterConfig::default();
        config.routing = RoutingConfig::with_routes(routes);
        HttpServer::with_upstream(config, Arc::new(PanickingUpstream))
    }

    #[tokio::test]
    async fn test_redirect_through_router() {
        let server = server(r#"{"/docs": "https://docs.example.com"}"#);
        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .uri("/docs?x=1")
                    .header("Host", "edge.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://docs.example.com/?x=1"
        );
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_unmatched_is_404_without_fallback() {
        let server = server(r#"{"/docs": "https://docs.example.com"}"#);
        let response = server
            .router()
            .oneshot(Request::builder().uri("/other").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_panic_becomes_500() {
        let server = server(r#"{"/app/*": "proxy:https://app.example.com/*"}"#);
        let response = server
            .router()
            .oneshot(Request::builder().uri("/app/x").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_update_routing_applies_to_next_request() {
        let server = server("");
        let router = server.router();

        let response = router
            .clone()
            .oneshot(Request::builder().uri("/new").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        server.update_routing(RoutingConfig::with_routes(
            r#"{"/new": "https://new.example.com/landing"}"#,
        ));

        let response = router
            .oneshot(Request::builder().uri("/new").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
    }
}
