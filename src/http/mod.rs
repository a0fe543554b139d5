//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Client request
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (reconstruct the public URL)
//!     → [engine matches the route]
//!     → forward.rs (loop guard, outbound call)
//!     → cache.rs (Cache-Control policy)
//!     → html.rs (streaming URL rewrite for HTML)
//!     → response.rs (redirects, classification, header hygiene)
//!     → Send to client
//! ```

pub mod cache;
pub mod forward;
pub mod html;
pub mod request;
pub mod response;
pub mod server;

pub use forward::{ReqwestUpstream, Upstream, LOOP_GUARD_HEADER};
pub use server::HttpServer;
