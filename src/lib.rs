//! Edge request router.
//!
//! Matches inbound paths against an ordered route table and either
//! redirects, proxies to another origin (rewriting HTML so the borrowed
//! application works under its new path), or hands the request back to the
//! caller untouched.

pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::RouterConfig;
pub use engine::{EdgeRouter, Outcome};
pub use error::EdgeError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
