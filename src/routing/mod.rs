//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route text (JSON object)
//!     → table.rs (parse, classify, validate; fail open)
//!     → RouteTable (ordered, immutable)
//!
//! Incoming URL
//!     → matcher.rs (first matching entry, path split)
//!     → target.rs (destination URL + query)
//!     → Return: RouteMatch or None (pass through)
//! ```
//!
//! # Design Decisions
//! - Tables are rebuilt from text for every request; nothing is cached
//! - Deterministic: same input always matches same route
//! - First match wins (ordered as configured)

pub mod matcher;
pub mod table;
pub mod target;

pub use matcher::remaining_path;
pub use table::{RouteAction, RouteEntry, RouteKind, RouteTable, RouteTableError, RouteTarget};
pub use target::{build_target_url, resolve, RouteMatch, TargetUrl};
