//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     RouteDeclaration[]
//!     → matcher.rs (normalize template, classify static/dynamic, build regex)
//!     → table.rs (exact map per method, ordered dynamic list per method, name index)
//!     → Freeze as immutable RouteTable (or load a snapshot of one)
//!
//! Incoming Request (method, path):
//!     → table.rs exact lookup (O(1))
//!     → table.rs dynamic scan in registration order (O(k))
//!     → Return: CompiledRoute + captured params, or a typed miss
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Static routes never touch a regex
//! - Deterministic: same input always matches same route
//! - First registered wins (static duplicates and dynamic ordering)

pub mod matcher;
pub mod route;
pub mod table;
pub mod url;

pub use matcher::{normalize_path, PathMatcher, PathParams, PathPattern};
pub use route::{
    CachePolicy, CompiledRoute, Method, PartitionKey, RateLimitSpec, RouteDeclaration, RouteGroup,
};
pub use table::RouteTable;
