//! routekit: an HTTP request router.
//!
//! # Architecture Overview
//!
//! ```text
//!   RouteDeclaration[] (config file, builder calls, groups)
//!          │
//!          ▼
//!   ┌──────────────┐   snapshot    ┌──────────────┐
//!   │   routing    │◀─────────────▶│  cache file  │
//!   │ table+pattern│   (JSON)      └──────────────┘
//!   └──────┬───────┘
//!          │ match (exact → dynamic → 405 → 404)
//!          ▼
//!   ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//!   │  middleware  │───▶│   security   │───▶│   dispatch   │───▶ Reply
//!   │ globals+route│    │ rate window  │    │ args + deps  │
//!   └──────────────┘    └──────────────┘    └──────────────┘
//!
//!   Cross-cutting: config (TOML + hot reload), http (axum adapter),
//!   observability (tracing, Prometheus), lifecycle (shutdown)
//! ```

// Core
pub mod context;
pub mod dispatch;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routing;
pub mod security;

// Integration
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::RouterConfig;
pub use context::{Reply, RequestContext};
pub use error::{HandlerError, NamedRouteError, RouterError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use router::{clear_cache, RouteMatch, Router, RouterBuilder};
pub use routing::{Method, RouteDeclaration, RouteGroup, RouteTable};
