//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing macros (structured events: route, method, path, identity)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, filtered by RUST_LOG / config)
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Request ID flows from the HTTP layer into every request log line
//! - Metrics are recorded unconditionally; without an exporter they are dropped

pub mod logging;
pub mod metrics;
