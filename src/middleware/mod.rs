//! Middleware subsystem.
//!
//! # Data Flow
//! ```text
//! Matched route:
//!     → pipeline.rs (globals ++ route refs, resolve aliases and `name:param`)
//!     → layer[0] → next.run() → layer[1] → ... → terminal (rate check + dispatch)
//!     ← replies unwind back through every layer that called next
//! ```
//!
//! # Design Decisions
//! - Globals always run outermost
//! - References are resolved when a request executes, not at registration
//! - A layer that returns without calling `next` short-circuits the chain

pub mod builtin;
pub mod pipeline;

pub use pipeline::{from_fn, FromFn, Middleware, MiddlewarePipeline, MiddlewareRef, Next, Terminal};
