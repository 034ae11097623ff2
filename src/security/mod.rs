//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Matched request (after route middleware):
//!     → rate_limit.rs (identity = route discriminator + partition value)
//!     → fixed-window check against the route's ceiling
//!     → Pass to dispatch, or reject with 429
//! ```
//!
//! # Design Decisions
//! - Per-key atomic check-then-increment; no lost updates under concurrency
//! - Limits are isolated per route
//! - Expired windows are swept in the background; correctness never depends
//!   on the sweep

pub mod rate_limit;

pub use rate_limit::{Clock, ManualClock, RateOutcome, RateWindow, SystemClock};
