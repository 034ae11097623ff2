//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build router (or load cache) → Start listener
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C → trigger → server drains, watcher and sweep tasks stop → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then routes, then listener
//! - Listener starts last (traffic only when the table is published)

pub mod shutdown;

pub use shutdown::Shutdown;
