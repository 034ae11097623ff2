//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, trace)
//!     → server.rs (axum request → RequestContext: query, headers, body, client IP)
//!     → Router::run (match → middleware → rate check → dispatch)
//!     → response.rs (Reply → HTTP response; errors already rendered as replies)
//!     → Send to client
//! ```

pub mod response;
pub mod server;

pub use response::{error_reply, into_response};
pub use server::{HttpServer, X_REQUEST_ID};
