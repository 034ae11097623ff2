//! Router error taxonomy.
//!
//! # Design Decisions
//! - Per-request conditions (not found, wrong method, rate limited) are typed
//!   variants so the HTTP layer can map them 1:1 to status codes
//! - Build-time failures (bad template, bad constraint) abort table construction
//! - Handler failures carry the handler's own error as an opaque source

use axum::http::StatusCode;

use crate::routing::Method;

/// Error produced by a handler. Opaque to the router.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while building the route table or serving a request.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// No route structurally matches the path under any method.
    #[error("no route for {method} {path}")]
    RouteNotFound { method: String, path: String },

    /// The path exists, but not for the requested method.
    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed {
        method: String,
        path: String,
        allowed: Vec<Method>,
    },

    /// The fixed window for this identity is exhausted.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded {
        limit: u32,
        retry_after_secs: u64,
        reset_at: u64,
    },

    #[error("cannot resolve middleware `{0}`")]
    MiddlewareResolution(String),

    #[error("cannot resolve handler `{0}`")]
    HandlerResolution(String),

    #[error("cannot resolve parameter `{name}`: {reason}")]
    ParameterResolution { name: String, reason: String },

    /// Malformed URI template or constraint regex.
    #[error("cannot compile pattern `{template}`: {reason}")]
    PatternCompilation { template: String, reason: String },

    /// Rate limit with a zero ceiling or window.
    #[error("invalid rate limit on `{template}`: {reason}")]
    InvalidRateLimit { template: String, reason: String },

    #[error("named route error: {0}")]
    NamedRoute(#[from] NamedRouteError),

    #[error("handler failed: {0}")]
    Handler(#[source] HandlerError),

    #[error("route cache error: {0}")]
    Cache(String),
}

/// Reverse URL lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NamedRouteError {
    #[error("no route named `{0}`")]
    UnknownName(String),

    #[error("route `{route}` requires parameter `{param}`")]
    MissingParameter { route: String, param: String },

    #[error("value `{value}` for parameter `{param}` of route `{route}` violates its constraint")]
    ConstraintViolation {
        route: String,
        param: String,
        value: String,
    },
}

impl RouterError {
    /// HTTP status the HTTP-facing layer renders for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RouterError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            RouterError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            RouterError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        RouterError::ParameterResolution {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
