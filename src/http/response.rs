//! Response rendering.
//!
//! # Responsibilities
//! - Map router errors to status codes and headers (404, 405 + Allow,
//!   429 + rate-limit headers, 500)
//! - Convert a [`Reply`] into an axum response
//!
//! # Design Decisions
//! - 500 bodies are generic unless debug is enabled
//! - String bodies are sent as text, everything else as JSON

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

use crate::context::Reply;
use crate::error::RouterError;

pub const X_RATELIMIT_LIMIT: &str = "X-RateLimit-Limit";
pub const X_RATELIMIT_REMAINING: &str = "X-RateLimit-Remaining";
pub const X_RATELIMIT_RESET: &str = "X-RateLimit-Reset";

/// Render a router error as a reply. Detail is only exposed when `debug`.
pub fn error_reply(err: &RouterError, debug: bool) -> Reply {
    let status = err.status_code();
    let reason = status.canonical_reason().unwrap_or("Error");

    match err {
        RouterError::RouteNotFound { .. } => Reply::new(status.as_u16(), json!({ "error": reason })),
        RouterError::MethodNotAllowed { allowed, .. } => {
            let allow = allowed
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            Reply::new(status.as_u16(), json!({ "error": reason })).with_header("Allow", allow)
        }
        RouterError::RateLimitExceeded {
            limit,
            retry_after_secs,
            reset_at,
        } => Reply::new(
            status.as_u16(),
            json!({ "error": reason, "retry_after": retry_after_secs }),
        )
        .with_header(X_RATELIMIT_LIMIT, limit)
        .with_header(X_RATELIMIT_REMAINING, 0)
        .with_header(X_RATELIMIT_RESET, reset_at)
        .with_header("Retry-After", retry_after_secs),
        other => {
            let body = if debug {
                json!({ "error": reason, "detail": other.to_string() })
            } else {
                json!({ "error": reason })
            };
            Reply::new(status.as_u16(), body)
        }
    }
}

/// Convert a reply into an HTTP response.
pub fn into_response(reply: Reply) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = match reply.body {
        Value::Null => status.into_response(),
        Value::String(text) => (status, text).into_response(),
        body => match serde_json::to_vec(&body) {
            Ok(bytes) => (
                status,
                [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                Body::from(bytes),
            )
                .into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode reply body");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
    };

    for (name, value) in reply.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping invalid reply header"),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Method;

    #[test]
    fn test_method_not_allowed_lists_methods() {
        let err = RouterError::MethodNotAllowed {
            method: "DELETE".into(),
            path: "/users".into(),
            allowed: vec![Method::Get, Method::Post],
        };
        let reply = error_reply(&err, false);
        assert_eq!(reply.status, 405);
        assert_eq!(reply.headers["Allow"], "GET, POST");
    }

    #[test]
    fn test_rate_limit_headers() {
        let err = RouterError::RateLimitExceeded {
            limit: 3,
            retry_after_secs: 45,
            reset_at: 1_060,
        };
        let reply = error_reply(&err, false);
        assert_eq!(reply.status, 429);
        assert_eq!(reply.headers[X_RATELIMIT_LIMIT], "3");
        assert_eq!(reply.headers[X_RATELIMIT_REMAINING], "0");
        assert_eq!(reply.headers[X_RATELIMIT_RESET], "1060");
        assert_eq!(reply.headers["Retry-After"], "45");
    }

    #[test]
    fn test_internal_detail_only_in_debug() {
        let err = RouterError::HandlerResolution("users.show".into());

        let reply = error_reply(&err, false);
        assert_eq!(reply.status, 500);
        assert_eq!(reply.body, json!({ "error": "Internal Server Error" }));

        let reply = error_reply(&err, true);
        assert_eq!(reply.body["detail"], "cannot resolve handler `users.show`");
    }

    #[test]
    fn test_into_response() {
        let reply = Reply::ok(json!({ "id": 1 })).with_header("X-Custom", "yes");
        let response = into_response(reply);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(response.headers()["x-custom"], "yes");

        let response = into_response(Reply::default());
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
