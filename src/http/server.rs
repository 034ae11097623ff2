//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum app with a single catch-all handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Convert each request into a [`RequestContext`] and hand it to the router
//! - Bind server to listener with graceful shutdown

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    Router as AxumRouter,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::RouterConfig;
use crate::context::RequestContext;
use crate::http::response::into_response;
use crate::router::Router;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Largest request body read into the context.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// HTTP front end for a [`Router`].
pub struct HttpServer {
    app: AxumRouter,
}

impl HttpServer {
    pub fn new(router: Arc<Router>, config: &RouterConfig) -> Self {
        let app = Self::build_router(router, Duration::from_secs(config.timeouts.request_secs));
        Self { app }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(router: Arc<Router>, timeout: Duration) -> AxumRouter {
        AxumRouter::new()
            .fallback(route_request)
            .with_state(router)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(timeout))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The assembled app, for embedding or in-process testing.
    pub fn into_router(self) -> AxumRouter {
        self.app
    }

    /// Serve until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.app.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: every request goes through the routekit router.
async fn route_request(State(router): State<Arc<Router>>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();

    let uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let mut ctx = RequestContext::new(parts.method.as_str(), uri);

    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            ctx.headers.insert(name.as_str().to_string(), value.to_string());
        }
    }
    ctx.request_id = ctx.header(X_REQUEST_ID).map(str::to_string);
    ctx.client_ip = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };
    let content_type = ctx.header(header::CONTENT_TYPE.as_str()).unwrap_or("").to_string();
    ctx.body = parse_body(&content_type, &bytes);

    // Middleware and handlers are synchronous; keep them off the async workers.
    match tokio::task::spawn_blocking(move || router.run(ctx)).await {
        Ok(reply) => into_response(reply),
        Err(e) => {
            tracing::error!(error = %e, "Request task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Body parameters from a JSON object or a urlencoded form.
fn parse_body(content_type: &str, bytes: &[u8]) -> HashMap<String, Value> {
    if bytes.is_empty() {
        return HashMap::new();
    }
    if content_type.starts_with("application/json") {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(fields)) => fields.into_iter().collect(),
            Ok(_) => HashMap::new(),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring malformed JSON body");
                HashMap::new()
            }
        }
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        url::form_urlencoded::parse(bytes)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect()
    } else {
        HashMap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Reply;
    use crate::dispatch::ParamSpec;
    use crate::routing::RouteDeclaration;
    use serde_json::json;
    use tower::ServiceExt;

    fn app() -> AxumRouter {
        let router = Router::builder()
            .route(RouteDeclaration::get("/users/{id}", "users.show").where_param("id", r"\d+"))
            .route(RouteDeclaration::post("/users", "users.store"))
            .handler("users.show", vec![ParamSpec::int("id")], |args, ctx| {
                Ok(Reply::ok(json!({ "id": args.int("id")?, "request_id": ctx.request_id })))
            })
            .handler("users.store", vec![ParamSpec::string("name")], |args, _ctx| {
                Ok(Reply::new(201, json!({ "name": args.str("name")? })))
            })
            .build()
            .unwrap();
        HttpServer::new(Arc::new(router), &RouterConfig::default()).into_router()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_parse_body() {
        let json = parse_body("application/json", br#"{"a": 1}"#);
        assert_eq!(json["a"], json!(1));

        let form = parse_body("application/x-www-form-urlencoded", b"name=ada&lang=rust");
        assert_eq!(form["name"], json!("ada"));

        assert!(parse_body("text/plain", b"hello").is_empty());
        assert!(parse_body("application/json", b"[1,2]").is_empty());
    }

    #[tokio::test]
    async fn test_matched_route_gets_request_id() {
        let response = app()
            .oneshot(Request::get("/users/5").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let request_id = response.headers()[X_REQUEST_ID].to_str().unwrap().to_string();
        let body = body_json(response).await;
        assert_eq!(body["id"], json!(5));
        assert_eq!(body["request_id"], json!(request_id));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let response = app()
            .oneshot(Request::get("/users/abc").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app()
            .oneshot(Request::delete("/users").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "POST");
    }

    #[tokio::test]
    async fn test_form_body_reaches_handler() {
        let request = Request::post("/users")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("name=grace"))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await, json!({ "name": "grace" }));
    }
}
