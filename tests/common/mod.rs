//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use routekit::config::{parse_config, RouterConfig};
use routekit::{HttpServer, Router, Shutdown};
use tokio::net::TcpListener;

/// A config exercising routes, groups of middleware, aliases and limits.
#[allow(dead_code)]
pub const SAMPLE_CONFIG: &str = r#"
debug = false

[middleware]
global = ["request_logger"]

[middleware.aliases]
auth = "bearer"

[middleware.bearer.api]
token-1 = "user-1"
token-2 = "user-2"

[[routes]]
method = "GET"
uri = "/health"
handler = "health"
name = "health"

[[routes]]
method = "GET"
uri = "/users/new"
handler = "users.create_form"

[[routes]]
method = "GET"
uri = "/users/{id}"
handler = "users.show"
name = "users.show"
constraints = { id = '\d+' }

[[routes]]
method = "POST"
uri = "/users"
handler = "users.store"
name = "users.store"

[[routes]]
method = "GET"
uri = "/me"
handler = "me"
middleware = ["auth:api"]
rate_limit = { ceiling = 2, window_secs = 60, key = "user_id" }
"#;

#[allow(dead_code)]
pub fn sample_config() -> RouterConfig {
    parse_config(SAMPLE_CONFIG).unwrap()
}

/// Serve `router` on an ephemeral port. Trigger the returned [`Shutdown`] to stop.
#[allow(dead_code)]
pub async fn start_server(router: Arc<Router>, config: &RouterConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = HttpServer::new(router, config);
    let signal = shutdown.signalled();
    tokio::spawn(async move {
        let _ = server.run(listener, signal).await;
    });

    (addr, shutdown)
}
