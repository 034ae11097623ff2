//! Stock middleware.

use std::collections::HashMap;
use std::time::Instant;

use crate::context::{Reply, RequestContext};
use crate::error::RouterError;
use crate::middleware::pipeline::{Middleware, Next};

/// Scope used when a guard reference carries no `:param`.
pub const DEFAULT_SCOPE: &str = "default";

/// Logs every request that passes through, with status and latency.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestLogger;

impl Middleware for RequestLogger {
    fn handle(
        &self,
        ctx: &mut RequestContext,
        _param: Option<&str>,
        next: Next<'_>,
    ) -> Result<Reply, RouterError> {
        let start = Instant::now();
        let method = ctx.method.clone();
        let path = ctx.path.clone();
        let result = next.run(ctx);

        match &result {
            Ok(reply) => tracing::info!(
                request_id = ctx.request_id.as_deref().unwrap_or("-"),
                method = %method,
                path = %path,
                status = reply.status,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Request handled"
            ),
            Err(e) => tracing::info!(
                request_id = ctx.request_id.as_deref().unwrap_or("-"),
                method = %method,
                path = %path,
                status = e.status_code().as_u16(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Request failed"
            ),
        }
        result
    }
}

/// Bearer-token guard. The reference parameter selects the token scope
/// (`auth:api` checks the `api` scope). On success the token's user id is
/// stored on the context; on failure the chain stops with 401.
#[derive(Debug, Default, Clone)]
pub struct BearerGuard {
    /// scope -> token -> user id
    scopes: HashMap<String, HashMap<String, String>>,
}

impl BearerGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_scopes(scopes: HashMap<String, HashMap<String, String>>) -> Self {
        Self { scopes }
    }

    pub fn token(
        mut self,
        scope: impl Into<String>,
        token: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        self.scopes
            .entry(scope.into())
            .or_default()
            .insert(token.into(), user_id.into());
        self
    }

    fn authenticate(&self, scope: &str, ctx: &RequestContext) -> Option<String> {
        let token = ctx.header("authorization")?.strip_prefix("Bearer ")?;
        self.scopes.get(scope)?.get(token.trim()).cloned()
    }
}

impl Middleware for BearerGuard {
    fn handle(
        &self,
        ctx: &mut RequestContext,
        param: Option<&str>,
        next: Next<'_>,
    ) -> Result<Reply, RouterError> {
        let scope = param.unwrap_or(DEFAULT_SCOPE);
        match self.authenticate(scope, ctx) {
            Some(user_id) => {
                ctx.user_id = Some(user_id);
                next.run(ctx)
            }
            None => {
                tracing::warn!(scope = %scope, path = %ctx.path, "Bearer authentication failed");
                Ok(Reply::text(401, "Unauthorized").with_header("WWW-Authenticate", "Bearer"))
            }
        }
    }
}
