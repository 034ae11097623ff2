//! Router facade.
//!
//! # Responsibilities
//! - Build the route table, or load it from a snapshot cache
//! - Match (method, path) with the strict priority chain:
//!   exact → dynamic in registration order → wrong method → not found
//! - Run globals + route middleware around rate check and dispatch
//! - Convert every failure into a reply at the top-level `run`
//! - Publish replacement tables atomically on reload
//!
//! # Design Decisions
//! - The live table is never mutated; reload builds a new one and swaps it in
//! - Rate limiting runs innermost so authentication middleware can set the
//!   user identity first
//! - A cache snapshot that cannot be read is rebuilt, never fatal

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use uuid::Uuid;

use crate::config::RouterConfig;
use crate::context::{Reply, RequestContext};
use crate::dispatch::{Args, Container, DependencyKey, Dispatcher, ParamSpec, Provider};
use crate::error::{HandlerError, NamedRouteError, RouterError};
use crate::http::response::{error_reply, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING};
use crate::middleware::builtin::{BearerGuard, RequestLogger};
use crate::middleware::{Middleware, MiddlewarePipeline, MiddlewareRef};
use crate::observability::metrics;
use crate::routing::{
    normalize_path, url, CompiledRoute, Method, PathParams, RouteDeclaration, RouteGroup,
    RouteTable,
};
use crate::security::rate_limit::{self, RateOutcome, RateWindow};

/// Registry name of the request logging middleware.
pub const REQUEST_LOGGER: &str = "request_logger";
/// Registry name of the bearer-token guard.
pub const BEARER_GUARD: &str = "bearer";

/// A successful match.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<CompiledRoute>,
    pub params: PathParams,
}

pub struct Router {
    table: ArcSwap<RouteTable>,
    pipeline: MiddlewarePipeline,
    dispatcher: Dispatcher,
    limiter: Arc<RateWindow>,
    cache_path: Option<PathBuf>,
    debug: bool,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.table.load().len())
            .field("cache_path", &self.cache_path)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Resolve `(method, uri)` to a route and its captured parameters.
    pub fn match_route(&self, method: &str, uri: &str) -> Result<RouteMatch, RouterError> {
        let path = normalize_path(uri);
        let guard = self.table.load();
        let table: &RouteTable = &guard;

        let not_routable = |table: &RouteTable| {
            if table.path_exists_for_any_method(&path) {
                RouterError::MethodNotAllowed {
                    method: method.to_ascii_uppercase(),
                    path: path.clone(),
                    allowed: table.allowed_methods(&path),
                }
            } else {
                RouterError::RouteNotFound {
                    method: method.to_ascii_uppercase(),
                    path: path.clone(),
                }
            }
        };

        let Ok(method) = method.parse::<Method>() else {
            return Err(not_routable(table));
        };

        if let Some(route) = table.find_exact(method, &path) {
            return Ok(RouteMatch {
                route: Arc::clone(route),
                params: PathParams::new(),
            });
        }

        for route in table.find_dynamic(method) {
            if let Some(params) = route.matcher().and_then(|m| m.captures(&path)) {
                return Ok(RouteMatch {
                    route: Arc::clone(route),
                    params,
                });
            }
        }

        Err(not_routable(table))
    }

    /// Match, then run middleware, rate check and handler.
    pub fn handle(&self, ctx: &mut RequestContext) -> Result<Reply, RouterError> {
        let matched = self.match_route(&ctx.method, &ctx.path)?;
        self.execute(matched, ctx)
    }

    fn execute(&self, matched: RouteMatch, ctx: &mut RequestContext) -> Result<Reply, RouterError> {
        let RouteMatch { route, params } = matched;
        ctx.params = params;

        tracing::debug!(
            route = %route.discriminator(),
            handler = %route.handler(),
            params = ?ctx.params,
            "Route matched"
        );

        let terminal = |ctx: &mut RequestContext| -> Result<Reply, RouterError> {
            let outcome = rate_limit::enforce(&self.limiter, &route, ctx)?;
            let reply = self.dispatcher.dispatch(route.handler(), &ctx.params, ctx)?;
            Ok(decorate(reply, &route, outcome))
        };

        self.pipeline.execute(route.middleware(), ctx, &terminal)
    }

    /// Top-level entry point: never fails, every error becomes a reply.
    pub fn run(&self, mut ctx: RequestContext) -> Reply {
        let start = Instant::now();
        if ctx.request_id.is_none() {
            ctx.request_id = Some(Uuid::new_v4().to_string());
        }

        let (label, result) = match self.match_route(&ctx.method, &ctx.path) {
            Ok(matched) => {
                let label = matched.route.discriminator();
                (label, self.execute(matched, &mut ctx))
            }
            Err(e) => ("unmatched".to_string(), Err(e)),
        };

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                let status = e.status_code();
                if status.is_server_error() {
                    tracing::error!(
                        request_id = ctx.request_id.as_deref().unwrap_or("-"),
                        method = %ctx.method,
                        path = %ctx.path,
                        error = %e,
                        "Request failed"
                    );
                } else {
                    tracing::debug!(method = %ctx.method, path = %ctx.path, error = %e, "Request rejected");
                }
                error_reply(&e, self.debug)
            }
        };

        metrics::record_request(&ctx.method, reply.status, &label, start);
        reply
    }

    /// Reverse URL lookup for a named route.
    pub fn url<I, K, V>(&self, name: &str, params: I) -> Result<String, NamedRouteError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        let params: BTreeMap<String, String> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.to_string()))
            .collect();
        let table = self.table.load();
        let route = table
            .find_by_name(name)
            .ok_or_else(|| NamedRouteError::UnknownName(name.to_string()))?;
        url::generate(route, &params)
    }

    /// Currently published table.
    pub fn table(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    pub fn rate_window(&self) -> &Arc<RateWindow> {
        &self.limiter
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Publish a fully built table. In-flight requests keep the old one.
    pub fn swap_table(&self, table: RouteTable) {
        let size = table.len();
        self.table.store(Arc::new(table));
        metrics::record_route_table_size(size);
        tracing::info!(routes = size, "Route table published");
    }

    /// Rebuild from declarations, refresh the snapshot and publish.
    ///
    /// On error the current table stays live.
    pub fn reload(
        &self,
        declarations: impl IntoIterator<Item = RouteDeclaration>,
    ) -> Result<usize, RouterError> {
        let table = RouteTable::from_declarations(declarations)?;
        if let Some(path) = &self.cache_path {
            write_snapshot(path, &table);
        }
        let size = table.len();
        self.swap_table(table);
        Ok(size)
    }
}

/// Add rate-limit and cache-policy headers to successful replies.
fn decorate(mut reply: Reply, route: &CompiledRoute, outcome: Option<RateOutcome>) -> Reply {
    if !(200..300).contains(&reply.status) {
        return reply;
    }

    if let Some(outcome) = outcome {
        reply
            .headers
            .insert(X_RATELIMIT_LIMIT.to_string(), outcome.limit.to_string());
        reply
            .headers
            .insert(X_RATELIMIT_REMAINING.to_string(), outcome.remaining.to_string());
    }

    if let Some(policy) = route.cache_policy() {
        reply
            .headers
            .entry("Cache-Control".to_string())
            .or_insert_with(|| format!("max-age={}", policy.ttl_secs));
        if !policy.vary.is_empty() {
            reply.headers.insert("Vary".to_string(), policy.vary.join(", "));
        }
        if !policy.tags.is_empty() {
            reply.headers.insert("X-Cache-Tags".to_string(), policy.tags.join(","));
        }
    }
    reply
}

/// Delete a snapshot file. Missing files are not an error.
pub fn clear_cache(path: &Path) -> Result<bool, RouterError> {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::info!(path = ?path, "Route cache cleared");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(RouterError::Cache(e.to_string())),
    }
}

fn load_snapshot(path: &Path) -> Option<RouteTable> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "Cannot read route cache, rebuilding");
            return None;
        }
    };
    match RouteTable::deserialize(&bytes) {
        Ok(table) => {
            tracing::info!(path = ?path, routes = table.len(), "Route table loaded from cache");
            Some(table)
        }
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "Stale or corrupt route cache, rebuilding");
            None
        }
    }
}

/// Writes to a sibling temp file, then renames it into place.
fn write_snapshot(path: &Path, table: &RouteTable) {
    let result = table.serialize().and_then(|bytes| {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)
            .and_then(|()| fs::rename(&tmp, path))
            .map_err(|e| RouterError::Cache(e.to_string()))
    });
    match result {
        Ok(()) => tracing::debug!(path = ?path, "Route cache written"),
        Err(e) => tracing::warn!(path = ?path, error = %e, "Failed to write route cache"),
    }
}

/// Assembles declarations, middleware, handlers and dependencies.
#[derive(Default)]
pub struct RouterBuilder {
    declarations: Vec<RouteDeclaration>,
    pipeline: MiddlewarePipeline,
    dispatcher: Dispatcher,
    limiter: Option<Arc<RateWindow>>,
    cache_path: Option<PathBuf>,
    debug: bool,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a loaded config: routes, globals, aliases, built-in middleware,
    /// cache and debug flag.
    pub fn configure(mut self, config: &RouterConfig) -> Self {
        self.pipeline
            .register(REQUEST_LOGGER, Arc::new(RequestLogger));
        self.pipeline.register(
            BEARER_GUARD,
            Arc::new(BearerGuard::from_scopes(config.middleware.bearer.clone())),
        );
        for global in &config.middleware.global {
            self.pipeline.add_global(global.as_str());
        }
        for (name, target) in &config.middleware.aliases {
            self.pipeline.alias(name.as_str(), target.as_str());
        }
        self.declarations.extend(config.routes.iter().cloned());
        self.cache_path = config.cache.snapshot_path().cloned();
        self.debug = config.debug;
        self
    }

    pub fn route(mut self, declaration: RouteDeclaration) -> Self {
        self.declarations.push(declaration);
        self
    }

    pub fn routes(mut self, declarations: impl IntoIterator<Item = RouteDeclaration>) -> Self {
        self.declarations.extend(declarations);
        self
    }

    pub fn group(mut self, group: RouteGroup) -> Self {
        self.declarations.extend(group.into_declarations());
        self
    }

    pub fn handler<F>(mut self, name: impl Into<String>, params: Vec<ParamSpec>, handler: F) -> Self
    where
        F: Fn(&Args, &RequestContext) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        self.dispatcher.register(name, params, handler);
        self
    }

    pub fn middleware(mut self, name: impl Into<String>, middleware: impl Middleware + 'static) -> Self {
        self.pipeline.register(name, Arc::new(middleware));
        self
    }

    pub fn alias(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.pipeline.alias(name, target);
        self
    }

    pub fn global(mut self, middleware: impl Into<MiddlewareRef>) -> Self {
        self.pipeline.add_global(middleware);
        self
    }

    pub fn bind(mut self, key: DependencyKey, provider: Provider) -> Self {
        self.dispatcher.container_mut().bind(key, provider);
        self
    }

    pub fn instance<T: std::any::Any + Send + Sync>(mut self, value: T) -> Self {
        self.dispatcher.container_mut().instance(value);
        self
    }

    pub fn container(mut self, container: Container) -> Self {
        *self.dispatcher.container_mut() = container;
        self
    }

    /// Share a rate window (e.g. one driven by a manual clock in tests).
    pub fn rate_window(mut self, window: Arc<RateWindow>) -> Self {
        self.limiter = Some(window);
        self
    }

    /// Load the table from this snapshot when present, write it after a build.
    pub fn cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Build or load the table and assemble the router.
    pub fn build(self) -> Result<Router, RouterError> {
        let cached = self.cache_path.as_deref().and_then(load_snapshot);
        let table = match cached {
            Some(table) => table,
            None => {
                let table = RouteTable::from_declarations(self.declarations)?;
                if let Some(path) = &self.cache_path {
                    write_snapshot(path, &table);
                }
                table
            }
        };

        metrics::record_route_table_size(table.len());
        tracing::info!(
            routes = table.len(),
            handlers_missing = table
                .all()
                .iter()
                .filter(|r| !self.dispatcher.contains(r.handler()))
                .count(),
            "Router built"
        );

        Ok(Router {
            table: ArcSwap::from_pointee(table),
            pipeline: self.pipeline,
            dispatcher: self.dispatcher,
            limiter: self
                .limiter
                .unwrap_or_else(|| Arc::new(RateWindow::new())),
            cache_path: self.cache_path,
            debug: self.debug,
        })
    }
}
