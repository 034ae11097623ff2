//! Onion-style middleware composition.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::context::{Reply, RequestContext};
use crate::error::RouterError;

/// Alias chains longer than this are treated as cycles.
const MAX_ALIAS_DEPTH: usize = 16;

/// A layer around the handler.
///
/// `param` is the suffix of a `name:param` reference, if any. Calling
/// `next.run(ctx)` continues the chain; returning without calling it
/// short-circuits with the returned reply.
pub trait Middleware: Send + Sync {
    fn handle(
        &self,
        ctx: &mut RequestContext,
        param: Option<&str>,
        next: Next<'_>,
    ) -> Result<Reply, RouterError>;
}

/// Middleware built from a closure. See [`from_fn`].
pub struct FromFn<F>(F);

/// Wrap a closure as [`Middleware`].
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: Fn(&mut RequestContext, Option<&str>, Next<'_>) -> Result<Reply, RouterError>
        + Send
        + Sync,
{
    FromFn(f)
}

impl<F> Middleware for FromFn<F>
where
    F: Fn(&mut RequestContext, Option<&str>, Next<'_>) -> Result<Reply, RouterError>
        + Send
        + Sync,
{
    fn handle(
        &self,
        ctx: &mut RequestContext,
        param: Option<&str>,
        next: Next<'_>,
    ) -> Result<Reply, RouterError> {
        (self.0)(ctx, param, next)
    }
}

/// Either a name resolved through the alias/registry tables, or a
/// middleware handed over directly.
#[derive(Clone)]
pub enum MiddlewareRef {
    Named(String),
    Direct(Arc<dyn Middleware>),
}

impl MiddlewareRef {
    pub fn direct(middleware: impl Middleware + 'static) -> Self {
        MiddlewareRef::Direct(Arc::new(middleware))
    }
}

impl fmt::Debug for MiddlewareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiddlewareRef::Named(name) => f.debug_tuple("Named").field(name).finish(),
            MiddlewareRef::Direct(_) => f.write_str("Direct(..)"),
        }
    }
}

impl From<&str> for MiddlewareRef {
    fn from(name: &str) -> Self {
        MiddlewareRef::Named(name.to_string())
    }
}

impl From<String> for MiddlewareRef {
    fn from(name: String) -> Self {
        MiddlewareRef::Named(name)
    }
}

/// A resolved layer ready to run.
struct Layer {
    middleware: Arc<dyn Middleware>,
    param: Option<String>,
}

/// The innermost step of a chain.
pub type Terminal<'a> = &'a dyn Fn(&mut RequestContext) -> Result<Reply, RouterError>;

/// Continuation handed to each middleware.
pub struct Next<'a> {
    layers: &'a [Layer],
    terminal: Terminal<'a>,
}

impl Next<'_> {
    /// Run the rest of the chain.
    pub fn run(self, ctx: &mut RequestContext) -> Result<Reply, RouterError> {
        match self.layers.split_first() {
            Some((layer, rest)) => layer.middleware.handle(
                ctx,
                layer.param.as_deref(),
                Next {
                    layers: rest,
                    terminal: self.terminal,
                },
            ),
            None => (self.terminal)(ctx),
        }
    }
}

/// Global middleware, aliases and the registry of named middleware.
#[derive(Default)]
pub struct MiddlewarePipeline {
    globals: Vec<MiddlewareRef>,
    aliases: HashMap<String, String>,
    registry: HashMap<String, Arc<dyn Middleware>>,
}

impl MiddlewarePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register middleware under an identity.
    pub fn register(&mut self, name: impl Into<String>, middleware: Arc<dyn Middleware>) {
        self.registry.insert(name.into(), middleware);
    }

    /// Append to the global list. Globals wrap every route, in order.
    pub fn add_global(&mut self, middleware: impl Into<MiddlewareRef>) {
        self.globals.push(middleware.into());
    }

    /// Map a short name to a registered identity (or another alias).
    /// The target may carry a default `:param`.
    pub fn alias(&mut self, name: impl Into<String>, target: impl Into<String>) {
        self.aliases.insert(name.into(), target.into());
    }

    pub fn globals(&self) -> &[MiddlewareRef] {
        &self.globals
    }

    /// Run `globals ++ route_refs` around `terminal`.
    pub fn execute(
        &self,
        route_refs: &[String],
        ctx: &mut RequestContext,
        terminal: Terminal<'_>,
    ) -> Result<Reply, RouterError> {
        let mut layers = Vec::with_capacity(self.globals.len() + route_refs.len());
        for global in &self.globals {
            layers.push(self.resolve(global)?);
        }
        for reference in route_refs {
            layers.push(self.resolve_named(reference)?);
        }

        Next {
            layers: &layers,
            terminal,
        }
        .run(ctx)
    }

    fn resolve(&self, reference: &MiddlewareRef) -> Result<Layer, RouterError> {
        match reference {
            MiddlewareRef::Named(name) => self.resolve_named(name),
            MiddlewareRef::Direct(middleware) => Ok(Layer {
                middleware: middleware.clone(),
                param: None,
            }),
        }
    }

    fn resolve_named(&self, reference: &str) -> Result<Layer, RouterError> {
        let (mut name, mut param) = split_param(reference);

        for _ in 0..MAX_ALIAS_DEPTH {
            let Some(target) = self.aliases.get(name) else {
                break;
            };
            let (target_name, target_param) = split_param(target);
            name = target_name;
            param = param.or(target_param);
        }

        let middleware = self
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| RouterError::MiddlewareResolution(reference.to_string()))?;

        tracing::trace!(reference = %reference, resolved = %name, "Middleware resolved");
        Ok(Layer {
            middleware,
            param: param.map(str::to_string),
        })
    }
}

fn split_param(reference: &str) -> (&str, Option<&str>) {
    match reference.split_once(':') {
        Some((name, param)) => (name, Some(param)),
        None => (reference, None),
    }
}
