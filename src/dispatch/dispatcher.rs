//! Handler registry and argument resolution.
//!
//! Every formal parameter is resolved in this order:
//! 1. path parameter with the same name, coerced to the declared kind
//! 2. dependency from the [`Container`] (dependency kinds only)
//! 3. declared default
//! 4. query/body input with the same name, coerced
//! 5. otherwise [`RouterError::ParameterResolution`]

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::context::{Reply, RequestContext};
use crate::dispatch::args::{coerce, ArgValue, Args, ParamKind, ParamSpec};
use crate::dispatch::container::Container;
use crate::error::{HandlerError, RouterError};
use crate::routing::PathParams;

/// Handler callable. Receives resolved arguments plus the request context.
pub type HandlerFn = Arc<dyn Fn(&Args, &RequestContext) -> Result<Reply, HandlerError> + Send + Sync>;

/// A registered handler and its declared signature.
#[derive(Clone)]
pub struct Handler {
    params: Vec<ParamSpec>,
    call: HandlerFn,
}

impl Handler {
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default, Clone)]
pub struct Dispatcher {
    handlers: HashMap<String, Handler>,
    container: Container,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container(container: Container) -> Self {
        Self {
            handlers: HashMap::new(),
            container,
        }
    }

    /// Register a handler under `name` with its parameter signature.
    pub fn register<F>(&mut self, name: impl Into<String>, params: Vec<ParamSpec>, handler: F)
    where
        F: Fn(&Args, &RequestContext) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(handler = %name, params = params.len(), "Handler registered");
        self.handlers.insert(
            name,
            Handler {
                params,
                call: Arc::new(handler),
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    /// Resolve the handler's arguments and invoke it.
    pub fn dispatch(
        &self,
        handler_ref: &str,
        params: &PathParams,
        ctx: &RequestContext,
    ) -> Result<Reply, RouterError> {
        let handler = self
            .handlers
            .get(handler_ref)
            .ok_or_else(|| RouterError::HandlerResolution(handler_ref.to_string()))?;

        let args = self.resolve_args(handler.params(), params, ctx)?;
        (handler.call)(&args, ctx).map_err(RouterError::Handler)
    }

    fn resolve_args(
        &self,
        specs: &[ParamSpec],
        params: &PathParams,
        ctx: &RequestContext,
    ) -> Result<Args, RouterError> {
        let mut args = Args::default();
        for spec in specs {
            let value = self.resolve_one(spec, params, ctx)?;
            args.push(spec.name.clone(), value);
        }
        Ok(args)
    }

    fn resolve_one(
        &self,
        spec: &ParamSpec,
        params: &PathParams,
        ctx: &RequestContext,
    ) -> Result<ArgValue, RouterError> {
        if let ParamKind::Dependency(key) = spec.kind {
            if let Some(dep) = self.container.resolve(&key) {
                return Ok(ArgValue::Dependency(dep));
            }
            return spec.default.clone().ok_or_else(|| {
                RouterError::parameter(
                    &spec.name,
                    format!("no provider bound for `{}`", key.type_name()),
                )
            });
        }

        if let Some(raw) = params.get(&spec.name) {
            return coerce(spec.kind, &Value::String(raw.clone()))
                .map_err(|reason| RouterError::parameter(&spec.name, reason));
        }

        if let Some(default) = &spec.default {
            return Ok(default.clone());
        }

        match ctx.input(&spec.name) {
            Some(input) => {
                coerce(spec.kind, &input).map_err(|reason| RouterError::parameter(&spec.name, reason))
            }
            None => Err(RouterError::parameter(&spec.name, "no value available")),
        }
    }
}
