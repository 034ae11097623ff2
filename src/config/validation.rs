//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Every route template and constraint compiles
//! - Validate value ranges (timeouts > 0, rate limits > 0, addresses parse)
//! - Report duplicate route names (warning only, last one wins)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::RouterConfig;
use crate::error::RouterError;

/// One semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `routes[2].rate_limit`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a parsed configuration.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.observability.rate_window_sweep_secs == 0 {
        errors.push(ValidationError::new(
            "observability.rate_window_sweep_secs",
            "must be greater than 0",
        ));
    }

    for (alias, target) in &config.middleware.aliases {
        if target.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("middleware.aliases.{}", alias),
                "target is empty",
            ));
        }
    }

    validate_routes(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_routes(config: &RouterConfig, errors: &mut Vec<ValidationError>) {
    let mut names = HashSet::new();

    for (i, route) in config.routes.iter().enumerate() {
        let field = format!("routes[{}]", i);

        if route.handler.trim().is_empty() {
            errors.push(ValidationError::new(format!("{}.handler", field), "is empty"));
        }

        match route.clone().compile() {
            Ok(_) => {}
            Err(RouterError::InvalidRateLimit { reason, .. }) => {
                errors.push(ValidationError::new(format!("{}.rate_limit", field), reason));
            }
            Err(e) => {
                errors.push(ValidationError::new(format!("{}.uri", field), e.to_string()));
            }
        }

        if let Some(name) = &route.name {
            if !names.insert(name.as_str()) {
                tracing::warn!(name = %name, route = %field, "Duplicate route name, last one wins");
            }
        }
    }
}
