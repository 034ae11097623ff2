//! Route declarations and their compiled form.
//!
//! A [`RouteDeclaration`] is what a declaration loader produces (config file,
//! programmatic registration, groups). A [`CompiledRoute`] adds the compiled
//! [`PathPattern`] and is immutable once built.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RouterError;
use crate::routing::matcher::{normalize_path, PathMatcher, PathPattern};

/// HTTP methods a route can be declared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl Method {
    pub const ALL: [Method; 5] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Patch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            other => Err(format!("unsupported method `{}`", other)),
        }
    }
}

impl TryFrom<String> for Method {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Method> for String {
    fn from(method: Method) -> Self {
        method.as_str().to_string()
    }
}

/// Which request attribute partitions a route's rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionKey {
    #[default]
    Ip,
    UserId,
    ApiKey,
}

/// Per-route fixed-window limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSpec {
    /// Maximum attempts per window.
    pub ceiling: u32,
    pub window_secs: u64,
    #[serde(default)]
    pub key: PartitionKey,
}

/// Response caching hints attached to a route.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CachePolicy {
    pub ttl_secs: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub vary: Vec<String>,
    #[serde(default)]
    pub key: Option<String>,
}

/// A route as produced by a declaration loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDeclaration {
    pub method: Method,

    /// URI template, e.g. `/users/{id}`.
    pub uri: String,

    /// Identity of the handler in the dispatcher's registry.
    pub handler: String,

    /// Unique name for reverse URL lookup.
    #[serde(default)]
    pub name: Option<String>,

    /// Placeholder name -> regex fragment.
    #[serde(default)]
    pub constraints: BTreeMap<String, String>,

    /// Middleware identities, declared first then inherited from groups.
    #[serde(default)]
    pub middleware: Vec<String>,

    #[serde(default)]
    pub rate_limit: Option<RateLimitSpec>,

    #[serde(default)]
    pub cache: Option<CachePolicy>,
}

impl RouteDeclaration {
    pub fn new(method: Method, uri: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            handler: handler.into(),
            name: None,
            constraints: BTreeMap::new(),
            middleware: Vec::new(),
            rate_limit: None,
            cache: None,
        }
    }

    pub fn get(uri: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::new(Method::Get, uri, handler)
    }

    pub fn post(uri: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::new(Method::Post, uri, handler)
    }

    pub fn put(uri: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::new(Method::Put, uri, handler)
    }

    pub fn delete(uri: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::new(Method::Delete, uri, handler)
    }

    pub fn patch(uri: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::new(Method::Patch, uri, handler)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Constrain a placeholder to a regex fragment.
    pub fn where_param(mut self, param: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.constraints.insert(param.into(), pattern.into());
        self
    }

    pub fn with_middleware(mut self, middleware: impl Into<String>) -> Self {
        self.middleware.push(middleware.into());
        self
    }

    pub fn with_rate_limit(mut self, ceiling: u32, window_secs: u64, key: PartitionKey) -> Self {
        self.rate_limit = Some(RateLimitSpec {
            ceiling,
            window_secs,
            key,
        });
        self
    }

    pub fn with_cache(mut self, policy: CachePolicy) -> Self {
        self.cache = Some(policy);
        self
    }

    /// Normalize the template, compile its pattern and check its rate limit.
    pub fn compile(mut self) -> Result<CompiledRoute, RouterError> {
        self.uri = normalize_path(&self.uri);
        let pattern = PathPattern::compile(&self.uri, &self.constraints)?;
        if let Some(limit) = &self.rate_limit {
            if limit.ceiling == 0 || limit.window_secs == 0 {
                return Err(RouterError::InvalidRateLimit {
                    template: self.uri.clone(),
                    reason: "ceiling and window_secs must be greater than 0".to_string(),
                });
            }
        }
        Ok(CompiledRoute {
            declaration: self,
            pattern,
        })
    }
}

/// Shared prefix, name prefix and middleware for a set of routes.
///
/// Group middleware is appended after each route's own middleware.
#[derive(Debug, Clone, Default)]
pub struct RouteGroup {
    prefix: String,
    name_prefix: String,
    middleware: Vec<String>,
    routes: Vec<RouteDeclaration>,
}

impl RouteGroup {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    pub fn name_prefix(mut self, name_prefix: impl Into<String>) -> Self {
        self.name_prefix = name_prefix.into();
        self
    }

    pub fn middleware(mut self, middleware: impl Into<String>) -> Self {
        self.middleware.push(middleware.into());
        self
    }

    pub fn route(mut self, route: RouteDeclaration) -> Self {
        self.routes.push(route);
        self
    }

    /// Nest another group; its routes pick up this group's settings too.
    pub fn group(mut self, group: RouteGroup) -> Self {
        self.routes.extend(group.into_declarations());
        self
    }

    pub fn into_declarations(self) -> Vec<RouteDeclaration> {
        let RouteGroup {
            prefix,
            name_prefix,
            middleware,
            routes,
        } = self;

        routes
            .into_iter()
            .map(|mut route| {
                route.uri = normalize_path(&format!("{}/{}", prefix, route.uri));
                route.name = route.name.map(|name| format!("{}{}", name_prefix, name));
                route.middleware.extend(middleware.iter().cloned());
                route
            })
            .collect()
    }
}

/// A declaration with its compiled pattern. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledRoute {
    pub declaration: RouteDeclaration,
    pub pattern: PathPattern,
}

impl CompiledRoute {
    pub fn method(&self) -> Method {
        self.declaration.method
    }

    /// Normalized template.
    pub fn uri(&self) -> &str {
        &self.declaration.uri
    }

    pub fn handler(&self) -> &str {
        &self.declaration.handler
    }

    pub fn name(&self) -> Option<&str> {
        self.declaration.name.as_deref()
    }

    pub fn middleware(&self) -> &[String] {
        &self.declaration.middleware
    }

    pub fn rate_limit(&self) -> Option<&RateLimitSpec> {
        self.declaration.rate_limit.as_ref()
    }

    pub fn cache_policy(&self) -> Option<&CachePolicy> {
        self.declaration.cache.as_ref()
    }

    pub fn is_static(&self) -> bool {
        self.pattern.is_static()
    }

    pub fn matcher(&self) -> Option<&PathMatcher> {
        self.pattern.matcher()
    }

    /// Per-route discriminator used to isolate rate-limit identities.
    ///
    /// Keyed on method and template, since several routes may share a name.
    pub fn discriminator(&self) -> String {
        format!("{} {}", self.method(), self.uri())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse_case_insensitive() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("Patch".parse::<Method>().unwrap(), Method::Patch);
        assert!("TRACE".parse::<Method>().is_err());
    }

    #[test]
    fn test_declaration_from_toml() {
        let decl: RouteDeclaration = toml::from_str(
            r#"
            method = "get"
            uri = "/users/{id}/"
            handler = "users.show"
            name = "users.show"
            constraints = { id = '\d+' }
            middleware = ["auth:api"]
            rate_limit = { ceiling = 10, window_secs = 60, key = "user_id" }
            "#,
        )
        .unwrap();

        assert_eq!(decl.method, Method::Get);
        assert_eq!(decl.constraints["id"], r"\d+");
        assert_eq!(decl.rate_limit.as_ref().unwrap().key, PartitionKey::UserId);

        let route = decl.compile().unwrap();
        assert_eq!(route.uri(), "/users/{id}");
        assert!(!route.is_static());
    }

    #[test]
    fn test_group_applies_prefix_names_and_middleware() {
        let routes = RouteGroup::new("/admin")
            .name_prefix("admin.")
            .middleware("auth")
            .route(
                RouteDeclaration::get("/users", "admin.users")
                    .named("users")
                    .with_middleware("audit"),
            )
            .group(RouteGroup::new("/reports").route(RouteDeclaration::get("/", "reports")))
            .into_declarations();

        assert_eq!(routes[0].uri, "/admin/users");
        assert_eq!(routes[0].name.as_deref(), Some("admin.users"));
        assert_eq!(routes[0].middleware, vec!["audit", "auth"]);

        assert_eq!(routes[1].uri, "/admin/reports");
        assert_eq!(routes[1].middleware, vec!["auth"]);
    }

    #[test]
    fn test_discriminator_ignores_name() {
        let named = RouteDeclaration::get("/a", "h").named("a.index").compile().unwrap();
        assert_eq!(named.discriminator(), "GET /a");

        let same_name = RouteDeclaration::get("/b", "h").named("a.index").compile().unwrap();
        assert_ne!(named.discriminator(), same_name.discriminator());

        let anonymous = RouteDeclaration::post("/a", "h").compile().unwrap();
        assert_eq!(anonymous.discriminator(), "POST /a");
    }

    #[test]
    fn test_compile_rejects_degenerate_rate_limits() {
        for (ceiling, window) in [(0, 60), (5, 0)] {
            let err = RouteDeclaration::get("/limited", "h")
                .with_rate_limit(ceiling, window, PartitionKey::Ip)
                .compile()
                .unwrap_err();
            assert!(matches!(err, RouterError::InvalidRateLimit { ref template, .. } if template == "/limited"));
        }

        assert!(RouteDeclaration::get("/limited", "h")
            .with_rate_limit(1, u64::MAX, PartitionKey::Ip)
            .compile()
            .is_ok());
    }
}
