//! Route table storage and lookup.
//!
//! # Responsibilities
//! - Store compiled routes in registration order
//! - Exact (method, path) index for static routes
//! - Ordered per-method lists of dynamic routes
//! - Name index for reverse URL lookup
//! - Snapshot round-trip for the route cache
//!
//! # Design Decisions
//! - Exact lookup is a hash probe, independent of route count
//! - Dynamic lookup is O(k) in the dynamic routes of one method
//! - Immutable once published; hot reload swaps in a whole new table
//! - Duplicate static (method, path): first registered wins
//! - Duplicate names: last registered wins, with a warning

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::RouterError;
use crate::routing::route::{CompiledRoute, Method, RouteDeclaration};

/// Snapshot format version. Bump when the serialized layout changes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Registry of compiled routes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteTable {
    /// Every route, in registration order.
    routes: Vec<Arc<CompiledRoute>>,
    /// method -> normalized path -> index into `routes`.
    static_routes: HashMap<Method, HashMap<String, usize>>,
    /// method -> indices of dynamic routes, in registration order.
    dynamic_routes: HashMap<Method, Vec<usize>>,
    /// route name -> index into `routes`.
    names: HashMap<String, usize>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    table: RouteTable,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and register declarations in order.
    ///
    /// Fails on the first declaration that does not compile; a bad route is
    /// never dropped silently.
    pub fn from_declarations(
        declarations: impl IntoIterator<Item = RouteDeclaration>,
    ) -> Result<Self, RouterError> {
        let mut table = Self::new();
        for declaration in declarations {
            table.add(declaration.compile()?);
        }
        tracing::debug!(routes = table.len(), "Route table built");
        Ok(table)
    }

    /// Register a compiled route.
    pub fn add(&mut self, route: CompiledRoute) {
        let index = self.routes.len();
        let method = route.method();

        if route.is_static() {
            let paths = self.static_routes.entry(method).or_default();
            if paths.contains_key(route.uri()) {
                tracing::debug!(
                    method = %method,
                    uri = %route.uri(),
                    "Duplicate static route ignored for lookup, first registration wins"
                );
            } else {
                paths.insert(route.uri().to_string(), index);
            }
        } else {
            self.dynamic_routes.entry(method).or_default().push(index);
        }

        if let Some(name) = route.name() {
            if let Some(previous) = self.names.insert(name.to_string(), index) {
                tracing::warn!(
                    name = %name,
                    previous_uri = %self.routes[previous].uri(),
                    uri = %route.uri(),
                    "Route name registered twice, last registration wins"
                );
            }
        }

        self.routes.push(Arc::new(route));
    }

    /// Static route registered for exactly this method and normalized path.
    pub fn find_exact(&self, method: Method, path: &str) -> Option<&Arc<CompiledRoute>> {
        self.static_routes
            .get(&method)
            .and_then(|paths| paths.get(path))
            .map(|&index| &self.routes[index])
    }

    /// Dynamic routes for a method, in match-priority order.
    pub fn find_dynamic(&self, method: Method) -> impl Iterator<Item = &Arc<CompiledRoute>> + '_ {
        self.dynamic_routes
            .get(&method)
            .into_iter()
            .flatten()
            .map(move |&index| &self.routes[index])
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Arc<CompiledRoute>> {
        self.names.get(name).map(|&index| &self.routes[index])
    }

    /// Whether the path structurally matches a route under any method.
    pub fn path_exists_for_any_method(&self, path: &str) -> bool {
        Method::ALL
            .iter()
            .any(|&method| self.matches_path(method, path))
    }

    /// Methods under which the path structurally matches a route.
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        Method::ALL
            .into_iter()
            .filter(|&method| self.matches_path(method, path))
            .collect()
    }

    fn matches_path(&self, method: Method, path: &str) -> bool {
        self.find_exact(method, path).is_some()
            || self
                .find_dynamic(method)
                .any(|route| route.pattern.matches(path).is_some())
    }

    pub fn all(&self) -> &[Arc<CompiledRoute>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Serialize the table indices into an opaque snapshot.
    pub fn serialize(&self) -> Result<Vec<u8>, RouterError> {
        let snapshot = SnapshotRef {
            version: SNAPSHOT_VERSION,
            table: self,
        };
        serde_json::to_vec(&snapshot).map_err(|e| RouterError::Cache(e.to_string()))
    }

    /// Rebuild a table from [`RouteTable::serialize`] output without
    /// recompiling route templates.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, RouterError> {
        let snapshot: Snapshot =
            serde_json::from_slice(bytes).map_err(|e| RouterError::Cache(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(RouterError::Cache(format!(
                "snapshot version {} does not match {}",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        snapshot.table.check_indices()?;
        Ok(snapshot.table)
    }

    fn check_indices(&self) -> Result<(), RouterError> {
        let len = self.routes.len();
        let in_bounds = self
            .static_routes
            .values()
            .flat_map(|paths| paths.values())
            .chain(self.dynamic_routes.values().flatten())
            .chain(self.names.values())
            .all(|&index| index < len);

        if in_bounds {
            Ok(())
        } else {
            Err(RouterError::Cache("snapshot index out of range".to_string()))
        }
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    table: &'a RouteTable,
}
