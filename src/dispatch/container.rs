//! Dependency providers consulted when a handler parameter is a dependency.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::dispatch::args::DependencyKey;

type Shared = Arc<dyn Any + Send + Sync>;
type FactoryFn = Arc<dyn Fn() -> Shared + Send + Sync>;

/// How a dependency is produced.
#[derive(Clone)]
pub enum Provider {
    /// Pre-built value handed out as-is.
    Instance(Shared),
    /// Called on every resolution.
    Factory(FactoryFn),
    /// Called once, on first resolution.
    Singleton(FactoryFn, Arc<OnceLock<Shared>>),
}

impl Provider {
    pub fn instance<T: Any + Send + Sync>(value: T) -> Self {
        Provider::Instance(Arc::new(value))
    }

    pub fn factory<T, F>(factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Provider::Factory(Arc::new(move || Arc::new(factory()) as Shared))
    }

    pub fn singleton<T, F>(factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Provider::Singleton(
            Arc::new(move || Arc::new(factory()) as Shared),
            Arc::new(OnceLock::new()),
        )
    }

    fn provide(&self) -> Shared {
        match self {
            Provider::Instance(value) => Arc::clone(value),
            Provider::Factory(factory) => factory(),
            Provider::Singleton(factory, cell) => Arc::clone(cell.get_or_init(|| factory())),
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Instance(_) => f.write_str("Instance"),
            Provider::Factory(_) => f.write_str("Factory"),
            Provider::Singleton(_, cell) => write!(f, "Singleton(built: {})", cell.get().is_some()),
        }
    }
}

/// Type identity -> provider table.
#[derive(Debug, Default, Clone)]
pub struct Container {
    providers: HashMap<DependencyKey, Provider>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the provider for a type identity.
    pub fn bind(&mut self, key: DependencyKey, provider: Provider) {
        if self.providers.insert(key, provider).is_some() {
            tracing::debug!(dependency = key.type_name(), "Dependency binding replaced");
        }
    }

    pub fn instance<T: Any + Send + Sync>(&mut self, value: T) {
        self.bind(DependencyKey::of::<T>(), Provider::instance(value));
    }

    pub fn factory<T, F>(&mut self, factory: F)
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.bind(DependencyKey::of::<T>(), Provider::factory(factory));
    }

    pub fn singleton<T, F>(&mut self, factory: F)
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.bind(DependencyKey::of::<T>(), Provider::singleton(factory));
    }

    pub fn contains(&self, key: &DependencyKey) -> bool {
        self.providers.contains_key(key)
    }

    pub fn resolve(&self, key: &DependencyKey) -> Option<Shared> {
        self.providers.get(key).map(Provider::provide)
    }

    /// Typed convenience over [`Container::resolve`].
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.resolve(&DependencyKey::of::<T>())?.downcast::<T>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Config {
        name: &'static str,
    }

    struct Counter(usize);

    #[test]
    fn test_instance_is_shared() {
        let mut container = Container::new();
        container.instance(Config { name: "prod" });

        let a = container.get::<Config>().unwrap();
        let b = container.get::<Config>().unwrap();
        assert_eq!(a.name, "prod");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_factory_builds_fresh_values() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let mut container = Container::new();
        container.factory(|| Counter(CALLS.fetch_add(1, Ordering::SeqCst)));

        let a = container.get::<Counter>().unwrap();
        let b = container.get::<Counter>().unwrap();
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn test_singleton_builds_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let mut container = Container::new();
        container.singleton(move || Counter(counted.fetch_add(1, Ordering::SeqCst)));

        let a = container.get::<Counter>().unwrap();
        let b = container.get::<Counter>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unbound_type() {
        let container = Container::new();
        assert!(container.get::<Config>().is_none());
        assert!(!container.contains(&DependencyKey::of::<Config>()));
    }
}
