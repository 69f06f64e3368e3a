//! Name to factory tables for portlets and services
//!
//! Configuration refers to portlet and service implementations by name. The
//! catalogs map those names to factory closures registered by the host at
//! startup, so "load what is configured" works without runtime reflection.
//! Catalogs are filled once and then shared read-only behind an `Arc`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::portlet::Portlet;
use crate::services::Service;
use crate::types::{InstantiationError, PortletError, ResolutionError, ServiceError};

type PortletFactory = Arc<dyn Fn() -> Result<Arc<dyn Portlet>, PortletError> + Send + Sync>;
type ServiceFactory = Arc<dyn Fn() -> Result<Box<dyn Service>, ServiceError> + Send + Sync>;

/// Portlet implementations known to the container
#[derive(Default, Clone)]
pub struct PortletCatalog {
    factories: HashMap<String, PortletFactory>,
}

impl PortletCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fallible factory under an implementation name
    pub fn register<P, F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        P: Portlet + 'static,
        F: Fn() -> Result<P, PortletError> + Send + Sync + 'static,
    {
        let factory: PortletFactory =
            Arc::new(move || factory().map(|portlet| Arc::new(portlet) as Arc<dyn Portlet>));
        self.factories.insert(name.into(), factory);
        self
    }

    /// Register a type built with `Default`
    pub fn register_default<P>(&mut self, name: impl Into<String>) -> &mut Self
    where
        P: Portlet + Default + 'static,
    {
        self.register(name, || Ok(P::default()))
    }

    /// True if the implementation name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered implementation names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build a new instance of the named implementation
    pub fn instantiate(&self, name: &str) -> Result<Arc<dyn Portlet>, InstantiationError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ResolutionError::UnknownImplementation(name.to_string()))?;
        factory().map_err(|e| InstantiationError::failed(name, e.to_string()))
    }
}

struct ServiceImplementation {
    provides: BTreeSet<String>,
    factory: ServiceFactory,
}

/// Service bases and implementations known to the container
#[derive(Default)]
pub struct ServiceCatalog {
    bases: BTreeSet<String>,
    implementations: HashMap<String, ServiceImplementation>,
}

impl ServiceCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a service base name
    pub fn register_base(&mut self, base: impl Into<String>) -> &mut Self {
        self.bases.insert(base.into());
        self
    }

    /// Register an implementation providing the given bases
    pub fn register<S, F>(&mut self, name: impl Into<String>, provides: &[&str], factory: F) -> &mut Self
    where
        S: Service + 'static,
        F: Fn() -> Result<S, ServiceError> + Send + Sync + 'static,
    {
        let factory: ServiceFactory =
            Arc::new(move || factory().map(|service| Box::new(service) as Box<dyn Service>));
        self.implementations.insert(
            name.into(),
            ServiceImplementation {
                provides: provides.iter().map(|base| base.to_string()).collect(),
                factory,
            },
        );
        self
    }

    /// Register a type built with `Default`
    pub fn register_default<S>(&mut self, name: impl Into<String>, provides: &[&str]) -> &mut Self
    where
        S: Service + Default + 'static,
    {
        self.register(name, provides, || Ok(S::default()))
    }

    /// Check that a base name has been declared
    pub fn resolve_base(&self, base: &str) -> Result<(), ResolutionError> {
        if self.bases.contains(base) {
            Ok(())
        } else {
            Err(ResolutionError::UnknownBase(base.to_string()))
        }
    }

    /// True if the implementation name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.implementations.contains_key(name)
    }

    /// Build an implementation and check that it provides `base`
    pub fn instantiate(&self, name: &str, base: &str) -> Result<Box<dyn Service>, InstantiationError> {
        let implementation = self
            .implementations
            .get(name)
            .ok_or_else(|| ResolutionError::UnknownImplementation(name.to_string()))?;
        if !implementation.provides.contains(base) {
            return Err(InstantiationError::NotASubtype {
                implementation: name.to_string(),
                base: base.to_string(),
            });
        }
        (implementation.factory)().map_err(|e| InstantiationError::failed(name, e.to_string()))
    }
}
