//! Host-side context handed to services and portlets
//!
//! [`HostContext`] is the application-wide context of the embedding server and
//! [`HostConfig`] the configuration object the host passes to every service
//! lifecycle call.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;

use crate::types::Properties;

/// Shared, type-erased attribute value
pub type Attribute = Arc<dyn Any + Send + Sync>;

/// Application-wide context of the embedding server
pub struct HostContext {
    server_info: String,
    init_parameters: Properties,
    attributes: DashMap<String, Attribute>,
}

impl HostContext {
    /// Create a host context
    pub fn new(server_info: impl Into<String>, init_parameters: Properties) -> Self {
        Self {
            server_info: server_info.into(),
            init_parameters,
            attributes: DashMap::new(),
        }
    }

    /// Name and version of the embedding server
    pub fn server_info(&self) -> &str {
        &self.server_info
    }

    /// Context-wide init parameters
    pub fn init_parameters(&self) -> &Properties {
        &self.init_parameters
    }

    /// Store a context attribute, replacing any previous value
    pub fn set_attribute<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) {
        self.attributes.insert(name.into(), Arc::new(value));
    }

    /// Get a context attribute
    pub fn attribute(&self, name: &str) -> Option<Attribute> {
        self.attributes.get(name).map(|entry| entry.value().clone())
    }

    /// Get a context attribute of a concrete type
    pub fn attribute_as<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.attribute(name).and_then(|value| value.downcast::<T>().ok())
    }

    /// Remove a context attribute
    pub fn remove_attribute(&self, name: &str) -> Option<Attribute> {
        self.attributes.remove(name).map(|(_, value)| value)
    }
}

impl std::fmt::Debug for HostContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostContext")
            .field("server_info", &self.server_info)
            .field("init_parameters", &self.init_parameters)
            .field("attributes", &self.attributes.len())
            .finish()
    }
}

/// Configuration passed by the host to service init, post-init and destroy
#[derive(Debug, Clone)]
pub struct HostConfig {
    name: String,
    init_parameters: Properties,
    context: Arc<HostContext>,
}

impl HostConfig {
    /// Create a host config bound to a context
    pub fn new(name: impl Into<String>, init_parameters: Properties, context: Arc<HostContext>) -> Self {
        Self {
            name: name.into(),
            init_parameters,
            context,
        }
    }

    /// Name of the hosting server instance
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host-level init parameters
    pub fn init_parameters(&self) -> &Properties {
        &self.init_parameters
    }

    /// The shared host context
    pub fn context(&self) -> &Arc<HostContext> {
        &self.context
    }
}
