//! Per-portlet execution context and configuration
//!
//! Both objects are built exactly once per portlet definition, right before the
//! portlet's `init` hook runs, and are shared by every later dispatch.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;

use crate::core::host::{Attribute, HostContext};
use crate::portlet::definition::{PortletApplication, PortletDefinition};
use crate::types::{PortletId, Properties};
use crate::log_info;

/// View of the host context scoped to one portlet application
pub struct PortletContext {
    host: Arc<HostContext>,
    application: Arc<PortletApplication>,
    attributes: DashMap<String, Attribute>,
}

impl PortletContext {
    /// Bind a portlet application to the host context
    pub fn new(host: Arc<HostContext>, application: Arc<PortletApplication>) -> Self {
        Self {
            host,
            application,
            attributes: DashMap::new(),
        }
    }

    /// Name and version of the embedding server
    pub fn server_info(&self) -> &str {
        self.host.server_info()
    }

    /// Name of the owning application
    pub fn application_name(&self) -> &str {
        self.application.name()
    }

    /// Application init parameter, falling back to the host context's
    pub fn init_parameter(&self, name: &str) -> Option<&str> {
        self.application
            .init_parameters()
            .get(name)
            .or_else(|| self.host.init_parameters().get(name))
    }

    /// Store a context attribute
    pub fn set_attribute<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) {
        self.attributes.insert(name.into(), Arc::new(value));
    }

    /// Get a context attribute of a concrete type
    pub fn attribute_as<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.attributes
            .get(name)
            .and_then(|entry| entry.value().clone().downcast::<T>().ok())
    }

    /// Remove a context attribute
    pub fn remove_attribute(&self, name: &str) -> Option<Attribute> {
        self.attributes.remove(name).map(|(_, value)| value)
    }

    /// Write a message to the container log under the application's name
    pub fn log(&self, message: &str) {
        log_info!(application = %self.application.name(), "{}", message);
    }
}

impl std::fmt::Debug for PortletContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortletContext")
            .field("application", &self.application.name())
            .field("server_info", &self.host.server_info())
            .finish()
    }
}

/// Configuration handed to a portlet's `init` hook
#[derive(Debug)]
pub struct PortletConfig {
    portlet_name: PortletId,
    display_name: String,
    init_parameters: Properties,
    context: Arc<PortletContext>,
}

impl PortletConfig {
    /// Build the config for a definition within its context
    pub fn new(definition: &PortletDefinition, context: Arc<PortletContext>) -> Self {
        Self {
            portlet_name: definition.id().clone(),
            display_name: definition.display_name().to_string(),
            init_parameters: definition.init_parameters().clone(),
            context,
        }
    }

    /// Identifier of the portlet definition
    pub fn portlet_name(&self) -> &PortletId {
        &self.portlet_name
    }

    /// Human-readable name
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Portlet init parameter
    pub fn init_parameter(&self, name: &str) -> Option<&str> {
        self.init_parameters.get(name)
    }

    /// All portlet init parameters
    pub fn init_parameters(&self) -> &Properties {
        &self.init_parameters
    }

    /// The portlet's context
    pub fn portlet_context(&self) -> &Arc<PortletContext> {
        &self.context
    }
}
