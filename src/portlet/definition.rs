//! Portlet definitions and the applications that own them

use std::sync::Arc;

use crate::types::{PortletId, Properties};

/// A portlet application: the deployment unit that groups portlet definitions
#[derive(Debug, Clone)]
pub struct PortletApplication {
    name: String,
    context_path: String,
    init_parameters: Properties,
}

impl PortletApplication {
    /// Create an application without init parameters
    pub fn new(name: impl Into<String>, context_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context_path: context_path.into(),
            init_parameters: Properties::new(),
        }
    }

    /// Replace the application's init parameters
    pub fn with_init_parameters(mut self, init_parameters: Properties) -> Self {
        self.init_parameters = init_parameters;
        self
    }

    /// Application name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Context path the application is mounted under
    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    /// Application-wide init parameters
    pub fn init_parameters(&self) -> &Properties {
        &self.init_parameters
    }
}

/// Immutable description of one pluggable portlet
///
/// The identifier is the registry cache key; the implementation name selects
/// the factory in the portlet catalog.
#[derive(Debug, Clone)]
pub struct PortletDefinition {
    id: PortletId,
    implementation: String,
    display_name: Option<String>,
    init_parameters: Properties,
    application: Arc<PortletApplication>,
}

impl PortletDefinition {
    /// Create a definition
    pub fn new(
        id: impl Into<PortletId>,
        implementation: impl Into<String>,
        application: Arc<PortletApplication>,
    ) -> Self {
        Self {
            id: id.into(),
            implementation: implementation.into(),
            display_name: None,
            init_parameters: Properties::new(),
            application,
        }
    }

    /// Set the human-readable name
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Add one init parameter
    pub fn with_init_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.init_parameters.add(name, value);
        self
    }

    /// Replace all init parameters
    pub fn with_init_parameters(mut self, init_parameters: Properties) -> Self {
        self.init_parameters = init_parameters;
        self
    }

    /// Registry cache key
    pub fn id(&self) -> &PortletId {
        &self.id
    }

    /// Catalog name of the implementation
    pub fn implementation(&self) -> &str {
        &self.implementation
    }

    /// Display name, falling back to the identifier
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(self.id.as_str())
    }

    /// Portlet init parameters
    pub fn init_parameters(&self) -> &Properties {
        &self.init_parameters
    }

    /// Enclosing application
    pub fn application(&self) -> &Arc<PortletApplication> {
        &self.application
    }
}
