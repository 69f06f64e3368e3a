use crate::types::Properties;

/// Declaration of one service to bring up: the base it is registered under,
/// the implementation to build, and the properties handed to its `init`.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    base: String,
    implementation: String,
    properties: Properties,
}

impl ServiceDescriptor {
    /// Create a descriptor with no properties
    pub fn new(base: impl Into<String>, implementation: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            implementation: implementation.into(),
            properties: Properties::new(),
        }
    }

    /// Add one property
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.add(name, value);
        self
    }

    /// Replace all properties
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Base name the service is registered and looked up under
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Implementation name in the service catalog
    pub fn implementation(&self) -> &str {
        &self.implementation
    }

    /// Properties passed to `init`
    pub fn properties(&self) -> &Properties {
        &self.properties
    }
}
