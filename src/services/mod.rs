//! Service lifecycle management
//!
//! Services are long-lived collaborators of the host, declared in configuration
//! as `{base, implementation, properties}` descriptors. The [`ServiceManager`]
//! brings them up in declared order, runs a post-init pass once all of them
//! exist, and destroys them in reverse order.

/// Service descriptors
pub mod descriptor;
/// Lifecycle manager
pub mod manager;
/// Services shipped with the container
pub mod builtin;

pub use descriptor::ServiceDescriptor;
pub use manager::{Phase, RegisteredService, ServiceManager};

use std::any::Any;
use std::sync::Arc;

use crate::core::host::HostConfig;
use crate::types::{Properties, ServiceError};

/// Type-erasure helper so registered services can be downcast
pub trait AsAny {
    /// Convert a shared service into a shared `Any`
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Three-phase contract every service implements
pub trait Service: AsAny + Send + Sync {
    /// Initialize from the host config and the descriptor's properties
    fn init(&mut self, config: &HostConfig, properties: &Properties) -> Result<(), ServiceError>;

    /// Second phase, run once every service has been initialized
    fn post_init(&self, _config: &HostConfig) -> Result<(), ServiceError> {
        Ok(())
    }

    /// Release resources at shutdown
    fn destroy(&self, _config: &HostConfig) -> Result<(), ServiceError> {
        Ok(())
    }
}
