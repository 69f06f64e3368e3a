//! Portlet Container - a runtime for pluggable portlets and host services
//!
//! The container has two halves. The portlet runtime lazily creates one instance
//! per portlet definition, initializes it exactly once, and dispatches action and
//! render calls into it from any number of threads. The service manager brings the
//! host's long-lived services up in declared order and tears them down in reverse.
#![warn(missing_docs)]

// Core foundational modules
pub mod core;
pub mod types;

// Main functional modules
pub mod catalog;
pub mod portlet;
pub mod services;
pub mod system;

// Re-export commonly used items for convenience
pub use crate::catalog::{PortletCatalog, ServiceCatalog};
pub use crate::core::{AppState, Config};
pub use crate::portlet::{Portlet, PortletRegistry};
pub use crate::services::{Service, ServiceManager};
pub use crate::types::{Error, Result};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize logging from configuration
pub fn init(config: &crate::core::config::LoggingConfig) -> Result<()> {
    crate::core::logging::init_logging(config)?;
    log_info!("Initializing {} v{}", NAME, VERSION);
    Ok(())
}
