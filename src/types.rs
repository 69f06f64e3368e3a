//! Type definitions for the portlet container
//!
//! This module contains the shared value types used by both the portlet runtime
//! and the service lifecycle manager.

/// Identifier types
pub mod ids;
/// System-wide error types
pub mod error;
/// Hierarchical property store
pub mod properties;

// Re-export commonly used types for convenience
pub use ids::PortletId;
pub use error::{Error, Result, PortletError, ServiceError, ResolutionError, InstantiationError};
pub use properties::Properties;
