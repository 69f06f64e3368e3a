//! Error types and handling for the portlet container
//!
//! This module defines all error types used throughout the system. Failures of a
//! single portlet or service are reported through the narrow error types
//! ([`PortletError`], [`ServiceError`], [`ResolutionError`], [`InstantiationError`]);
//! the top-level [`Error`] is what callers of the registry and the lifecycle
//! manager see.

use thiserror::Error;

/// Main result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the portlet container
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A type name could not be found in its catalog
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Constructing a portlet or service failed
    #[error("Instantiation error: {0}")]
    Instantiation(#[from] InstantiationError),

    /// A portlet's one-time init hook failed
    #[error("Portlet '{portlet}' failed to initialize: {source}")]
    ComponentInit {
        /// Identifier of the portlet definition
        portlet: String,
        /// Error raised by the portlet
        #[source]
        source: PortletError,
    },

    /// A call into an already initialized portlet failed
    #[error("Portlet '{portlet}' failed during {method}: {source}")]
    ComponentInvocation {
        /// Identifier of the portlet definition
        portlet: String,
        /// Name of the invoked method
        method: &'static str,
        /// Error raised by the portlet
        #[source]
        source: PortletError,
    },

    /// A service's init hook failed
    #[error("Service '{base}' failed to initialize: {source}")]
    ServiceInit {
        /// Base name the service was declared under
        base: String,
        /// Error raised by the service
        #[source]
        source: ServiceError,
    },

    /// Some service descriptors could not be brought up
    #[error("Services initialized ({successful}/{attempted} successful)")]
    PartialInitialization {
        /// Number of services registered
        successful: usize,
        /// Number of descriptors processed
        attempted: usize,
    },

    /// Some services failed their post-init phase
    #[error("Services post-initialized ({successful}/{total} successful)")]
    PartialPostInit {
        /// Number of services whose post-init succeeded
        successful: usize,
        /// Number of registered services
        total: usize,
    },

    /// The portlet registry has been torn down
    #[error("Portlet registry is shut down")]
    ShutDown,

    /// Prometheus metrics errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// I/O errors from std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A name that is not present in the catalog it was looked up in
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// Unknown service base
    #[error("can't find service base '{0}'")]
    UnknownBase(String),

    /// Unknown service or portlet implementation
    #[error("can't find implementation '{0}'")]
    UnknownImplementation(String),

    /// No portlet definition with this identifier
    #[error("can't find portlet '{0}'")]
    UnknownPortlet(String),
}

/// Construction of a portlet or service failed
#[derive(Error, Debug)]
pub enum InstantiationError {
    /// The implementation name is not registered
    #[error(transparent)]
    Unresolved(#[from] ResolutionError),

    /// The factory refused or failed to build an instance
    #[error("can't instantiate '{implementation}': {reason}")]
    Failed {
        /// Implementation name
        implementation: String,
        /// Reason reported by the factory
        reason: String,
    },

    /// The implementation does not provide the declared base
    #[error("'{implementation}' isn't a service of base '{base}'")]
    NotASubtype {
        /// Implementation name
        implementation: String,
        /// Declared base name
        base: String,
    },
}

/// Error raised by portlet code
#[derive(Error, Debug)]
#[error("{message}")]
pub struct PortletError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// Error raised by service code
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ServiceError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if this is an aggregate error reported after a batch completed
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            Error::PartialInitialization { .. } | Error::PartialPostInit { .. }
        )
    }

    /// Check if this error belongs to a single portlet call
    pub fn is_portlet_error(&self) -> bool {
        matches!(
            self,
            Error::Instantiation(_) | Error::ComponentInit { .. } | Error::ComponentInvocation { .. }
        )
    }
}

impl InstantiationError {
    /// Create a factory failure for the given implementation
    pub fn failed(implementation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            implementation: implementation.into(),
            reason: reason.into(),
        }
    }
}

impl PortletError {
    /// Create a portlet error with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a portlet error wrapping an underlying cause
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The message given when the error was raised
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl ServiceError {
    /// Create a service error with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a service error wrapping an underlying cause
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The message given when the error was raised
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<Error> for ServiceError {
    fn from(err: Error) -> Self {
        ServiceError::with_source("container error", err)
    }
}

impl From<Error> for PortletError {
    fn from(err: Error) -> Self {
        PortletError::with_source("container error", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_partial_errors_are_classified() {
        let err = Error::PartialInitialization { successful: 2, attempted: 3 };
        assert!(err.is_partial());
        assert_eq!(err.to_string(), "Services initialized (2/3 successful)");

        let err = Error::PartialPostInit { successful: 0, total: 1 };
        assert!(err.is_partial());
        assert!(!Error::config("bad").is_partial());
    }

    #[test]
    fn test_invocation_error_keeps_cause() {
        let cause = PortletError::new("boom");
        let err = Error::ComponentInvocation {
            portlet: "hello".to_string(),
            method: "render",
            source: cause,
        };
        assert!(err.is_portlet_error());
        assert_eq!(err.to_string(), "Portlet 'hello' failed during render: boom");
        assert_eq!(err.source().map(|s| s.to_string()), Some("boom".to_string()));
    }

    #[test]
    fn test_unresolved_instantiation_is_transparent() {
        let err: InstantiationError = ResolutionError::UnknownImplementation("x".into()).into();
        assert_eq!(err.to_string(), "can't find implementation 'x'");
    }
}
