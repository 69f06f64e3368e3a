//! Services shipped with the container

use std::sync::Arc;

use crate::catalog::ServiceCatalog;
use crate::core::host::HostConfig;
use crate::services::Service;
use crate::types::{Properties, ServiceError};
use crate::{log_debug, log_error, log_info, log_warn};

/// Base name of the logging service
pub const LOG_BASE: &str = "log";

/// Base name of the configuration service
pub const CONFIG_BASE: &str = "config";

/// Implementation name of [`LogService`]
pub const TRACING_LOG: &str = "tracing-log";

/// Implementation name of [`ConfigService`]
pub const PROPERTIES_CONFIG: &str = "properties-config";

/// Severity accepted by [`LogService::log`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Diagnostic detail
    Debug,
    /// Normal operation
    Info,
    /// Something looks wrong
    Warn,
    /// Something failed
    Error,
}

/// Logging service writing through the container's tracing subscriber.
///
/// Properties: `channel` names the log channel (default: the host name).
#[derive(Debug, Default)]
pub struct LogService {
    channel: String,
}

impl LogService {
    /// Name of the channel messages are tagged with
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Write one message
    pub fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Debug => log_debug!(channel = %self.channel, "{}", message),
            Severity::Info => log_info!(channel = %self.channel, "{}", message),
            Severity::Warn => log_warn!(channel = %self.channel, "{}", message),
            Severity::Error => log_error!(channel = %self.channel, "{}", message),
        }
    }
}

impl Service for LogService {
    fn init(&mut self, config: &HostConfig, properties: &Properties) -> Result<(), ServiceError> {
        self.channel = properties.get_string_or("channel", config.name());
        Ok(())
    }

    fn post_init(&self, config: &HostConfig) -> Result<(), ServiceError> {
        self.log(Severity::Info, &format!("log channel open on {}", config.context().server_info()));
        Ok(())
    }

    fn destroy(&self, _config: &HostConfig) -> Result<(), ServiceError> {
        self.log(Severity::Debug, "log channel closed");
        Ok(())
    }
}

/// Configuration service backed by a property store.
///
/// Lookups fall back to the host init parameters. The optional `required`
/// property lists names that must resolve by the time post-init runs.
#[derive(Debug, Default)]
pub struct ConfigService {
    properties: Properties,
}

impl ConfigService {
    /// All properties, including the inherited host parameters
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// First value of a property
    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties.get(name)
    }

    /// Property value or a default
    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.properties.get_string_or(name, default)
    }
}

impl Service for ConfigService {
    fn init(&mut self, config: &HostConfig, properties: &Properties) -> Result<(), ServiceError> {
        let mut own = properties.clone();
        own.set_parent(Some(Arc::new(config.init_parameters().clone())));
        self.properties = own;
        Ok(())
    }

    fn post_init(&self, _config: &HostConfig) -> Result<(), ServiceError> {
        let missing: Vec<&str> = self
            .properties
            .get_strings("required")
            .unwrap_or_default()
            .iter()
            .map(String::as_str)
            .filter(|name| !self.properties.contains(name))
            .collect();
        if !missing.is_empty() {
            return Err(ServiceError::new(format!(
                "missing required properties: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

/// Declare the built-in bases and register their implementations
pub fn register_builtin_services(catalog: &mut ServiceCatalog) {
    catalog
        .register_base(LOG_BASE)
        .register_base(CONFIG_BASE)
        .register_default::<LogService>(TRACING_LOG, &[LOG_BASE])
        .register_default::<ConfigService>(PROPERTIES_CONFIG, &[CONFIG_BASE]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::host::HostContext;
    use crate::services::{ServiceDescriptor, ServiceManager};
    use crate::system::ContainerMetrics;
    use crate::types::Error;

    fn host() -> HostConfig {
        let mut params = Properties::new();
        params.add("region", "eu");
        let context = Arc::new(HostContext::new("test/1.0", Properties::new()));
        HostConfig::new("portal", params, context)
    }

    fn manager() -> ServiceManager {
        let mut catalog = ServiceCatalog::new();
        register_builtin_services(&mut catalog);
        ServiceManager::new(Arc::new(catalog), Arc::new(ContainerMetrics::new().unwrap()))
    }

    #[test]
    fn test_builtin_services_come_up() {
        let manager = manager();
        let host = host();
        manager
            .init(
                &host,
                &[
                    ServiceDescriptor::new(LOG_BASE, TRACING_LOG),
                    ServiceDescriptor::new(CONFIG_BASE, PROPERTIES_CONFIG).with_property("mode", "test"),
                ],
            )
            .unwrap();
        manager.post_init(&host).unwrap();

        assert_eq!(manager.service::<LogService>(LOG_BASE).unwrap().channel(), "portal");
        let config = manager.service::<ConfigService>(CONFIG_BASE).unwrap();
        assert_eq!(config.get("mode"), Some("test"));
        assert_eq!(config.get("region"), Some("eu"));
        assert_eq!(config.get_or("missing", "x"), "x");
    }

    #[test]
    fn test_config_post_init_checks_required() {
        let manager = manager();
        let host = host();
        manager
            .init(
                &host,
                &[ServiceDescriptor::new(CONFIG_BASE, PROPERTIES_CONFIG)
                    .with_property("required", "region")
                    .with_property("required", "database")],
            )
            .unwrap();

        let err = manager.post_init(&host).unwrap_err();
        assert!(matches!(err, Error::PartialPostInit { successful: 0, total: 1 }));
        assert!(manager.is_initialized());
    }

    #[test]
    fn test_log_service_rejects_config_base() {
        let manager = manager();
        let err = manager
            .init(&host(), &[ServiceDescriptor::new(CONFIG_BASE, TRACING_LOG)])
            .unwrap_err();
        assert!(matches!(err, Error::PartialInitialization { successful: 0, attempted: 1 }));
    }
}
