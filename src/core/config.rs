//! Configuration for the portlet container
//!
//! Configuration is read from a TOML file with the sections `[server]`,
//! `[application]`, `[logging]`, `[metrics]`, and the repeated tables
//! `[[service]]` and `[[portlet]]`. Every section has defaults, so an empty
//! file is a valid configuration. Selected values can be overridden from the
//! environment.

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::portlet::{PortletApplication, PortletDefinition};
use crate::services::ServiceDescriptor;
use crate::types::{Error, Properties, Result};
use crate::{log_info, log_warn};

/// Overrides `server.name`
pub const ENV_SERVER_NAME: &str = "PORTLET_SERVER_NAME";
/// Overrides `logging.level`
pub const ENV_LOG_LEVEL: &str = "PORTLET_LOG_LEVEL";
/// Overrides `logging.format`
pub const ENV_LOG_FORMAT: &str = "PORTLET_LOG_FORMAT";
/// Overrides `metrics.enabled`
pub const ENV_METRICS: &str = "PORTLET_METRICS";

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host server configuration
    pub server: ServerConfig,

    /// The portlet application all configured portlets belong to
    pub application: ApplicationConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,

    /// Services to bring up, in order
    #[serde(rename = "service")]
    pub services: Vec<ServiceDescriptorConfig>,

    /// Portlet definitions
    #[serde(rename = "portlet")]
    pub portlets: Vec<PortletDefinitionConfig>,
}

/// Host server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Name of this server instance
    pub name: String,

    /// Server info string reported to portlets
    pub info: String,

    /// Host-level init parameters
    pub init_parameters: toml::Table,
}

/// Portlet application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,

    /// Context path the application is mounted at
    pub context_path: String,

    /// Application-level init parameters
    pub init_parameters: toml::Table,
}

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line human readable output
    Compact,
    /// Multi-line human readable output
    Pretty,
    /// One JSON object per event
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level: trace, debug, info, warn, error or off
    pub level: String,

    /// Output format
    pub format: LogFormat,

    /// Include the event target in output
    pub with_target: bool,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Collect Prometheus metrics and print them at shutdown
    pub enabled: bool,
}

/// One `[[service]]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescriptorConfig {
    /// Base name the service is registered under
    pub base: String,

    /// Implementation name in the service catalog
    pub implementation: String,

    /// Properties passed to the service's init
    #[serde(default)]
    pub properties: toml::Table,
}

/// One `[[portlet]]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortletDefinitionConfig {
    /// Unique portlet identifier
    pub id: String,

    /// Implementation name in the portlet catalog
    pub implementation: String,

    /// Human-readable name
    #[serde(default)]
    pub display_name: Option<String>,

    /// Portlet init parameters
    #[serde(default)]
    pub init_parameters: toml::Table,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "portlet-container".to_string(),
            info: format!("{}/{}", crate::NAME, crate::VERSION),
            init_parameters: toml::Table::new(),
        }
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            context_path: "/".to_string(),
            init_parameters: toml::Table::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            with_target: true,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::config(format!("unknown log format '{}'", other))),
        }
    }
}

impl Config {
    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(ENV_SERVER_NAME) {
            self.server.name = name;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level.to_ascii_lowercase();
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            self.logging.format = format.parse()?;
        }
        if let Some(enabled) = lookup(ENV_METRICS) {
            let mut flag = Properties::new();
            flag.add(ENV_METRICS, enabled);
            self.metrics.enabled = flag.get_boolean_or(ENV_METRICS, self.metrics.enabled)?;
        }
        Ok(())
    }

    /// Check the configuration for values that can't work
    pub fn validate(&self) -> Result<()> {
        if self.server.name.trim().is_empty() {
            return Err(Error::config("server.name must not be empty"));
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(Error::config(format!(
                "unknown log level '{}', expected one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }

        let mut bases = HashSet::new();
        for service in &self.services {
            if !bases.insert(service.base.as_str()) {
                return Err(Error::config(format!(
                    "service base '{}' is declared more than once",
                    service.base
                )));
            }
        }

        let mut ids = HashSet::new();
        for portlet in &self.portlets {
            if portlet.id.trim().is_empty() {
                return Err(Error::config("portlet id must not be empty"));
            }
            if !ids.insert(portlet.id.as_str()) {
                return Err(Error::config(format!(
                    "portlet id '{}' is declared more than once",
                    portlet.id
                )));
            }
        }
        Ok(())
    }

    /// Host init parameters as a property table
    pub fn host_parameters(&self) -> Result<Properties> {
        Properties::from_toml(&self.server.init_parameters)
    }

    /// Build the portlet application
    pub fn application(&self) -> Result<PortletApplication> {
        let parameters = Properties::from_toml(&self.application.init_parameters)?;
        Ok(
            PortletApplication::new(&self.application.name, &self.application.context_path)
                .with_init_parameters(parameters),
        )
    }

    /// Build the service descriptors in declared order
    pub fn service_descriptors(&self) -> Result<Vec<ServiceDescriptor>> {
        self.services.iter().map(ServiceDescriptorConfig::to_descriptor).collect()
    }

    /// Build the portlet definitions within `application`
    pub fn portlet_definitions(&self, application: &Arc<PortletApplication>) -> Result<Vec<PortletDefinition>> {
        self.portlets
            .iter()
            .map(|portlet| portlet.to_definition(application.clone()))
            .collect()
    }
}

impl ServiceDescriptorConfig {
    /// Convert into a descriptor
    pub fn to_descriptor(&self) -> Result<ServiceDescriptor> {
        let properties = Properties::from_toml(&self.properties)?;
        Ok(ServiceDescriptor::new(&self.base, &self.implementation).with_properties(properties))
    }
}

impl PortletDefinitionConfig {
    /// Convert into a definition belonging to `application`
    pub fn to_definition(&self, application: Arc<PortletApplication>) -> Result<PortletDefinition> {
        let parameters = Properties::from_toml(&self.init_parameters)?;
        let definition = PortletDefinition::new(self.id.as_str(), &self.implementation, application)
            .with_init_parameters(parameters);
        Ok(match &self.display_name {
            Some(display_name) => definition.with_display_name(display_name),
            None => definition,
        })
    }
}

/// Load, override from the environment, and validate a configuration file
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let config_str = std::fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&config_str)
        .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))?;
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from file or use defaults
pub fn load_config_or_default(path: Option<&Path>) -> Config {
    match path {
        Some(path) => match load_config(path) {
            Ok(config) => {
                log_info!("Loaded configuration from: {}", path.display());
                config
            }
            Err(e) => {
                log_warn!("Failed to load config from {}: {}. Using defaults.", path.display(), e);
                Config::default()
            }
        },
        None => {
            log_info!("No config file specified, using defaults");
            Config::default()
        }
    }
}
