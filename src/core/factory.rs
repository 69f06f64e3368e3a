//! Application Factory
//!
//! This module provides factory functions for creating the AppState from
//! configuration and the portlet and service catalogs.

use std::sync::Arc;

use crate::catalog::{PortletCatalog, ServiceCatalog};
use crate::core::app_state::AppState;
use crate::core::config::Config;
use crate::core::host::{HostConfig, HostContext};
use crate::portlet::builtin::register_builtin_portlets;
use crate::portlet::PortletRegistry;
use crate::services::builtin::register_builtin_services;
use crate::services::ServiceManager;
use crate::system::metrics::ContainerMetrics;
use crate::types::Result;
use crate::{log_debug, log_info};

/// Create AppState from configuration and catalogs.
///
/// Nothing is started: call [`AppState::startup`] to bring up services and
/// preload portlets.
pub fn create_app_state(
    config: Config,
    portlets: PortletCatalog,
    services: ServiceCatalog,
) -> Result<AppState> {
    log_info!("Creating AppState for '{}'", config.server.name);
    config.validate()?;

    let metrics = Arc::new(ContainerMetrics::new()?);
    let host_parameters = config.host_parameters()?;
    let context = Arc::new(HostContext::new(&config.server.info, host_parameters.clone()));
    let host = HostConfig::new(&config.server.name, host_parameters, context.clone());

    let application = Arc::new(config.application()?);
    let definitions = config.portlet_definitions(&application)?;
    let descriptors = config.service_descriptors()?;
    log_debug!(
        "Configured {} services and {} portlets",
        descriptors.len(),
        definitions.len()
    );

    let registry = PortletRegistry::new(Arc::new(portlets), context, metrics.clone());
    let manager = ServiceManager::new(Arc::new(services), metrics.clone());

    Ok(AppState::new(
        config,
        host,
        registry,
        manager,
        descriptors,
        definitions,
        metrics,
    ))
}

/// Create AppState with only the built-in portlets and services registered
pub fn create_default_app_state(config: Config) -> Result<AppState> {
    let mut portlets = PortletCatalog::new();
    register_builtin_portlets(&mut portlets);
    let mut services = ServiceCatalog::new();
    register_builtin_services(&mut services);
    create_app_state(config, portlets, services)
}
