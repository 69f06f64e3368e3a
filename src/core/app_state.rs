//! Application State Management
//!
//! This module defines the central AppState that owns the portlet registry, the
//! service manager and everything they share. The binary and the tests build it
//! through the factory and drive it through `startup`, dispatch and `shutdown`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::config::Config;
use crate::core::host::HostConfig;
use crate::portlet::{HostRequest, HostResponse, Method, PortletDefinition, PortletRegistry};
use crate::services::{ServiceDescriptor, ServiceManager};
use crate::system::metrics::ContainerMetrics;
use crate::types::{PortletId, ResolutionError, Result};
use crate::{log_info, log_warn};

/// Central application state holding all services and components
pub struct AppState {
    /// Application configuration
    pub config: Config,

    /// Host configuration handed to every service lifecycle call
    pub host: HostConfig,

    /// Portlet instance cache and dispatcher
    pub registry: PortletRegistry,

    /// Service lifecycle manager
    pub services: ServiceManager,

    /// Service descriptors in declared order
    pub descriptors: Vec<ServiceDescriptor>,

    /// Portlet definitions in declared order
    pub definitions: Vec<PortletDefinition>,

    /// Metrics shared by the registry and the manager
    pub metrics: Arc<ContainerMetrics>,

    index: HashMap<PortletId, usize>,
}

impl AppState {
    /// Create a new AppState from its parts.
    /// This is called by the factory after the catalogs are filled.
    pub fn new(
        config: Config,
        host: HostConfig,
        registry: PortletRegistry,
        services: ServiceManager,
        descriptors: Vec<ServiceDescriptor>,
        definitions: Vec<PortletDefinition>,
        metrics: Arc<ContainerMetrics>,
    ) -> Self {
        let index = definitions
            .iter()
            .enumerate()
            .map(|(i, definition)| (definition.id().clone(), i))
            .collect();
        Self {
            config,
            host,
            registry,
            services,
            descriptors,
            definitions,
            metrics,
            index,
        }
    }

    /// Bring up services, run post-init, and preload portlets.
    ///
    /// A service that fails to come up or to post-initialize fails startup with
    /// the aggregate error; the services that did come up stay registered so
    /// [`AppState::shutdown`] can still destroy them. Portlets that fail to
    /// preload are logged and retried on their first dispatch.
    pub fn startup(&self) -> Result<()> {
        log_info!("Starting {} ({})", self.host.name(), self.host.context().server_info());

        self.services.init(&self.host, &self.descriptors)?;
        self.services.post_init(&self.host)?;

        for definition in &self.definitions {
            let mut request = HostRequest::new(definition.application().context_path());
            let mut response = HostResponse::new();
            if let Err(e) = self.registry.load(definition, &mut request, &mut response) {
                log_warn!("Portlet '{}' not preloaded: {}", definition.id(), e);
            }
        }

        log_info!(
            "Started with {} services and {}/{} portlets loaded",
            self.services.service_count(),
            self.registry.loaded_count(),
            self.definitions.len()
        );
        Ok(())
    }

    /// Destroy portlets, then services. Portlet dispatches fail afterwards.
    pub fn shutdown(&self) {
        log_info!("Shutting down {}", self.host.name());
        self.registry.destroy_all();
        self.services.destroy(&self.host);
    }

    /// Definition registered under `id`
    pub fn definition(&self, id: &str) -> Option<&PortletDefinition> {
        self.index.get(id).map(|&i| &self.definitions[i])
    }

    /// Dispatch a call to the portlet registered under `id`
    pub fn dispatch(
        &self,
        id: &str,
        request: &mut HostRequest,
        response: &mut HostResponse,
        method: Method,
    ) -> Result<()> {
        let definition = self
            .definition(id)
            .ok_or_else(|| ResolutionError::UnknownPortlet(id.to_string()))?;
        self.registry.dispatch(definition, request, response, method)
    }

    /// Render the portlet registered under `id` into a fresh response
    pub fn render(&self, id: &str, request: &mut HostRequest) -> Result<HostResponse> {
        let mut response = HostResponse::new();
        self.dispatch(id, request, &mut response, Method::Render)?;
        Ok(response)
    }

    /// Run an action on the portlet registered under `id`
    pub fn action(&self, id: &str, request: &mut HostRequest) -> Result<HostResponse> {
        let mut response = HostResponse::new();
        self.dispatch(id, request, &mut response, Method::Action)?;
        Ok(response)
    }

    /// Prometheus text exposition of the container metrics
    pub fn collect_metrics(&self) -> String {
        self.metrics.collect()
    }
}
