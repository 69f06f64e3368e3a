//! Ordered service lifecycle
//!
//! `init` walks the descriptors in declared order and registers every service
//! that comes up, `post_init` gives the survivors a second pass once all of them
//! exist, and `destroy` tears them down in reverse registration order. Failures
//! of individual services are logged and skipped; an aggregate error is returned
//! once the pass is complete.
//!
//! A service hook that panics is treated like one that returned an error, so a
//! misbehaving service can't leave the manager stuck between phases.
//!
//! Lookups go through an [`ArcSwap`] snapshot and never block on the lifecycle
//! lock.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::catalog::ServiceCatalog;
use crate::core::host::HostConfig;
use crate::services::{AsAny, Service, ServiceDescriptor};
use crate::system::metrics::ContainerMetrics;
use crate::types::{Error, Result, ServiceError};
use crate::{log_debug, log_error, log_info, log_warn};

/// Lifecycle phase of a [`ServiceManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing registered; `init` is allowed
    Uninitialized,
    /// An `init` pass is running
    Initializing,
    /// Services are registered and available
    Initialized,
    /// A `destroy` pass is running
    Destroying,
}

/// A service registered by `init`
#[derive(Clone)]
pub struct RegisteredService {
    /// Base name it is registered under
    pub base: String,
    /// Implementation name it was built from
    pub implementation: String,
    /// The live service
    pub service: Arc<dyn Service>,
}

impl std::fmt::Debug for RegisteredService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredService")
            .field("base", &self.base)
            .field("implementation", &self.implementation)
            .finish()
    }
}

/// Immutable snapshot of the registered services
#[derive(Default, Clone)]
struct ServiceTable {
    by_base: HashMap<String, Arc<dyn Service>>,
    /// Most recently registered first
    teardown: VecDeque<RegisteredService>,
}

/// Owner of the host's long-lived services
pub struct ServiceManager {
    catalog: Arc<ServiceCatalog>,
    phase: Mutex<Phase>,
    table: ArcSwap<ServiceTable>,
    metrics: Arc<ContainerMetrics>,
}

impl ServiceManager {
    /// Create a manager resolving implementations from `catalog`
    pub fn new(catalog: Arc<ServiceCatalog>, metrics: Arc<ContainerMetrics>) -> Self {
        Self {
            catalog,
            phase: Mutex::new(Phase::Uninitialized),
            table: ArcSwap::from_pointee(ServiceTable::default()),
            metrics,
        }
    }

    /// Bring up the described services in order.
    ///
    /// Does nothing if the manager is already initialized or another thread is
    /// initializing it. Services that fail to resolve, construct or initialize
    /// are skipped; the rest stay registered and the manager ends up
    /// [`Phase::Initialized`] either way. If anything was skipped the result is
    /// [`Error::PartialInitialization`].
    pub fn init(&self, config: &HostConfig, descriptors: &[ServiceDescriptor]) -> Result<()> {
        if !self.claim(Phase::Uninitialized, Phase::Initializing) {
            log_debug!("Service manager already initialized, ignoring init");
            return Ok(());
        }

        log_info!("Initializing {} services", descriptors.len());
        let mut table = ServiceTable::default();
        let attempted = descriptors.len();
        let mut successful = 0;

        for descriptor in descriptors {
            let outcome = catch_unwind(AssertUnwindSafe(|| self.bring_up(config, descriptor, &table)))
                .unwrap_or_else(|payload| {
                    Err(Error::ServiceInit {
                        base: descriptor.base().to_string(),
                        source: panicked(payload),
                    })
                });
            match outcome {
                Ok(service) => {
                    table.by_base.insert(descriptor.base().to_string(), service.clone());
                    table.teardown.push_front(RegisteredService {
                        base: descriptor.base().to_string(),
                        implementation: descriptor.implementation().to_string(),
                        service,
                    });
                    self.table.store(Arc::new(table.clone()));
                    self.metrics.services.initialized.inc();
                    successful += 1;
                    log_info!(
                        "Service '{}' initialized ({})",
                        descriptor.base(),
                        descriptor.implementation()
                    );
                }
                Err(e) => {
                    self.metrics.services.failures.with_label_values(&["init"]).inc();
                    log_error!("Skipping service '{}': {}", descriptor.base(), e);
                }
            }
        }

        *self.phase.lock() = Phase::Initialized;

        if successful < attempted {
            log_warn!("Services initialized ({}/{} successful)", successful, attempted);
            return Err(Error::PartialInitialization {
                successful,
                attempted,
            });
        }
        log_info!("All {} services initialized", successful);
        Ok(())
    }

    /// Run the second phase on every registered service.
    ///
    /// Does nothing unless initialized. Failures are logged individually and
    /// reported together as [`Error::PartialPostInit`]; the phase is unchanged.
    pub fn post_init(&self, config: &HostConfig) -> Result<()> {
        if self.phase() != Phase::Initialized {
            log_debug!("Service manager not initialized, ignoring post_init");
            return Ok(());
        }

        let table = self.table.load_full();
        let total = table.teardown.len();
        let mut successful = 0;

        for registered in &table.teardown {
            match contained(|| registered.service.post_init(config)) {
                Ok(()) => successful += 1,
                Err(e) => {
                    self.metrics
                        .services
                        .failures
                        .with_label_values(&["post_init"])
                        .inc();
                    log_error!("Service '{}' post-init failed: {}", registered.base, e);
                }
            }
        }

        if successful < total {
            return Err(Error::PartialPostInit { successful, total });
        }
        log_debug!("Post-initialized {} services", total);
        Ok(())
    }

    /// Destroy every registered service, most recently registered first.
    ///
    /// Does nothing unless initialized. Failures are logged and never returned.
    /// Afterwards the manager is [`Phase::Uninitialized`] and may be
    /// initialized again.
    pub fn destroy(&self, config: &HostConfig) {
        if !self.claim(Phase::Initialized, Phase::Destroying) {
            log_debug!("Service manager not initialized, ignoring destroy");
            return;
        }

        let table = self.table.load_full();
        log_info!("Destroying {} services", table.teardown.len());
        for registered in &table.teardown {
            if let Err(e) = contained(|| registered.service.destroy(config)) {
                self.metrics
                    .services
                    .failures
                    .with_label_values(&["destroy"])
                    .inc();
                log_warn!("Service '{}' destroy failed: {}", registered.base, e);
            }
        }

        self.table.store(Arc::new(ServiceTable::default()));
        *self.phase.lock() = Phase::Uninitialized;
    }

    /// Service registered under `base`
    pub fn get_service(&self, base: &str) -> Option<Arc<dyn Service>> {
        self.table.load().by_base.get(base).cloned()
    }

    /// Service registered under `base`, downcast to its concrete type
    pub fn service<T: Service + 'static>(&self, base: &str) -> Option<Arc<T>> {
        let service = self.get_service(base)?;
        <dyn Service as AsAny>::into_any_arc(service).downcast::<T>().ok()
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    /// True once `init` has completed and until `destroy` starts
    pub fn is_initialized(&self) -> bool {
        self.phase() == Phase::Initialized
    }

    /// Number of registered services
    pub fn service_count(&self) -> usize {
        self.table.load().teardown.len()
    }

    /// Registered services in teardown order
    pub fn registered(&self) -> Vec<RegisteredService> {
        self.table.load().teardown.iter().cloned().collect()
    }

    fn claim(&self, from: Phase, to: Phase) -> bool {
        let mut phase = self.phase.lock();
        if *phase == from {
            *phase = to;
            true
        } else {
            false
        }
    }

    fn bring_up(
        &self,
        config: &HostConfig,
        descriptor: &ServiceDescriptor,
        table: &ServiceTable,
    ) -> Result<Arc<dyn Service>> {
        self.catalog.resolve_base(descriptor.base())?;
        if table.by_base.contains_key(descriptor.base()) {
            return Err(Error::config(format!(
                "service base '{}' is already registered",
                descriptor.base()
            )));
        }

        let mut service = self
            .catalog
            .instantiate(descriptor.implementation(), descriptor.base())?;
        service
            .init(config, descriptor.properties())
            .map_err(|source| Error::ServiceInit {
                base: descriptor.base().to_string(),
                source,
            })?;
        Ok(Arc::from(service))
    }
}

/// Run a service hook, turning a panic into an error
fn contained(hook: impl FnOnce() -> std::result::Result<(), ServiceError>) -> std::result::Result<(), ServiceError> {
    catch_unwind(AssertUnwindSafe(hook)).unwrap_or_else(|payload| Err(panicked(payload)))
}

fn panicked(payload: Box<dyn Any + Send>) -> ServiceError {
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic");
    ServiceError::new(format!("service panicked: {}", message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::host::HostContext;
    use crate::types::{Properties, ServiceError};

    #[derive(Default)]
    struct Plain {
        label: String,
    }

    impl Service for Plain {
        fn init(&mut self, _: &HostConfig, properties: &Properties) -> std::result::Result<(), ServiceError> {
            self.label = properties.get_string_or("label", "plain");
            Ok(())
        }
    }

    #[derive(Default)]
    struct Refusing;

    impl Service for Refusing {
        fn init(&mut self, _: &HostConfig, _: &Properties) -> std::result::Result<(), ServiceError> {
            Err(ServiceError::new("refused"))
        }
    }

    fn host() -> HostConfig {
        let context = Arc::new(HostContext::new("test/1.0", Properties::new()));
        HostConfig::new("test", Properties::new(), context)
    }

    fn manager() -> ServiceManager {
        let mut catalog = ServiceCatalog::new();
        catalog
            .register_base("a")
            .register_base("b")
            .register_default::<Plain>("plain", &["a", "b"])
            .register_default::<Refusing>("refusing", &["a", "b"]);
        ServiceManager::new(Arc::new(catalog), Arc::new(ContainerMetrics::new().unwrap()))
    }

    #[test]
    fn test_typed_lookup() {
        let manager = manager();
        manager
            .init(&host(), &[ServiceDescriptor::new("a", "plain").with_property("label", "first")])
            .unwrap();

        let plain = manager.service::<Plain>("a").unwrap();
        assert_eq!(plain.label, "first");
        assert!(manager.service::<Refusing>("a").is_none());
        assert!(manager.service::<Plain>("b").is_none());
    }

    #[test]
    fn test_unknown_names_are_skipped() {
        let manager = manager();
        let err = manager
            .init(
                &host(),
                &[
                    ServiceDescriptor::new("missing", "plain"),
                    ServiceDescriptor::new("a", "ghost"),
                    ServiceDescriptor::new("b", "plain"),
                ],
            )
            .unwrap_err();

        assert!(matches!(err, Error::PartialInitialization { successful: 1, attempted: 3 }));
        assert!(manager.is_initialized());
        assert!(manager.get_service("b").is_some());
        assert_eq!(manager.metrics.services.failures.with_label_values(&["init"]).get(), 2);
    }

    #[test]
    fn test_duplicate_base_is_not_replaced() {
        let manager = manager();
        let err = manager
            .init(
                &host(),
                &[
                    ServiceDescriptor::new("a", "plain").with_property("label", "original"),
                    ServiceDescriptor::new("a", "plain").with_property("label", "replacement"),
                ],
            )
            .unwrap_err();

        assert!(matches!(err, Error::PartialInitialization { successful: 1, attempted: 2 }));
        assert_eq!(manager.service::<Plain>("a").unwrap().label, "original");
        assert_eq!(manager.service_count(), 1);
    }

    #[test]
    fn test_lifecycle_calls_ignored_out_of_phase() {
        let manager = manager();
        manager.post_init(&host()).unwrap();
        manager.destroy(&host());
        assert_eq!(manager.phase(), Phase::Uninitialized);

        let err = manager
            .init(&host(), &[ServiceDescriptor::new("a", "refusing")])
            .unwrap_err();
        assert!(matches!(err, Error::PartialInitialization { successful: 0, attempted: 1 }));
        assert_eq!(manager.phase(), Phase::Initialized);
        assert!(manager.registered().is_empty());
    }
}
