//! Portlet instance cache and dispatcher
//!
//! The registry guarantees one live instance, context and config per portlet
//! definition regardless of how many threads dispatch to it concurrently.
//!
//! Two critical sections are involved:
//!
//! 1. The registry-wide instance map lock, held only while checking for (and on a
//!    miss constructing) the instance of one definition.
//! 2. A per-instance one-time cell guarding context/config creation and the
//!    portlet's `init` hook. Only threads racing on that same portlet wait on it,
//!    so a slow `init` never delays dispatches to other portlets.
//!
//! Locks are only ever taken in that order, and the first is released before the
//! second is entered. Neither a failed construction nor a failed `init` is
//! remembered: the next dispatch tries again.
//!
//! [`PortletRegistry::destroy_all`] closes the registry for good. Dispatches that
//! start afterwards fail with [`Error::ShutDown`] instead of building fresh
//! instances, but a call that already holds its instance still runs to the end,
//! so teardown belongs after the host has stopped sending traffic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::catalog::PortletCatalog;
use crate::core::host::HostContext;
use crate::portlet::context::{PortletConfig, PortletContext};
use crate::portlet::definition::PortletDefinition;
use crate::portlet::request::{CallScope, HostRequest, HostResponse, Method, PortletRequest, PortletResponse};
use crate::portlet::Portlet;
use crate::system::metrics::{ContainerMetrics, Timer};
use crate::types::{Error, PortletId, Result};
use crate::{log_debug, log_error, log_info, log_warn};

/// Context and config created by a portlet's successful `init`
struct PortletSession {
    context: Arc<PortletContext>,
    config: Arc<PortletConfig>,
}

/// One cached portlet instance and its lazily created session
struct PortletEntry {
    portlet: Arc<dyn Portlet>,
    session: OnceCell<PortletSession>,
}

/// Thread-safe cache of portlet instances and dispatcher into them
pub struct PortletRegistry {
    catalog: Arc<PortletCatalog>,
    host: Arc<HostContext>,
    instances: Mutex<HashMap<PortletId, Arc<PortletEntry>>>,
    // only flipped while `instances` is locked
    closed: AtomicBool,
    metrics: Arc<ContainerMetrics>,
}

impl PortletRegistry {
    /// Create an empty registry resolving implementations from `catalog`
    pub fn new(catalog: Arc<PortletCatalog>, host: Arc<HostContext>, metrics: Arc<ContainerMetrics>) -> Self {
        Self {
            catalog,
            host,
            instances: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            metrics,
        }
    }

    /// Dispatch an action call
    pub fn action(
        &self,
        definition: &PortletDefinition,
        request: &mut HostRequest,
        response: &mut HostResponse,
    ) -> Result<()> {
        self.dispatch(definition, request, response, Method::Action)
    }

    /// Dispatch a render call
    pub fn render(
        &self,
        definition: &PortletDefinition,
        request: &mut HostRequest,
        response: &mut HostResponse,
    ) -> Result<()> {
        self.dispatch(definition, request, response, Method::Render)
    }

    /// Make sure the portlet is constructed and initialized without calling it
    pub fn load(
        &self,
        definition: &PortletDefinition,
        request: &mut HostRequest,
        response: &mut HostResponse,
    ) -> Result<()> {
        self.dispatch(definition, request, response, Method::Noop)
    }

    /// Dispatch one call into the portlet described by `definition`.
    ///
    /// The instance and its context/config are created on first use. Errors from
    /// the portlet's `process_action` or `render` come back as
    /// [`Error::ComponentInvocation`].
    pub fn dispatch(
        &self,
        definition: &PortletDefinition,
        request: &mut HostRequest,
        response: &mut HostResponse,
        method: Method,
    ) -> Result<()> {
        let timer = Timer::start(&self.metrics.portlets.dispatch_duration);
        self.metrics
            .portlets
            .dispatches
            .with_label_values(&[method.as_str()])
            .inc();

        let result = self
            .acquire_instance(definition)
            .and_then(|entry| {
                let session = self.acquire_session(definition, &entry)?;
                self.invoke(definition, &entry, session, request, response, method)
            });

        if result.is_err() {
            self.metrics
                .portlets
                .dispatch_failures
                .with_label_values(&[method.as_str()])
                .inc();
        }
        timer.finish();
        result
    }

    /// True if an instance exists for the identifier
    pub fn is_loaded(&self, id: &str) -> bool {
        self.instances.lock().contains_key(id)
    }

    /// True if the portlet's `init` has completed successfully
    pub fn is_initialized(&self, id: &str) -> bool {
        self.entry(id).is_some_and(|entry| entry.session.get().is_some())
    }

    /// Number of cached instances
    pub fn loaded_count(&self) -> usize {
        self.instances.lock().len()
    }

    /// Config of an initialized portlet
    pub fn portlet_config(&self, id: &str) -> Option<Arc<PortletConfig>> {
        self.entry(id)
            .and_then(|entry| entry.session.get().map(|session| session.config.clone()))
    }

    /// Context of an initialized portlet
    pub fn portlet_context(&self, id: &str) -> Option<Arc<PortletContext>> {
        self.entry(id)
            .and_then(|entry| entry.session.get().map(|session| session.context.clone()))
    }

    /// True once [`PortletRegistry::destroy_all`] has run
    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Destroy every initialized portlet, empty the cache and refuse further
    /// dispatches.
    ///
    /// Call this after traffic has stopped: a dispatch already holding its
    /// instance is not waited for and may still run against a destroyed portlet.
    pub fn destroy_all(&self) {
        let instances = {
            let mut guard = self.instances.lock();
            self.closed.store(true, Ordering::Release);
            std::mem::take(&mut *guard)
        };
        log_info!("Destroying {} portlets", instances.len());
        for (id, entry) in instances {
            if entry.session.get().is_some() {
                log_debug!("Destroying portlet '{}'", id);
                entry.portlet.destroy();
            }
        }
    }

    fn entry(&self, id: &str) -> Option<Arc<PortletEntry>> {
        self.instances.lock().get(id).cloned()
    }

    /// Registry-wide section: find or construct the instance
    fn acquire_instance(&self, definition: &PortletDefinition) -> Result<Arc<PortletEntry>> {
        let mut instances = self.instances.lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ShutDown);
        }
        if let Some(entry) = instances.get(definition.id()) {
            return Ok(entry.clone());
        }

        let portlet = self
            .catalog
            .instantiate(definition.implementation())
            .map_err(|e| {
                self.metrics.portlets.instantiation_failures.inc();
                log_warn!("Can't instantiate portlet '{}': {}", definition.id(), e);
                Error::from(e)
            })?;

        let entry = Arc::new(PortletEntry {
            portlet,
            session: OnceCell::new(),
        });
        instances.insert(definition.id().clone(), entry.clone());
        self.metrics.portlets.instantiated.inc();
        log_debug!(
            "Instantiated portlet '{}' ({})",
            definition.id(),
            definition.implementation()
        );
        Ok(entry)
    }

    /// Instance-scoped section: build context/config and run `init` once
    fn acquire_session<'e>(
        &self,
        definition: &PortletDefinition,
        entry: &'e PortletEntry,
    ) -> Result<&'e PortletSession> {
        entry.session.get_or_try_init(|| {
            let context = Arc::new(PortletContext::new(
                self.host.clone(),
                definition.application().clone(),
            ));
            let config = Arc::new(PortletConfig::new(definition, context.clone()));

            entry.portlet.init(&config).map_err(|source| {
                self.metrics.portlets.init_failures.inc();
                log_error!("Portlet '{}' init failed: {}", definition.id(), source);
                Error::ComponentInit {
                    portlet: definition.id().to_string(),
                    source,
                }
            })?;

            self.metrics.portlets.initialized.inc();
            log_info!("Portlet '{}' initialized", definition.id());
            Ok(PortletSession { context, config })
        })
    }

    fn invoke(
        &self,
        definition: &PortletDefinition,
        entry: &PortletEntry,
        session: &PortletSession,
        request: &mut HostRequest,
        response: &mut HostResponse,
        method: Method,
    ) -> Result<()> {
        let mut scope = CallScope::enter(request, session.config.clone(), method);

        let outcome = match method {
            Method::Action => {
                let mut portlet_request = PortletRequest::bind(&mut scope, &session.config, method);
                let mut portlet_response = PortletResponse::bind(response, method);
                entry
                    .portlet
                    .process_action(&mut portlet_request, &mut portlet_response)
            }
            Method::Render => {
                let mut portlet_request = PortletRequest::bind(&mut scope, &session.config, method);
                let mut portlet_response = PortletResponse::bind(response, method);
                entry.portlet.render(&mut portlet_request, &mut portlet_response)
            }
            Method::Noop => Ok(()),
        };

        outcome.map_err(|source| {
            log_warn!(
                "Portlet '{}' failed during {}: {}",
                definition.id(),
                method,
                source
            );
            Error::ComponentInvocation {
                portlet: definition.id().to_string(),
                method: method.as_str(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portlet::definition::PortletApplication;
    use crate::portlet::request::{CONFIG_ATTRIBUTE, METHOD_ATTRIBUTE};
    use crate::types::{PortletError, Properties};
    use std::sync::atomic::AtomicUsize;

    /// Records which hooks ran and can be told to fail
    #[derive(Default)]
    struct Recorder {
        inits: AtomicUsize,
        actions: AtomicUsize,
        renders: AtomicUsize,
        fail_init: bool,
        fail_render: bool,
    }

    impl Portlet for Recorder {
        fn init(&self, _config: &PortletConfig) -> std::result::Result<(), PortletError> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            if self.fail_init {
                return Err(PortletError::new("init refused"));
            }
            Ok(())
        }

        fn process_action(
            &self,
            _request: &mut PortletRequest<'_>,
            _response: &mut PortletResponse<'_>,
        ) -> std::result::Result<(), PortletError> {
            self.actions.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn render(
            &self,
            request: &mut PortletRequest<'_>,
            response: &mut PortletResponse<'_>,
        ) -> std::result::Result<(), PortletError> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            assert!(request.attribute(CONFIG_ATTRIBUTE).is_some());
            if self.fail_render {
                return Err(PortletError::new("render refused"));
            }
            response.write(request.portlet_config().portlet_name().as_str())
        }
    }

    fn registry(catalog: PortletCatalog) -> PortletRegistry {
        PortletRegistry::new(
            Arc::new(catalog),
            Arc::new(HostContext::new("test/1.0", Properties::new())),
            Arc::new(ContainerMetrics::new().unwrap()),
        )
    }

    fn definition(id: &str, implementation: &str) -> PortletDefinition {
        PortletDefinition::new(id, implementation, Arc::new(PortletApplication::new("app", "/app")))
    }

    #[test]
    fn test_render_creates_instance_once() {
        let mut catalog = PortletCatalog::new();
        catalog.register_default::<Recorder>("recorder");
        let registry = registry(catalog);
        let def = definition("p1", "recorder");

        for _ in 0..3 {
            let mut request = HostRequest::new("/");
            let mut response = HostResponse::new();
            registry.render(&def, &mut request, &mut response).unwrap();
            assert_eq!(response.body(), "p1");
            assert!(!request.has_attribute(CONFIG_ATTRIBUTE));
        }

        assert_eq!(registry.loaded_count(), 1);
        assert!(registry.is_initialized("p1"));
        assert_eq!(registry.metrics.portlets.instantiated.get(), 1);
        assert_eq!(registry.metrics.portlets.initialized.get(), 1);
    }

    #[test]
    fn test_noop_loads_without_calling() {
        let mut catalog = PortletCatalog::new();
        catalog.register_default::<Recorder>("recorder");
        let registry = registry(catalog);
        let def = definition("p1", "recorder");

        let mut request = HostRequest::new("/");
        let mut response = HostResponse::new();
        registry.load(&def, &mut request, &mut response).unwrap();

        assert!(registry.is_loaded("p1"));
        assert!(registry.is_initialized("p1"));
        assert!(registry.portlet_config("p1").is_some());
        assert!(registry.portlet_context("p1").is_some());
        assert_eq!(response.body(), "");
        assert!(!request.has_attribute(METHOD_ATTRIBUTE));
    }

    #[test]
    fn test_unknown_implementation_is_retried() {
        let registry = registry(PortletCatalog::new());
        let def = definition("ghost", "missing");

        for _ in 0..2 {
            let err = registry
                .render(&def, &mut HostRequest::new("/"), &mut HostResponse::new())
                .unwrap_err();
            assert!(matches!(err, Error::Instantiation(_)));
        }
        assert!(!registry.is_loaded("ghost"));
        assert_eq!(registry.metrics.portlets.instantiation_failures.get(), 2);
    }

    #[test]
    fn test_failed_init_leaves_instance_uninitialized() {
        let mut catalog = PortletCatalog::new();
        catalog.register("stubborn", || {
            Ok(Recorder {
                fail_init: true,
                ..Default::default()
            })
        });
        let registry = registry(catalog);
        let def = definition("s", "stubborn");

        for _ in 0..2 {
            let err = registry
                .render(&def, &mut HostRequest::new("/"), &mut HostResponse::new())
                .unwrap_err();
            assert!(matches!(err, Error::ComponentInit { .. }));
        }
        assert!(registry.is_loaded("s"));
        assert!(!registry.is_initialized("s"));
        assert_eq!(registry.metrics.portlets.instantiated.get(), 1);
        assert_eq!(registry.metrics.portlets.init_failures.get(), 2);
    }

    #[test]
    fn test_render_failure_is_wrapped_and_cleaned_up() {
        let mut catalog = PortletCatalog::new();
        catalog.register("grumpy", || {
            Ok(Recorder {
                fail_render: true,
                ..Default::default()
            })
        });
        let registry = registry(catalog);
        let def = definition("g", "grumpy");
        let mut request = HostRequest::new("/");

        let err = registry
            .render(&def, &mut request, &mut HostResponse::new())
            .unwrap_err();
        match err {
            Error::ComponentInvocation { portlet, method, source } => {
                assert_eq!(portlet, "g");
                assert_eq!(method, "render");
                assert_eq!(source.message(), "render refused");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!request.has_attribute(CONFIG_ATTRIBUTE));
        assert!(!request.has_attribute(METHOD_ATTRIBUTE));
        assert_eq!(
            registry
                .metrics
                .portlets
                .dispatch_failures
                .with_label_values(&["render"])
                .get(),
            1
        );
    }

    #[test]
    fn test_destroy_all_empties_cache() {
        let mut catalog = PortletCatalog::new();
        catalog.register_default::<Recorder>("recorder");
        let registry = registry(catalog);

        registry
            .load(&definition("a", "recorder"), &mut HostRequest::new("/"), &mut HostResponse::new())
            .unwrap();
        registry
            .load(&definition("b", "recorder"), &mut HostRequest::new("/"), &mut HostResponse::new())
            .unwrap();
        assert_eq!(registry.loaded_count(), 2);

        registry.destroy_all();
        assert_eq!(registry.loaded_count(), 0);
        assert!(!registry.is_initialized("a"));
    }

    #[test]
    fn test_dispatch_after_destroy_all_is_refused() {
        let mut catalog = PortletCatalog::new();
        catalog.register_default::<Recorder>("recorder");
        let registry = registry(catalog);
        let def = definition("a", "recorder");

        registry
            .load(&def, &mut HostRequest::new("/"), &mut HostResponse::new())
            .unwrap();
        registry.destroy_all();
        assert!(registry.is_shut_down());

        let err = registry
            .render(&def, &mut HostRequest::new("/"), &mut HostResponse::new())
            .unwrap_err();
        assert!(matches!(err, Error::ShutDown));
        assert_eq!(registry.loaded_count(), 0);
        assert_eq!(registry.metrics.portlets.instantiated.get(), 1);
    }
}
