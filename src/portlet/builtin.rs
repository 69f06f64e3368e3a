//! Portlets shipped with the container

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::catalog::PortletCatalog;
use crate::portlet::{Portlet, PortletConfig, PortletRequest, PortletResponse};
use crate::types::PortletError;

/// Implementation name of [`HelloPortlet`]
pub const HELLO: &str = "hello";

/// Implementation name of [`CounterPortlet`]
pub const COUNTER: &str = "counter";

/// Greets the caller.
///
/// The greeting comes from the `greeting` init parameter (default `Hello`).
/// Render uses the `name` request parameter, falling back to a render parameter
/// carried over from the last action.
pub struct HelloPortlet {
    greeting: RwLock<String>,
}

impl Default for HelloPortlet {
    fn default() -> Self {
        Self {
            greeting: RwLock::new("Hello".to_string()),
        }
    }
}

impl Portlet for HelloPortlet {
    fn init(&self, config: &PortletConfig) -> Result<(), PortletError> {
        if let Some(greeting) = config.init_parameter("greeting") {
            *self.greeting.write() = greeting.to_string();
        }
        config
            .portlet_context()
            .log(&format!("{} ready", config.display_name()));
        Ok(())
    }

    fn process_action(
        &self,
        request: &mut PortletRequest<'_>,
        response: &mut PortletResponse<'_>,
    ) -> Result<(), PortletError> {
        let name = request
            .parameter("name")
            .ok_or_else(|| PortletError::new("missing 'name' parameter"))?
            .to_string();
        response.set_render_parameter("name", name)
    }

    fn render(
        &self,
        request: &mut PortletRequest<'_>,
        response: &mut PortletResponse<'_>,
    ) -> Result<(), PortletError> {
        let name = request.parameter("name").unwrap_or("world");
        response.set_content_type("text/html");
        response.write(&format!("<p>{}, {}!</p>", self.greeting.read(), name))
    }
}

/// Counts actions and renders the running total
#[derive(Default)]
pub struct CounterPortlet {
    count: AtomicU64,
}

impl CounterPortlet {
    /// Current count
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Portlet for CounterPortlet {
    fn init(&self, config: &PortletConfig) -> Result<(), PortletError> {
        let start = config
            .init_parameters()
            .get_integer_or("start", 0)
            .map_err(|e| PortletError::with_source("invalid 'start' parameter", e))?;
        let start = u64::try_from(start)
            .map_err(|e| PortletError::with_source("'start' must not be negative", e))?;
        self.count.store(start, Ordering::Relaxed);
        Ok(())
    }

    fn process_action(
        &self,
        request: &mut PortletRequest<'_>,
        response: &mut PortletResponse<'_>,
    ) -> Result<(), PortletError> {
        let step = match request.parameter("step") {
            Some(step) => step
                .parse::<u64>()
                .map_err(|e| PortletError::with_source("invalid 'step' parameter", e))?,
            None => 1,
        };
        let total = self.count.fetch_add(step, Ordering::Relaxed) + step;
        response.set_render_parameter("count", total.to_string())
    }

    fn render(
        &self,
        _request: &mut PortletRequest<'_>,
        response: &mut PortletResponse<'_>,
    ) -> Result<(), PortletError> {
        response.set_content_type("text/plain");
        response.write(&self.count().to_string())
    }
}

/// Register the built-in portlets under their implementation names
pub fn register_builtin_portlets(catalog: &mut PortletCatalog) {
    catalog
        .register_default::<HelloPortlet>(HELLO)
        .register_default::<CounterPortlet>(COUNTER);
}
