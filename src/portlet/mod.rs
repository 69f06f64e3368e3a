//! Portlet invocation runtime
//!
//! A [`Portlet`] is a pluggable component identified by its
//! [`PortletDefinition`]. The [`PortletRegistry`] creates one instance per
//! definition on first use, initializes it once with its [`PortletConfig`], and
//! forwards action, render and load calls to it.

/// Portlet definitions and applications
pub mod definition;
/// Portlet context and config
pub mod context;
/// Request/response adaptation
pub mod request;
/// Instance cache and dispatcher
pub mod registry;
/// Portlets shipped with the container
pub mod builtin;

pub use context::{PortletConfig, PortletContext};
pub use definition::{PortletApplication, PortletDefinition};
pub use registry::PortletRegistry;
pub use request::{HostRequest, HostResponse, Method, PortletRequest, PortletResponse};

use crate::types::PortletError;

/// Contract every portlet implementation fulfils.
///
/// Instances are shared between all threads dispatching to the same definition,
/// so per-instance state needs interior mutability.
pub trait Portlet: Send + Sync {
    /// One-time initialization, called before the first dispatch
    fn init(&self, _config: &PortletConfig) -> Result<(), PortletError> {
        Ok(())
    }

    /// Handle an action request
    fn process_action(
        &self,
        request: &mut PortletRequest<'_>,
        response: &mut PortletResponse<'_>,
    ) -> Result<(), PortletError>;

    /// Render the portlet's markup
    fn render(
        &self,
        request: &mut PortletRequest<'_>,
        response: &mut PortletResponse<'_>,
    ) -> Result<(), PortletError>;

    /// Release resources when the host shuts the registry down
    fn destroy(&self) {}
}
