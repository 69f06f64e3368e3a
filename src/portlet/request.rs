//! Request/response adaptation between the host transport and portlets
//!
//! The host hands the registry a [`HostRequest`] and [`HostResponse`]. For the
//! duration of one dispatch the registry attaches call-scoped attributes to the
//! host request through a [`CallScope`] and exposes the pair to the portlet as a
//! [`PortletRequest`] / [`PortletResponse`] bound to that call.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::core::host::Attribute;
use crate::portlet::context::PortletConfig;
use crate::types::{PortletError, Properties};

/// Request attribute holding the invoked portlet's config during a call
pub const CONFIG_ATTRIBUTE: &str = "portlet.config";

/// Request attribute holding the invoked [`Method`] during a call
pub const METHOD_ATTRIBUTE: &str = "portlet.method";

/// Kind of call dispatched into a portlet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Process an action (state-changing request)
    Action,
    /// Render the portlet's markup
    Render,
    /// Load the portlet without calling into it
    Noop,
}

impl Method {
    /// Lowercase name used in logs, metrics and errors
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Action => "action",
            Method::Render => "render",
            Method::Noop => "noop",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport-level request received by the host
#[derive(Default)]
pub struct HostRequest {
    path: String,
    parameters: Properties,
    attributes: HashMap<String, Attribute>,
}

impl HostRequest {
    /// Create a request for a path
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Add a request parameter
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.add(name, value);
        self
    }

    /// Request path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Request parameters
    pub fn parameters(&self) -> &Properties {
        &self.parameters
    }

    /// Store an attribute, replacing any previous value
    pub fn set_attribute<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.attributes.insert(name.into(), Arc::new(value));
    }

    /// Store an already shared attribute
    pub fn set_shared_attribute(&mut self, name: impl Into<String>, value: Attribute) {
        self.attributes.insert(name.into(), value);
    }

    /// Get an attribute
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Get an attribute of a concrete type
    pub fn attribute_as<T: Any + Send + Sync>(&self, name: &str) -> Option<&T> {
        self.attributes.get(name).and_then(|value| value.downcast_ref::<T>())
    }

    /// Remove an attribute
    pub fn remove_attribute(&mut self, name: &str) -> Option<Attribute> {
        self.attributes.remove(name)
    }

    /// True if the attribute is present
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }
}

impl fmt::Debug for HostRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostRequest")
            .field("path", &self.path)
            .field("parameters", &self.parameters)
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Transport-level response the host sends back
#[derive(Debug, Clone, Default)]
pub struct HostResponse {
    content_type: Option<String>,
    body: String,
    render_parameters: Properties,
    redirect: Option<String>,
}

impl HostResponse {
    /// Create an empty response
    pub fn new() -> Self {
        Self::default()
    }

    /// Content type set by the portlet
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Markup written so far
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Render parameters set during an action
    pub fn render_parameters(&self) -> &Properties {
        &self.render_parameters
    }

    /// Redirect location set during an action
    pub fn redirect(&self) -> Option<&str> {
        self.redirect.as_deref()
    }
}

/// Guard that keeps call-scoped attributes on a host request.
///
/// The attributes are removed when the guard is dropped, whether the portlet
/// call returned normally, failed, or panicked.
pub struct CallScope<'a> {
    request: &'a mut HostRequest,
}

impl<'a> CallScope<'a> {
    /// Attach the config and method attributes to the request
    pub fn enter(request: &'a mut HostRequest, config: Arc<PortletConfig>, method: Method) -> Self {
        request.set_shared_attribute(CONFIG_ATTRIBUTE, config);
        request.set_attribute(METHOD_ATTRIBUTE, method);
        Self { request }
    }
}

impl Deref for CallScope<'_> {
    type Target = HostRequest;

    fn deref(&self) -> &Self::Target {
        self.request
    }
}

impl DerefMut for CallScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.request
    }
}

impl Drop for CallScope<'_> {
    fn drop(&mut self) {
        self.request.remove_attribute(CONFIG_ATTRIBUTE);
        self.request.remove_attribute(METHOD_ATTRIBUTE);
    }
}

/// Request as seen by a portlet during one call
pub struct PortletRequest<'a> {
    host: &'a mut HostRequest,
    config: &'a PortletConfig,
    method: Method,
}

impl<'a> PortletRequest<'a> {
    /// Bind a portlet request to the host request of this call
    pub fn bind(host: &'a mut HostRequest, config: &'a PortletConfig, method: Method) -> Self {
        Self { host, config, method }
    }

    /// Method being invoked
    pub fn method(&self) -> Method {
        self.method
    }

    /// Path of the underlying host request
    pub fn path(&self) -> &str {
        self.host.path()
    }

    /// First value of a request parameter
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.host.parameters().get(name)
    }

    /// All request parameters
    pub fn parameters(&self) -> &Properties {
        self.host.parameters()
    }

    /// Request attribute
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.host.attribute(name)
    }

    /// Store a request attribute
    pub fn set_attribute<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.host.set_attribute(name, value);
    }

    /// Config of the portlet handling the call
    pub fn portlet_config(&self) -> &PortletConfig {
        self.config
    }
}

/// Response as seen by a portlet during one call
pub struct PortletResponse<'a> {
    host: &'a mut HostResponse,
    method: Method,
}

impl<'a> PortletResponse<'a> {
    /// Bind a portlet response to the host response of this call
    pub fn bind(host: &'a mut HostResponse, method: Method) -> Self {
        Self { host, method }
    }

    /// Set the response content type
    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.host.content_type = Some(content_type.into());
    }

    /// Append markup. Only allowed while rendering.
    pub fn write(&mut self, markup: &str) -> Result<(), PortletError> {
        self.require(Method::Render, "write")?;
        self.host.body.push_str(markup);
        Ok(())
    }

    /// Set a parameter for the following render. Only allowed in an action.
    pub fn set_render_parameter(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), PortletError> {
        self.require(Method::Action, "set_render_parameter")?;
        self.host.render_parameters.add(name, value);
        Ok(())
    }

    /// Redirect the client. Only allowed in an action.
    pub fn send_redirect(&mut self, location: impl Into<String>) -> Result<(), PortletError> {
        self.require(Method::Action, "send_redirect")?;
        self.host.redirect = Some(location.into());
        Ok(())
    }

    fn require(&self, method: Method, operation: &str) -> Result<(), PortletError> {
        if self.method == method {
            Ok(())
        } else {
            Err(PortletError::new(format!(
                "{} is not allowed during {}",
                operation, self.method
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::host::HostContext;
    use crate::portlet::context::PortletContext;
    use crate::portlet::definition::{PortletApplication, PortletDefinition};

    fn config() -> Arc<PortletConfig> {
        let host = Arc::new(HostContext::new("test/1.0", Properties::new()));
        let app = Arc::new(PortletApplication::new("app", "/app"));
        let definition = PortletDefinition::new("p", "hello", app.clone());
        Arc::new(PortletConfig::new(&definition, Arc::new(PortletContext::new(host, app))))
    }

    #[test]
    fn test_call_scope_removes_attributes_on_drop() {
        let mut request = HostRequest::new("/portal");
        request.set_attribute("user", "alice".to_string());
        {
            let scope = CallScope::enter(&mut request, config(), Method::Render);
            assert!(scope.has_attribute(CONFIG_ATTRIBUTE));
            assert_eq!(scope.attribute_as::<Method>(METHOD_ATTRIBUTE), Some(&Method::Render));
        }
        assert!(!request.has_attribute(CONFIG_ATTRIBUTE));
        assert!(!request.has_attribute(METHOD_ATTRIBUTE));
        assert!(request.has_attribute("user"));
    }

    #[test]
    fn test_response_enforces_phase() {
        let mut host = HostResponse::new();
        {
            let mut response = PortletResponse::bind(&mut host, Method::Render);
            response.write("<p>hi</p>").unwrap();
            assert!(response.send_redirect("/elsewhere").is_err());
            assert!(response.set_render_parameter("a", "b").is_err());
        }
        {
            let mut response = PortletResponse::bind(&mut host, Method::Action);
            assert!(response.write("late").is_err());
            response.set_render_parameter("a", "b").unwrap();
            response.send_redirect("/done").unwrap();
        }
        assert_eq!(host.body(), "<p>hi</p>");
        assert_eq!(host.render_parameters().get("a"), Some("b"));
        assert_eq!(host.redirect(), Some("/done"));
    }
}
