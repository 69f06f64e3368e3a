//! Identifier types for portlets and services.
//!
//! Identifiers are cheap to clone: they are shared string slices, since the same
//! identifier is used as a cache key on every dispatch.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Stable identifier of a portlet definition, used as the registry cache key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortletId(Arc<str>);

impl PortletId {
    /// Create an identifier from any string
    pub fn new(id: impl AsRef<str>) -> Self {
        PortletId(Arc::from(id.as_ref()))
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PortletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PortletId {
    fn from(id: &str) -> Self {
        PortletId::new(id)
    }
}

impl From<String> for PortletId {
    fn from(id: String) -> Self {
        PortletId(Arc::from(id))
    }
}

impl Borrow<str> for PortletId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
