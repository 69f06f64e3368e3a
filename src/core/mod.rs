//! Core application logic and configuration
//!
//! This module contains the host context, configuration, logging setup and the
//! application state that ties the portlet registry and service manager together.

/// Host context and config
pub mod host;

/// Application configuration
pub mod config;

/// Logging macros and subscriber setup
pub mod logging;

/// Application state management
pub mod app_state;

/// Factory pattern for app creation
pub mod factory;

// Re-export commonly used items
pub use app_state::AppState;
pub use config::{load_config, load_config_or_default, Config};
pub use factory::{create_app_state, create_default_app_state};
pub use host::{HostConfig, HostContext};
