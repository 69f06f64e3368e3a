//! Logging macros and subscriber setup
//!
//! The `log_*!` macros forward to `tracing` so call sites stay short and the
//! backend can change in one place. [`init_logging`] installs the global
//! subscriber.

use tracing_subscriber::EnvFilter;

use crate::core::config::{LogFormat, LoggingConfig};
use crate::types::{Error, Result};

/// Info level logging - general information messages
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        ::tracing::info!($($arg)*);
    }};
}

/// Warning level logging - potentially problematic situations
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        ::tracing::warn!($($arg)*);
    }};
}

/// Error level logging - error conditions
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        ::tracing::error!($($arg)*);
    }};
}

/// Debug level logging - detailed information for debugging
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        ::tracing::debug!($($arg)*);
    }};
}

/// Trace level logging - very detailed tracing information
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {{
        ::tracing::trace!($($arg)*);
    }};
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set. Fails if a global
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::config(format!("invalid log filter '{}': {}", config.level, e)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    installed.map_err(|e| Error::config(format!("can't install log subscriber: {}", e)))
}
