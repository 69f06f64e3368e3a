//! System utilities and monitoring
//!
//! This module contains metrics collection for the container runtime.

pub mod metrics;

pub use metrics::{ContainerMetrics, Timer};
