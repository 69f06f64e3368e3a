//! Metrics collection and monitoring for the portlet container
//!
//! Every runtime owns its own Prometheus [`Registry`], so several containers
//! (or several tests) in one process never collide on metric names.

use std::time::Instant;

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::types::Result;

/// Portlet registry metrics
pub struct PortletMetrics {
    /// Portlet instances constructed
    pub instantiated: IntCounter,
    /// Failed portlet constructions
    pub instantiation_failures: IntCounter,
    /// Successful one-time init calls
    pub initialized: IntCounter,
    /// Failed one-time init calls
    pub init_failures: IntCounter,
    /// Dispatches by method
    pub dispatches: IntCounterVec,
    /// Failed dispatches by method
    pub dispatch_failures: IntCounterVec,
    /// Histogram of dispatch durations in seconds
    pub dispatch_duration: Histogram,
}

/// Service lifecycle metrics
pub struct ServiceMetrics {
    /// Services registered by init
    pub initialized: IntCounter,
    /// Per-service failures by lifecycle phase
    pub failures: IntCounterVec,
}

/// Centralized metrics for one container runtime
pub struct ContainerMetrics {
    registry: Registry,
    /// Portlet registry metrics
    pub portlets: PortletMetrics,
    /// Service lifecycle metrics
    pub services: ServiceMetrics,
}

impl ContainerMetrics {
    /// Create and register all metrics on a fresh registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let portlets = PortletMetrics::new(&registry)?;
        let services = ServiceMetrics::new(&registry)?;
        Ok(Self {
            registry,
            portlets,
            services,
        })
    }

    /// The Prometheus registry holding these metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Collect and return all metrics as a Prometheus-formatted string
    pub fn collect(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families).unwrap_or_default()
    }
}

impl PortletMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let metrics = Self {
            instantiated: IntCounter::new(
                "pc_portlets_instantiated_total",
                "Total number of portlet instances constructed",
            )?,
            instantiation_failures: IntCounter::new(
                "pc_portlet_instantiation_failures_total",
                "Total number of failed portlet constructions",
            )?,
            initialized: IntCounter::new(
                "pc_portlets_initialized_total",
                "Total number of successful portlet init calls",
            )?,
            init_failures: IntCounter::new(
                "pc_portlet_init_failures_total",
                "Total number of failed portlet init calls",
            )?,
            dispatches: IntCounterVec::new(
                Opts::new("pc_dispatches_total", "Total number of portlet dispatches"),
                &["method"],
            )?,
            dispatch_failures: IntCounterVec::new(
                Opts::new("pc_dispatch_failures_total", "Total number of failed portlet dispatches"),
                &["method"],
            )?,
            dispatch_duration: Histogram::with_opts(
                HistogramOpts::new(
                    "pc_dispatch_duration_seconds",
                    "Duration of portlet dispatches in seconds",
                )
                .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            )?,
        };
        registry.register(Box::new(metrics.instantiated.clone()))?;
        registry.register(Box::new(metrics.instantiation_failures.clone()))?;
        registry.register(Box::new(metrics.initialized.clone()))?;
        registry.register(Box::new(metrics.init_failures.clone()))?;
        registry.register(Box::new(metrics.dispatches.clone()))?;
        registry.register(Box::new(metrics.dispatch_failures.clone()))?;
        registry.register(Box::new(metrics.dispatch_duration.clone()))?;
        Ok(metrics)
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let metrics = Self {
            initialized: IntCounter::new(
                "pc_services_initialized_total",
                "Total number of services registered",
            )?,
            failures: IntCounterVec::new(
                Opts::new("pc_service_failures_total", "Total number of service lifecycle failures"),
                &["phase"],
            )?,
        };
        registry.register(Box::new(metrics.initialized.clone()))?;
        registry.register(Box::new(metrics.failures.clone()))?;
        Ok(metrics)
    }
}

/// Timer for measuring operation duration with automatic histogram recording
pub struct Timer {
    start: Instant,
    histogram: Histogram,
}

impl Timer {
    /// Start a new timer
    pub fn start(histogram: &Histogram) -> Self {
        Self {
            start: Instant::now(),
            histogram: histogram.clone(),
        }
    }

    /// Record the elapsed time and consume the timer
    pub fn finish(self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_independent_registries() {
        let first = ContainerMetrics::new().unwrap();
        let second = ContainerMetrics::new().unwrap();

        first.portlets.instantiated.inc();
        first.portlets.dispatches.with_label_values(&["render"]).inc();

        assert_eq!(first.portlets.instantiated.get(), 1);
        assert_eq!(second.portlets.instantiated.get(), 0);
        assert!(first.collect().contains("pc_dispatches_total{method=\"render\"} 1"));
    }

    #[test]
    fn test_timer_records_observation() {
        let metrics = ContainerMetrics::new().unwrap();
        Timer::start(&metrics.portlets.dispatch_duration).finish();
        assert_eq!(metrics.portlets.dispatch_duration.get_sample_count(), 1);
    }
}
