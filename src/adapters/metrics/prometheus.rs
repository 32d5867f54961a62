//! Prometheus Metrics Registry - Store Observability
//!
//! Counts provider operations and every backend failure the provider
//! swallows, so "nothing matched" and "both backends were down" can be
//! told apart from the outside even though callers see the same result.

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Centralized Prometheus metrics for the data provider.
///
/// All metrics follow the naming convention `dual_store_*`.
pub struct StoreMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// Provider-level operations, by operation.
    pub operations: IntCounterVec,
    /// Swallowed backend failures, by backend and operation.
    pub backend_failures: IntCounterVec,
    /// Primary availability (1 = connected, 0 = disconnected).
    pub primary_available: IntGauge,
}

impl StoreMetrics {
    /// Create and register all metrics on a fresh registry.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let operations = IntCounterVec::new(
            Opts::new("dual_store_operations_total", "Provider operations executed"),
            &["operation"],
        )?;

        let backend_failures = IntCounterVec::new(
            Opts::new(
                "dual_store_backend_failures_total",
                "Backend calls that failed and were recovered by the provider",
            ),
            &["backend", "operation"],
        )?;

        let primary_available = IntGauge::new(
            "dual_store_primary_available",
            "Whether the primary store is connected (1=yes, 0=no)",
        )?;

        registry.register(Box::new(operations.clone()))?;
        registry.register(Box::new(backend_failures.clone()))?;
        registry.register(Box::new(primary_available.clone()))?;

        Ok(Self {
            registry,
            operations,
            backend_failures,
            primary_available,
        })
    }

    /// Record one provider operation.
    pub fn record_operation(&self, operation: &str) {
        self.operations.with_label_values(&[operation]).inc();
    }

    /// Record one swallowed backend failure.
    pub fn record_failure(&self, backend: &str, operation: &str) {
        self.backend_failures
            .with_label_values(&[backend, operation])
            .inc();
    }

    /// Failures recorded for one backend/operation pair.
    pub fn failures(&self, backend: &str, operation: &str) -> u64 {
        self.backend_failures
            .with_label_values(&[backend, operation])
            .get()
    }

    /// Sum of all recorded backend failures.
    pub fn total_failures(&self) -> u64 {
        self.registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == "dual_store_backend_failures_total")
            .flat_map(|family| family.get_metric())
            .map(|metric| metric.get_counter().get_value() as u64)
            .sum()
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_are_counted_per_label() {
        let metrics = StoreMetrics::new().unwrap();
        metrics.record_failure("primary", "find");
        metrics.record_failure("primary", "find");
        metrics.record_failure("fallback", "insert_one");

        assert_eq!(metrics.failures("primary", "find"), 2);
        assert_eq!(metrics.failures("fallback", "find"), 0);
        assert_eq!(metrics.total_failures(), 3);
    }

    #[test]
    fn test_render_contains_metric_names() {
        let metrics = StoreMetrics::new().unwrap();
        metrics.record_operation("find");
        metrics.primary_available.set(1);

        let text = metrics.render().unwrap();
        assert!(text.contains("dual_store_operations_total"));
        assert!(text.contains("dual_store_primary_available 1"));
    }
}
