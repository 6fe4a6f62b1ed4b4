// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use carbon_config::Parameters;
use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Histogram, IntCounter, IntGauge, Registry,
};

/// Metrics of the carbon ingest pipeline.
pub(crate) struct Metrics {
    /// Metrics matched by at least one rule with every write completed.
    pub success: IntCounter,
    /// Metrics whose downstream write failed.
    pub errors: IntCounter,
    /// Lines or metric names that could not be parsed.
    pub malformed: IntCounter,
    /// Seconds from line receipt to write completion.
    pub write_latency: Histogram,
    /// Seconds from the metric's own timestamp to write completion.
    pub ingest_latency: Histogram,
    /// Rule sets compiled and installed after a topology update.
    pub ruleset_updates: IntCounter,
    /// Topology updates rejected by validation.
    pub ruleset_update_errors: IntCounter,
    /// Rules in the active compiled rule set.
    pub active_rules: IntGauge,
    /// Currently open carbon connections.
    pub open_connections: IntGauge,
}

pub(crate) fn initialise_metrics(registry: Registry, parameters: &Parameters) -> Arc<Metrics> {
    Arc::new(Metrics {
        success: register_int_counter_with_registry!(
            "carbon_ingest_success",
            "Metrics matched by at least one rule with every write completed",
            registry
        )
        .unwrap(),
        errors: register_int_counter_with_registry!(
            "carbon_ingest_errors",
            "Metrics whose downstream write failed",
            registry
        )
        .unwrap(),
        malformed: register_int_counter_with_registry!(
            "carbon_ingest_malformed",
            "Lines or metric names that could not be parsed",
            registry
        )
        .unwrap(),
        write_latency: register_histogram_with_registry!(
            "carbon_ingest_write_latency",
            "Seconds from line receipt to write completion",
            parameters.latency_buckets.clone(),
            registry
        )
        .unwrap(),
        ingest_latency: register_histogram_with_registry!(
            "carbon_ingest_ingest_latency",
            "Seconds from the metric's own timestamp to write completion",
            parameters.latency_buckets.clone(),
            registry
        )
        .unwrap(),
        ruleset_updates: register_int_counter_with_registry!(
            "carbon_ingest_ruleset_updates",
            "Rule sets compiled and installed after a topology update",
            registry
        )
        .unwrap(),
        ruleset_update_errors: register_int_counter_with_registry!(
            "carbon_ingest_ruleset_update_errors",
            "Topology updates rejected by validation",
            registry
        )
        .unwrap(),
        active_rules: register_int_gauge_with_registry!(
            "carbon_ingest_active_rules",
            "Rules in the active compiled rule set",
            registry
        )
        .unwrap(),
        open_connections: register_int_gauge_with_registry!(
            "carbon_ingest_open_connections",
            "Currently open carbon connections",
            registry
        )
        .unwrap(),
    })
}

#[cfg(test)]
pub(crate) fn test_metrics() -> Arc<Metrics> {
    initialise_metrics(Registry::new(), &Parameters::default())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn metrics_register_against_a_fresh_registry() {
        let metrics = test_metrics();
        metrics.success.inc();
        metrics.malformed.inc();
        metrics.write_latency.observe(0.01);
        assert_eq!(metrics.success.get(), 1);
        assert_eq!(metrics.errors.get(), 0);
        assert_eq!(metrics.malformed.get(), 1);
        assert_eq!(metrics.write_latency.get_sample_count(), 1);
        assert_eq!(metrics.ingest_latency.get_sample_count(), 0);
    }
}
