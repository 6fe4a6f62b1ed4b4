// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// Operational configuration of a carbon ingester.
///
/// All fields affect resource usage and observability only, never which
/// metrics get written where; routing is governed by [`RuleConfig`] and the
/// live cluster topology.
///
/// NOTE: default values should make sense, so most operators should not need
/// to specify any field other than the worker pool flavor.
///
/// [`RuleConfig`]: crate::RuleConfig
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Parameters {
    /// Fixed-size worker pool for the write path. Submission blocks while all
    /// workers are busy. Exactly one of `static_worker_pool` and
    /// `dynamic_worker_pool` must be set.
    #[serde(default)]
    pub static_worker_pool: Option<StaticWorkerPoolParameters>,

    /// Elastic worker pool for the write path. Submission never blocks.
    #[serde(default)]
    pub dynamic_worker_pool: Option<DynamicWorkerPoolParameters>,

    /// Maximum number of idle per-line resource sets kept for reuse.
    #[serde(default = "Parameters::default_max_pooled_resources")]
    pub max_pooled_resources: usize,

    /// Bucket boundaries, in seconds, for the write and ingest latency
    /// histograms.
    #[serde(default = "Parameters::default_latency_buckets")]
    pub latency_buckets: Vec<f64>,

    /// Log every successful write at debug level. Expensive; off by default.
    #[serde(default)]
    pub debug: bool,

    /// Metric name rewriting applied before rule matching.
    #[serde(default)]
    pub rewrite: RewriteParameters,
}

impl Parameters {
    pub fn default_max_pooled_resources() -> usize {
        4096
    }

    pub fn default_latency_buckets() -> Vec<f64> {
        // 1ms to ~67s, doubling.
        vec![
            0.001, 0.002, 0.004, 0.008, 0.016, 0.032, 0.064, 0.128, 0.256, 0.512, 1.024, 2.048,
            4.096, 8.192, 16.384, 32.768, 65.536,
        ]
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            static_worker_pool: None,
            dynamic_worker_pool: Some(DynamicWorkerPoolParameters {}),
            max_pooled_resources: Parameters::default_max_pooled_resources(),
            latency_buckets: Parameters::default_latency_buckets(),
            debug: false,
            rewrite: RewriteParameters::default(),
        }
    }
}

/// Parameters of the bounded worker pool.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct StaticWorkerPoolParameters {
    /// Number of concurrent write workers.
    #[serde(default = "StaticWorkerPoolParameters::default_workers")]
    pub workers: usize,
}

impl StaticWorkerPoolParameters {
    pub fn default_workers() -> usize {
        1024
    }
}

impl Default for StaticWorkerPoolParameters {
    fn default() -> Self {
        Self {
            workers: StaticWorkerPoolParameters::default_workers(),
        }
    }
}

/// Parameters of the elastic worker pool. Presence of this section selects
/// the flavor; the pool itself has no knobs.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct DynamicWorkerPoolParameters {}

/// Metric name rewriting options, applied while copying a scanned name out of
/// the connection buffer.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct RewriteParameters {
    /// Normalize graphite-illegal characters in segment bodies. When false,
    /// names are copied verbatim.
    #[serde(default)]
    pub cleanup: bool,
}
