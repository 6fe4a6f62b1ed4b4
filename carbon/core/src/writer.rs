// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use carbon_config::AggregationType;
use tokio_util::sync::CancellationToken;

use crate::error::IngestResult;

/// A metric tag pair. Values are typically zero-copy slices of the metric
/// name buffer; anything a writer retains beyond a call must be copied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub name: Bytes,
    pub value: Bytes,
}

/// A single observation of a metric.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Datapoint {
    /// Unix timestamp in the unit given alongside the datapoints.
    pub timestamp: i64,
    pub value: f64,
}

/// Unit of datapoint timestamps crossing the writer boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeUnit {
    #[default]
    Seconds,
    Milliseconds,
}

/// A `(resolution, precision, retention)` triple identifying the aggregated
/// namespace a write lands in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StoragePolicy {
    /// Granularity at which the namespace stores datapoints.
    pub resolution: Duration,
    /// Precision of stored timestamps.
    pub precision: Duration,
    /// How long the namespace keeps datapoints.
    pub retention: Duration,
}

impl StoragePolicy {
    /// Policy storing timestamps at seconds precision, the precision of the
    /// carbon plaintext protocol.
    pub fn with_seconds_precision(resolution: Duration, retention: Duration) -> Self {
        Self {
            resolution,
            precision: Duration::from_secs(1),
            retention,
        }
    }
}

/// Downstream instruction pairing aggregation functions with the storage
/// policies their output lands in.
#[derive(Clone, Debug, PartialEq)]
pub struct MappingRule {
    pub aggregations: Vec<AggregationType>,
    pub storage_policies: Vec<StoragePolicy>,
}

/// Per-write routing overrides. The ingest path always overrides both
/// downsampling and namespace selection so a metric lands exactly where its
/// matching rule says and nowhere else.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteOptions {
    /// Replace the writer's default downsampling with `mapping_rules`.
    pub downsample_override: bool,
    pub mapping_rules: Vec<MappingRule>,
    /// Replace the writer's default namespace selection with
    /// `storage_policies`.
    pub write_override: bool,
    pub storage_policies: Vec<StoragePolicy>,
}

/// The downstream downsampling-and-writing sink.
///
/// Contract: by the time `write` returns, the writer has copied anything it
/// needs from the borrowed buffers; the caller recycles them immediately.
/// `shutdown` bounds the call process-wide; writers apply their own per-call
/// timeouts beneath it.
#[async_trait]
pub trait MetricsWriter: Send + Sync + 'static {
    async fn write(
        &self,
        shutdown: &CancellationToken,
        tags: &[Tag],
        datapoints: &[Datapoint],
        unit: TimeUnit,
        annotation: Option<Bytes>,
        options: &WriteOptions,
    ) -> IngestResult<()>;
}
