// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the carbon ingest pipeline.
///
/// Per-metric errors are counted and logged by the pipeline itself and never
/// reach the caller; only construction-time configuration problems bubble out
/// of [`Ingester::new`].
///
/// [`Ingester::new`]: crate::Ingester::new
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("metric name is empty")]
    EmptyName,

    #[error("metric name contains consecutive separators: {0}")]
    DuplicateSeparator(String),

    #[error("rule sets both pattern {pattern:?} and contains {contains:?}")]
    MixedMatchers { pattern: String, contains: String },

    #[error("invalid rule pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("no worker pool configured")]
    NoWorkerPool,

    #[error("both static and dynamic worker pools configured")]
    MultipleWorkerPools,

    #[error("multiple aggregated namespaces with resolution {resolution:?} and retention {retention:?}")]
    DuplicateClusterNamespace {
        resolution: Duration,
        retention: Duration,
    },

    #[error("rule repeats storage policy {resolution:?}:{retention:?}")]
    DuplicateStoragePolicy {
        resolution: Duration,
        retention: Duration,
    },

    #[error("rule without aggregation mixes resolutions {first:?} and {second:?}")]
    MixedResolutionWithoutAggregation { first: Duration, second: Duration },

    #[error("no aggregated namespace for storage policy {resolution:?}:{retention:?}")]
    UnknownStoragePolicy {
        resolution: Duration,
        retention: Duration,
    },

    #[error("no ingestion rules available")]
    NoRules,

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

pub type IngestResult<T> = Result<T, IngestError>;
