// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use carbon_config::Parameters;

use crate::metrics::Metrics;

/// Context contains the configuration and metrics shared by all components
/// of the ingester.
#[derive(Clone)]
pub(crate) struct Context {
    /// Operational parameters of this ingester.
    pub parameters: Parameters,
    /// Metrics of this ingester.
    pub metrics: Arc<Metrics>,
}

impl Context {
    pub(crate) fn new(parameters: Parameters, metrics: Arc<Metrics>) -> Self {
        Self {
            parameters,
            metrics,
        }
    }
}
