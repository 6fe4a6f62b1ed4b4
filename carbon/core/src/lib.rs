// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

mod context;
mod error;
mod graphite;
mod ingester;
mod metrics;
mod resource_pool;
mod rule_set;
mod scanner;
mod tags;
mod topology;
mod worker_pool;
mod writer;

pub use error::*;
pub use ingester::*;
pub use topology::*;
pub use writer::*;

pub use graphite::MATCH_ALL_PATTERN;
