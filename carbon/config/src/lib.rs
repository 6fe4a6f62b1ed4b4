// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

mod parameters;
mod rules;

pub use parameters::*;
pub use rules::*;
