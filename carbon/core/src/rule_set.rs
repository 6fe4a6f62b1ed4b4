// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use carbon_config::RuleConfig;
use regex::bytes::Regex;

use crate::error::{IngestError, IngestResult};
use crate::graphite;
use crate::writer::{MappingRule, StoragePolicy, WriteOptions};

/// How a compiled rule decides whether it applies to a metric name.
#[derive(Debug)]
pub(crate) enum Matcher {
    /// Applies to every metric.
    All,
    Regex(Regex),
    Contains(Vec<u8>),
}

impl Matcher {
    pub(crate) fn matches(&self, name: &[u8]) -> bool {
        match self {
            Matcher::All => true,
            Matcher::Regex(regex) => regex.is_match(name),
            Matcher::Contains(needle) => contains_subslice(name, needle),
        }
    }
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}

/// A rule compiled against the current cluster topology. `options` carries
/// either mapping rules (aggregation enabled) or storage policies
/// (aggregation disabled), never both.
#[derive(Debug)]
pub(crate) struct CompiledRule {
    pub rule: RuleConfig,
    pub matcher: Matcher,
    pub options: WriteOptions,
}

/// Compiles rules in configuration order. Order defines match priority.
pub(crate) fn compile_rules(rules: &[RuleConfig]) -> IngestResult<Vec<CompiledRule>> {
    rules.iter().map(compile_rule).collect()
}

fn compile_rule(rule: &RuleConfig) -> IngestResult<CompiledRule> {
    let matcher = compile_matcher(rule)?;

    let storage_policies: Vec<StoragePolicy> = rule
        .policies
        .iter()
        .map(|policy| StoragePolicy::with_seconds_precision(policy.resolution, policy.retention))
        .collect();

    let options = if rule.aggregation.is_enabled() {
        WriteOptions {
            downsample_override: true,
            mapping_rules: vec![MappingRule {
                aggregations: vec![rule.aggregation.aggregation_type()],
                storage_policies,
            }],
            write_override: true,
            storage_policies: Vec::new(),
        }
    } else {
        WriteOptions {
            downsample_override: true,
            mapping_rules: Vec::new(),
            write_override: true,
            storage_policies,
        }
    };

    Ok(CompiledRule {
        rule: rule.clone(),
        matcher,
        options,
    })
}

fn compile_matcher(rule: &RuleConfig) -> IngestResult<Matcher> {
    if !rule.pattern.is_empty() && !rule.contains.is_empty() {
        return Err(IngestError::MixedMatchers {
            pattern: rule.pattern.clone(),
            contains: rule.contains.clone(),
        });
    }
    if !rule.contains.is_empty() {
        return Ok(Matcher::Contains(rule.contains.clone().into_bytes()));
    }
    // Both empty only happens for the synthesized match-all defaults.
    if rule.pattern.is_empty() || rule.pattern == graphite::MATCH_ALL_PATTERN {
        return Ok(Matcher::All);
    }
    Ok(Matcher::Regex(Regex::new(&rule.pattern)?))
}
