// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::time::Duration;

use carbon_config::{AggregationConfig, RuleConfig, StoragePolicyConfig};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{IngestError, IngestResult};

/// Whether a namespace stores raw or pre-aggregated datapoints. Only
/// aggregated namespaces are valid carbon write targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricsType {
    Unaggregated,
    Aggregated,
}

/// Storage characteristics of one cluster namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct NamespaceAttributes {
    pub metrics_type: MetricsType,
    pub resolution: Duration,
    pub retention: Duration,
}

/// One namespace of the cluster the namespace watcher reports.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClusterNamespace {
    pub namespace_id: String,
    pub attributes: NamespaceAttributes,
}

/// `(resolution, retention)` identity of an aggregated namespace.
pub(crate) type RetentionResolution = (Duration, Duration);

/// Reconciles configured rules against the aggregated namespaces currently
/// present in the cluster, returning the effective rule list to compile.
///
/// When no rules are configured at all, one match-all rule is synthesized
/// per aggregated namespace so every metric is written to every aggregated
/// namespace without aggregation.
///
/// Any error means the caller must keep the previously installed rule set.
pub(crate) fn validate_rules(
    configured: &[RuleConfig],
    namespaces: &[ClusterNamespace],
) -> IngestResult<Vec<RuleConfig>> {
    let mut by_ret_res: BTreeMap<RetentionResolution, &ClusterNamespace> = BTreeMap::new();
    for namespace in namespaces
        .iter()
        .filter(|namespace| namespace.attributes.metrics_type == MetricsType::Aggregated)
    {
        let key = (
            namespace.attributes.resolution,
            namespace.attributes.retention,
        );
        if by_ret_res.insert(key, namespace).is_some() {
            return Err(IngestError::DuplicateClusterNamespace {
                resolution: key.0,
                retention: key.1,
            });
        }
    }

    let rules = if configured.is_empty() {
        let defaults = synthesize_default_rules(&by_ret_res);
        if !defaults.is_empty() {
            info!(
                "no carbon ingestion rules configured; writing all metrics to all {} aggregated namespaces",
                defaults.len()
            );
        }
        defaults
    } else {
        configured.to_vec()
    };

    if rules.is_empty() {
        return Err(IngestError::NoRules);
    }

    for rule in &rules {
        validate_rule_policies(rule, &by_ret_res)?;
    }
    Ok(rules)
}

fn validate_rule_policies(
    rule: &RuleConfig,
    by_ret_res: &BTreeMap<RetentionResolution, &ClusterNamespace>,
) -> IngestResult<()> {
    let mut policies = rule.policies.clone();
    // Sorting makes duplicates adjacent and groups equal resolutions.
    policies.sort_by_key(|policy| (policy.resolution, policy.retention));

    for pair in policies.windows(2) {
        if pair[0] == pair[1] {
            return Err(IngestError::DuplicateStoragePolicy {
                resolution: pair[0].resolution,
                retention: pair[0].retention,
            });
        }
        if !rule.aggregation.is_enabled() && pair[0].resolution != pair[1].resolution {
            return Err(IngestError::MixedResolutionWithoutAggregation {
                first: pair[0].resolution,
                second: pair[1].resolution,
            });
        }
    }

    for policy in &policies {
        if !by_ret_res.contains_key(&(policy.resolution, policy.retention)) {
            return Err(IngestError::UnknownStoragePolicy {
                resolution: policy.resolution,
                retention: policy.retention,
            });
        }
    }
    Ok(())
}

fn synthesize_default_rules(
    by_ret_res: &BTreeMap<RetentionResolution, &ClusterNamespace>,
) -> Vec<RuleConfig> {
    by_ret_res
        .keys()
        .map(|&(resolution, retention)| RuleConfig {
            pattern: String::new(),
            contains: String::new(),
            r#continue: true,
            aggregation: AggregationConfig {
                enabled: Some(false),
                r#type: None,
            },
            policies: vec![StoragePolicyConfig {
                resolution,
                retention,
            }],
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn aggregated(id: &str, resolution: Duration, retention: Duration) -> ClusterNamespace {
        ClusterNamespace {
            namespace_id: id.to_string(),
            attributes: NamespaceAttributes {
                metrics_type: MetricsType::Aggregated,
                resolution,
                retention,
            },
        }
    }

    fn unaggregated(id: &str) -> ClusterNamespace {
        ClusterNamespace {
            namespace_id: id.to_string(),
            attributes: NamespaceAttributes {
                metrics_type: MetricsType::Unaggregated,
                resolution: Duration::from_secs(1),
                retention: Duration::from_secs(60 * 60),
            },
        }
    }

    fn rule_with_policies(policies: Vec<StoragePolicyConfig>, aggregation_enabled: bool) -> RuleConfig {
        RuleConfig {
            pattern: "**".to_string(),
            aggregation: AggregationConfig {
                enabled: Some(aggregation_enabled),
                r#type: None,
            },
            policies,
            ..Default::default()
        }
    }

    fn policy(resolution_secs: u64, retention_secs: u64) -> StoragePolicyConfig {
        StoragePolicyConfig {
            resolution: Duration::from_secs(resolution_secs),
            retention: Duration::from_secs(retention_secs),
        }
    }

    #[test]
    fn accepts_rules_covered_by_the_topology() {
        let namespaces = vec![
            aggregated("agg_10s_6h", Duration::from_secs(10), Duration::from_secs(21600)),
            unaggregated("raw"),
        ];
        let rules = vec![rule_with_policies(vec![policy(10, 21600)], true)];
        let validated = validate_rules(&rules, &namespaces).unwrap();
        assert_eq!(validated, rules);
    }

    #[test]
    fn duplicate_aggregated_namespaces_are_fatal() {
        let namespaces = vec![
            aggregated("a", Duration::from_secs(10), Duration::from_secs(21600)),
            aggregated("b", Duration::from_secs(10), Duration::from_secs(21600)),
        ];
        let rules = vec![rule_with_policies(vec![policy(10, 21600)], true)];
        let err = validate_rules(&rules, &namespaces).unwrap_err();
        assert!(matches!(err, IngestError::DuplicateClusterNamespace { .. }));
    }

    #[test]
    fn duplicate_policies_within_a_rule_are_rejected() {
        let namespaces = vec![aggregated(
            "a",
            Duration::from_secs(10),
            Duration::from_secs(21600),
        )];
        let rules = vec![rule_with_policies(
            vec![policy(10, 21600), policy(10, 21600)],
            true,
        )];
        let err = validate_rules(&rules, &namespaces).unwrap_err();
        assert!(matches!(err, IngestError::DuplicateStoragePolicy { .. }));
    }

    #[test]
    fn mixed_resolutions_require_aggregation() {
        let namespaces = vec![
            aggregated("a", Duration::from_secs(10), Duration::from_secs(21600)),
            aggregated("b", Duration::from_secs(60), Duration::from_secs(86400)),
        ];
        let policies = vec![policy(10, 21600), policy(60, 86400)];

        let err =
            validate_rules(&[rule_with_policies(policies.clone(), false)], &namespaces).unwrap_err();
        assert!(matches!(
            err,
            IngestError::MixedResolutionWithoutAggregation { .. }
        ));

        // The same policies are fine with aggregation on.
        validate_rules(&[rule_with_policies(policies, true)], &namespaces).unwrap();
    }

    #[test]
    fn policies_must_reference_a_known_namespace() {
        let namespaces = vec![aggregated(
            "a",
            Duration::from_secs(10),
            Duration::from_secs(21600),
        )];
        let rules = vec![rule_with_policies(vec![policy(60, 86400)], true)];
        let err = validate_rules(&rules, &namespaces).unwrap_err();
        assert!(matches!(err, IngestError::UnknownStoragePolicy { .. }));
    }

    #[test]
    fn zero_rules_synthesize_one_default_per_aggregated_namespace() {
        let namespaces = vec![
            aggregated("slow", Duration::from_secs(60), Duration::from_secs(86400)),
            aggregated("fast", Duration::from_secs(10), Duration::from_secs(21600)),
            unaggregated("raw"),
        ];
        let rules = validate_rules(&[], &namespaces).unwrap();

        assert_eq!(rules.len(), 2);
        for rule in &rules {
            assert!(rule.pattern.is_empty());
            assert!(rule.contains.is_empty());
            assert!(rule.r#continue);
            assert!(!rule.aggregation.is_enabled());
            assert_eq!(rule.policies.len(), 1);
        }
        // Deterministic order: by (resolution, retention).
        assert_eq!(rules[0].policies[0], policy(10, 21600));
        assert_eq!(rules[1].policies[0], policy(60, 86400));
    }

    #[test]
    fn no_rules_and_no_namespaces_is_an_error() {
        let err = validate_rules(&[], &[unaggregated("raw")]).unwrap_err();
        assert!(matches!(err, IngestError::NoRules));
    }
}
