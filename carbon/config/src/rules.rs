// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A single carbon ingestion rule, in the order-sensitive list an operator
/// configures. Metrics are matched against rules in list order; the first
/// match wins unless the matching rule sets `continue`.
///
/// Exactly one of `pattern` and `contains` must be non-empty. Rules with both
/// empty are reserved for the match-all defaults the ingester synthesizes
/// when no rules are configured at all.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct RuleConfig {
    /// Regular expression matched against the full metric name.
    #[serde(default)]
    pub pattern: String,

    /// Substring matched against the full metric name. Cheaper than
    /// `pattern` when a fixed fragment is enough.
    #[serde(default)]
    pub contains: String,

    /// Keep evaluating later rules after this one matches. Each additional
    /// match performs an independent write.
    #[serde(default)]
    pub r#continue: bool,

    /// How matched metrics are aggregated before storage.
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Target storage policies for matched metrics.
    #[serde(default)]
    pub policies: Vec<StoragePolicyConfig>,
}

/// Aggregation behavior of a rule. Both fields are optional so operators can
/// omit the section entirely; aggregation defaults to enabled with `mean`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AggregationConfig {
    pub enabled: Option<bool>,
    pub r#type: Option<AggregationType>,
}

impl AggregationConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn aggregation_type(&self) -> AggregationType {
        self.r#type.unwrap_or(AggregationType::Mean)
    }
}

/// Supported downsampling aggregation functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationType {
    Last,
    Min,
    Max,
    Mean,
    Median,
    Count,
    Sum,
}

impl AggregationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationType::Last => "last",
            AggregationType::Min => "min",
            AggregationType::Max => "max",
            AggregationType::Mean => "mean",
            AggregationType::Median => "median",
            AggregationType::Count => "count",
            AggregationType::Sum => "sum",
        }
    }
}

/// A `(resolution, retention)` pair naming an aggregated cluster namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct StoragePolicyConfig {
    /// Granularity at which the namespace stores datapoints.
    #[serde(with = "duration_str")]
    pub resolution: Duration,

    /// How long the namespace keeps datapoints.
    #[serde(with = "duration_str")]
    pub retention: Duration,
}

/// Serde adapter for durations written as humantime strings ("10s", "6h").
mod duration_str {
    use std::time::Duration;

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let repr = String::deserialize(deserializer)?;
        humantime::parse_duration(&repr).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rules_deserialize_from_yaml() {
        let rules: Vec<RuleConfig> = serde_yaml::from_str(
            r#"
            - contains: cpu
              continue: true
              aggregation:
                enabled: true
                type: mean
              policies:
                - resolution: 1m
                  retention: 1day
            - pattern: "**"
              policies:
                - resolution: 10s
                  retention: 6h
            "#,
        )
        .unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].contains, "cpu");
        assert!(rules[0].r#continue);
        assert!(rules[0].aggregation.is_enabled());
        assert_eq!(rules[0].aggregation.aggregation_type(), AggregationType::Mean);
        assert_eq!(
            rules[0].policies,
            vec![StoragePolicyConfig {
                resolution: Duration::from_secs(60),
                retention: Duration::from_secs(24 * 60 * 60),
            }]
        );

        assert_eq!(rules[1].pattern, "**");
        assert!(!rules[1].r#continue);
        assert_eq!(
            rules[1].policies,
            vec![StoragePolicyConfig {
                resolution: Duration::from_secs(10),
                retention: Duration::from_secs(6 * 60 * 60),
            }]
        );
    }

    #[test]
    fn aggregation_defaults_to_enabled_mean() {
        let config = AggregationConfig::default();
        assert!(config.is_enabled());
        assert_eq!(config.aggregation_type(), AggregationType::Mean);

        let disabled = AggregationConfig {
            enabled: Some(false),
            r#type: None,
        };
        assert!(!disabled.is_enabled());
    }

    #[test]
    fn storage_policy_round_trips_through_yaml() {
        let policy = StoragePolicyConfig {
            resolution: Duration::from_secs(10),
            retention: Duration::from_secs(6 * 60 * 60),
        };
        let yaml = serde_yaml::to_string(&policy).unwrap();
        let parsed: StoragePolicyConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, policy);
    }
}
