//! Partial-success tolerance — how many replicas a rollout needs.
//!
//! Without a tolerance a rollout only succeeds at full availability. Some
//! workloads never get there on purpose (quota-bound clusters, deliberately
//! degraded deployments); a tolerance lets those finish once enough
//! replicas are updated and available.

use std::fmt;
use std::str::FromStr;

use deploywatch_core::{MaxUnavailable, WorkloadSnapshot};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Partial-success policy attached to a watched rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutTolerance {
    /// More than `n` replicas must be updated and available.
    Fixed(u32),
    /// The threshold follows the workload's own `maxUnavailable`.
    Dynamic,
}

impl RolloutTolerance {
    /// Replica count the rollout must exceed to be considered successful.
    ///
    /// For `Dynamic`, an absolute `maxUnavailable` of `k` gives
    /// `desired - k`; a percentage `p` gives `desired * (100 - p) / 100`
    /// rounded down. A workload without `maxUnavailable` tolerates nothing.
    pub fn minimum_needed(&self, workload: &WorkloadSnapshot) -> i64 {
        match self {
            Self::Fixed(n) => i64::from(*n),
            Self::Dynamic => {
                let desired = i64::from(workload.desired_replicas);
                match workload
                    .max_unavailable
                    .unwrap_or(MaxUnavailable::Absolute(0))
                {
                    MaxUnavailable::Absolute(k) => desired.saturating_sub(k),
                    MaxUnavailable::Percent(p) => desired.saturating_mul(100i64.saturating_sub(p)) / 100,
                }
            }
        }
    }

    /// Parse a user-facing setting: `strict` (no tolerance), `dynamic`, or
    /// a replica count.
    pub fn parse_setting(raw: &str) -> Result<Option<Self>, ToleranceParseError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "strict" | "full" | "" => Ok(None),
            other => other.parse().map(Some),
        }
    }
}

impl FromStr for RolloutTolerance {
    type Err = ToleranceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("dynamic") {
            return Ok(Self::Dynamic);
        }
        s.parse::<u32>()
            .map(Self::Fixed)
            .map_err(|_| ToleranceParseError(s.to_string()))
    }
}

impl fmt::Display for RolloutTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{n}"),
            Self::Dynamic => f.write_str("dynamic"),
        }
    }
}

/// A tolerance setting that is neither `strict`, `dynamic`, nor a count.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid rollout tolerance `{0}`: expected `strict`, `dynamic`, or a replica count")]
pub struct ToleranceParseError(pub String);

/// Config representation: either a bare count or a keyword.
#[derive(Deserialize)]
#[serde(untagged)]
enum ToleranceSetting {
    Count(u32),
    Keyword(String),
}

/// Deserialize an optional tolerance setting, mapping `strict` to `None`.
///
/// Intended for `#[serde(default, deserialize_with = "...")]`.
pub fn deserialize_setting<'de, D>(deserializer: D) -> Result<Option<RolloutTolerance>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<ToleranceSetting>::deserialize(deserializer)? {
        None => Ok(None),
        Some(ToleranceSetting::Count(n)) => Ok(Some(RolloutTolerance::Fixed(n))),
        Some(ToleranceSetting::Keyword(s)) => {
            RolloutTolerance::parse_setting(&s).map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workload(desired: u32, max_unavailable: Option<MaxUnavailable>) -> WorkloadSnapshot {
        WorkloadSnapshot {
            found: true,
            desired_replicas: desired,
            max_unavailable,
            ..Default::default()
        }
    }

    #[test]
    fn fixed_ignores_workload() {
        let w = workload(10, Some(MaxUnavailable::Absolute(4)));
        assert_eq!(RolloutTolerance::Fixed(3).minimum_needed(&w), 3);
    }

    #[test]
    fn dynamic_percent_rounds_down() {
        let w = workload(8, Some(MaxUnavailable::Percent(25)));
        assert_eq!(RolloutTolerance::Dynamic.minimum_needed(&w), 6);

        let w = workload(5, Some(MaxUnavailable::Percent(25)));
        // 5 * 0.75 = 3.75
        assert_eq!(RolloutTolerance::Dynamic.minimum_needed(&w), 3);
    }

    #[test]
    fn dynamic_survives_extreme_max_unavailable() {
        for value in [
            MaxUnavailable::Absolute(i64::MIN),
            MaxUnavailable::Absolute(i64::MAX),
            MaxUnavailable::Percent(i64::MIN),
            MaxUnavailable::Percent(i64::MAX),
        ] {
            let w = workload(5, Some(value));
            let _ = RolloutTolerance::Dynamic.minimum_needed(&w);
        }
        let w = workload(5, Some(MaxUnavailable::Absolute(i64::MAX)));
        assert_eq!(RolloutTolerance::Dynamic.minimum_needed(&w), 5 - i64::MAX);
    }

    #[test]
    fn dynamic_absolute_subtracts() {
        let w = workload(5, Some(MaxUnavailable::Absolute(2)));
        assert_eq!(RolloutTolerance::Dynamic.minimum_needed(&w), 3);
    }

    #[test]
    fn dynamic_without_max_unavailable_needs_everything() {
        let w = workload(4, None);
        assert_eq!(RolloutTolerance::Dynamic.minimum_needed(&w), 4);
    }

    #[test]
    fn parses_settings() {
        assert_eq!(RolloutTolerance::parse_setting("strict"), Ok(None));
        assert_eq!(
            RolloutTolerance::parse_setting("Dynamic"),
            Ok(Some(RolloutTolerance::Dynamic))
        );
        assert_eq!(
            RolloutTolerance::parse_setting("3"),
            Ok(Some(RolloutTolerance::Fixed(3)))
        );
        assert!(RolloutTolerance::parse_setting("most").is_err());
        assert!(RolloutTolerance::parse_setting("-1").is_err());
    }

    #[test]
    fn display_matches_setting() {
        assert_eq!(RolloutTolerance::Fixed(2).to_string(), "2");
        assert_eq!(RolloutTolerance::Dynamic.to_string(), "dynamic");
    }

    #[test]
    fn deserializes_count_and_keyword() {
        #[derive(Deserialize)]
        struct Entry {
            #[serde(default, deserialize_with = "deserialize_setting")]
            tolerance: Option<RolloutTolerance>,
        }

        let e: Entry = serde_json::from_str(r#"{"tolerance": 4}"#).unwrap();
        assert_eq!(e.tolerance, Some(RolloutTolerance::Fixed(4)));
        let e: Entry = serde_json::from_str(r#"{"tolerance": "dynamic"}"#).unwrap();
        assert_eq!(e.tolerance, Some(RolloutTolerance::Dynamic));
        let e: Entry = serde_json::from_str(r#"{"tolerance": "strict"}"#).unwrap();
        assert_eq!(e.tolerance, None);
        let e: Entry = serde_json::from_str("{}").unwrap();
        assert_eq!(e.tolerance, None);
        assert!(serde_json::from_str::<Entry>(r#"{"tolerance": "half"}"#).is_err());
    }
}
