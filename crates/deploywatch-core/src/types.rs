//! Domain types for rollout evaluation.
//!
//! Snapshots are rebuilt from scratch on every polling tick and never
//! mutated in place by the evaluator. A workload that could not be found
//! is represented by `WorkloadSnapshot::not_found()`, whose derived fields
//! are all empty or zero.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Annotation carrying the rollout generation of a workload and its
/// replica-sets.
pub const REVISION_ANNOTATION: &str = "deployment.kubernetes.io/revision";

/// Condition type reported on a workload while a rollout is progressing.
pub const PROGRESSING_CONDITION: &str = "Progressing";

/// Condition type reported on a replica-set that cannot create replicas.
pub const REPLICA_FAILURE_CONDITION: &str = "ReplicaFailure";

// ── Replica counts ────────────────────────────────────────────────

/// Replica counts reported in a workload's status.
///
/// `replicas` is always considered reported. The other counts remember
/// whether the cluster reported them at all; reads through the accessor
/// methods treat a missing count as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaCounts {
    pub replicas: u32,
    pub updated_replicas: Option<u32>,
    pub available_replicas: Option<u32>,
    pub unavailable_replicas: Option<u32>,
}

impl ReplicaCounts {
    /// Replicas already running the current generation.
    pub fn updated(&self) -> u32 {
        self.updated_replicas.unwrap_or(0)
    }

    /// Replicas passing readiness for at least `minReadySeconds`.
    pub fn available(&self) -> u32 {
        self.available_replicas.unwrap_or(0)
    }

    /// Replicas still required for full availability.
    pub fn unavailable(&self) -> u32 {
        self.unavailable_replicas.unwrap_or(0)
    }

    /// Human-readable summary, e.g. `3 replicas, 1 updatedReplica`.
    ///
    /// Only counts the cluster actually reported are listed.
    pub fn status_line(&self) -> String {
        let mut parts = vec![counted(self.replicas, "replica")];
        let reported = [
            (self.updated_replicas, "updatedReplica"),
            (self.available_replicas, "availableReplica"),
            (self.unavailable_replicas, "unavailableReplica"),
        ];
        for (count, label) in reported {
            if let Some(n) = count {
                parts.push(counted(n, label));
            }
        }
        parts.join(", ")
    }
}

fn counted(n: u32, singular: &str) -> String {
    if n == 1 {
        format!("{n} {singular}")
    } else {
        format!("{n} {singular}s")
    }
}

// ── Conditions ────────────────────────────────────────────────────

/// A status condition as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    pub fn is_true(&self) -> bool {
        self.status == "True"
    }

    pub fn is_false(&self) -> bool {
        self.status == "False"
    }
}

// ── Rolling-update strategy ───────────────────────────────────────

/// `spec.strategy.rollingUpdate.maxUnavailable`: an absolute replica count
/// or a percentage of the desired replicas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MaxUnavailable {
    Absolute(i64),
    Percent(i64),
}

impl MaxUnavailable {
    /// Parse the string form, e.g. `"25%"` or `"2"`.
    ///
    /// Only the leading integer is read; text that carries no number
    /// counts as zero, matching how the cluster tolerates sloppy values.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let value = if raw.contains('%') {
            Self::Percent(leading_int(raw))
        } else {
            Self::Absolute(leading_int(raw))
        };
        value.clamped()
    }

    /// Bound the value to what a rolling update can mean: a non-negative
    /// count, or a percentage in `0..=100`.
    pub fn clamped(self) -> Self {
        match self {
            Self::Absolute(k) => Self::Absolute(k.max(0)),
            Self::Percent(p) => Self::Percent(p.clamp(0, 100)),
        }
    }
}

fn leading_int(raw: &str) -> i64 {
    let (sign, digits) = match raw.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().map(|n| sign * n).unwrap_or(0)
}

// ── Workload ──────────────────────────────────────────────────────

/// The parent workload's declared and observed state at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSnapshot {
    /// Whether the workload currently exists in the cluster.
    pub found: bool,
    pub name: String,
    /// `metadata.uid`; replica-sets reference it as their owner.
    pub owner_uid: String,
    /// Rollout generation of the workload.
    pub revision_marker: Option<String>,
    /// `spec.replicas`.
    pub desired_replicas: u32,
    /// `spec.progressDeadlineSeconds`.
    pub progress_deadline_seconds: Option<u64>,
    pub max_unavailable: Option<MaxUnavailable>,
    /// `spec.selector.matchLabels`.
    pub selector_labels: BTreeMap<String, String>,
    pub replica_counts: ReplicaCounts,
    /// The `Progressing` entry of `status.conditions`, if reported.
    pub progress_condition: Option<Condition>,
}

impl WorkloadSnapshot {
    /// Snapshot of a workload that does not exist (anymore).
    pub fn not_found(name: &str) -> Self {
        Self {
            found: false,
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Label selector in `key=value,key=value` form.
    pub fn selector_string(&self) -> String {
        self.selector_labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

// ── Replica-set ───────────────────────────────────────────────────

/// One replica-set selected by a workload's label selector, together with
/// its own sub-verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaSetSnapshot {
    pub name: String,
    /// UIDs from `metadata.ownerReferences`.
    pub owner_uids: Vec<String>,
    pub revision_marker: Option<String>,
    /// `spec.replicas`.
    pub desired_replicas: u32,
    /// `status.replicas`.
    pub observed_replicas: u32,
    pub ready_replicas: u32,
    pub available_replicas: u32,
    pub succeeded: bool,
    pub failed: bool,
    pub timed_out: bool,
    pub failure_message: Option<String>,
    pub timeout_message: Option<String>,
}

impl ReplicaSetSnapshot {
    /// Whether `uid` appears among this replica-set's owners.
    pub fn is_owned_by(&self, uid: &str) -> bool {
        !uid.is_empty() && self.owner_uids.iter().any(|owner| owner == uid)
    }

    /// Whether any replica of this replica-set is still running.
    pub fn is_running(&self) -> bool {
        self.observed_replicas > 0
    }

    /// Override the failure verdict, e.g. from a pod-level evaluator.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failed = true;
        self.failure_message = Some(message.into());
        self
    }

    /// Mark this replica-set as having exceeded the watch timeout.
    pub fn mark_timed_out(&mut self, timeout: Duration) {
        self.timed_out = true;
        self.timeout_message = Some(format!(
            "ReplicaSet {} did not finish rolling out within {}s. \
             The cluster will keep reconciling it in the background, \
             but the rollout is now unlikely to succeed.",
            self.name,
            timeout.as_secs()
        ));
    }
}
