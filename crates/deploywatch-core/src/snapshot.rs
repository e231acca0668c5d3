//! Cluster JSON → snapshot parsing.
//!
//! Only the fields the evaluator reads are extracted. Optional fields
//! default (counts to zero, conditions to absent); structural sections that
//! every workload and replica-set document carries are required.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{SnapshotError, SnapshotResult};
use crate::types::*;

const WORKLOAD: &str = "workload";
const REPLICA_SET: &str = "replica-set";

impl WorkloadSnapshot {
    /// Build a snapshot from a workload document.
    pub fn from_json(doc: &Value) -> SnapshotResult<Self> {
        let metadata = section(doc, WORKLOAD, "metadata")?;
        let spec = section(doc, WORKLOAD, "spec")?;
        let status = section(doc, WORKLOAD, "status")?;

        let replica_counts = ReplicaCounts {
            replicas: count(status.get("replicas")).unwrap_or(0),
            updated_replicas: count(status.get("updatedReplicas")),
            available_replicas: count(status.get("availableReplicas")),
            unavailable_replicas: count(status.get("unavailableReplicas")),
        };

        let max_unavailable = spec
            .get("strategy")
            .and_then(|s| s.get("rollingUpdate"))
            .and_then(|r| r.get("maxUnavailable"))
            .and_then(max_unavailable);

        let snapshot = Self {
            found: true,
            name: string_field(metadata, "name").unwrap_or_default(),
            owner_uid: string_field(metadata, "uid").unwrap_or_default(),
            revision_marker: revision(metadata),
            desired_replicas: count(spec.get("replicas")).unwrap_or(0),
            progress_deadline_seconds: spec
                .get("progressDeadlineSeconds")
                .and_then(Value::as_u64),
            max_unavailable,
            selector_labels: match_labels(spec),
            replica_counts,
            progress_condition: find_condition(status, PROGRESSING_CONDITION),
        };
        trace!(workload = %snapshot.name, revision = ?snapshot.revision_marker, "parsed workload snapshot");
        Ok(snapshot)
    }
}

impl ReplicaSetSnapshot {
    /// Build a snapshot from a replica-set document and evaluate its own
    /// success and failure.
    ///
    /// A replica-set has succeeded once every desired replica is both ready
    /// and available. It has failed when it reports a `ReplicaFailure`
    /// condition. Timeouts are stamped later by the watch loop, which owns
    /// the clock.
    pub fn from_json(doc: &Value) -> SnapshotResult<Self> {
        let metadata = section(doc, REPLICA_SET, "metadata")?;
        let spec = section(doc, REPLICA_SET, "spec")?;
        let status = section(doc, REPLICA_SET, "status")?;

        let owner_uids = metadata
            .get("ownerReferences")
            .and_then(Value::as_array)
            .map(|refs| {
                refs.iter()
                    .filter_map(|r| r.get("uid").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let desired_replicas = count(spec.get("replicas")).unwrap_or(0);
        let ready_replicas = count(status.get("readyReplicas")).unwrap_or(0);
        let available_replicas = count(status.get("availableReplicas")).unwrap_or(0);

        let failure = find_condition(status, REPLICA_FAILURE_CONDITION).filter(Condition::is_true);
        let failure_message = failure.as_ref().map(|c| {
            c.message
                .clone()
                .or_else(|| c.reason.clone())
                .unwrap_or_else(|| "replica-set reported ReplicaFailure".to_string())
        });

        Ok(Self {
            name: string_field(metadata, "name").unwrap_or_default(),
            owner_uids,
            revision_marker: revision(metadata),
            desired_replicas,
            observed_replicas: count(status.get("replicas")).unwrap_or(0),
            ready_replicas,
            available_replicas,
            succeeded: available_replicas == desired_replicas
                && ready_replicas == desired_replicas,
            failed: failure.is_some(),
            timed_out: false,
            failure_message,
            timeout_message: None,
        })
    }
}

fn section<'a>(
    doc: &'a Value,
    kind: &'static str,
    field: &str,
) -> SnapshotResult<&'a Map<String, Value>> {
    doc.get(field)
        .and_then(Value::as_object)
        .ok_or_else(|| SnapshotError::malformed(kind, field))
}

/// Read a replica count. Negative or non-numeric values are clamped rather
/// than rejected; contradictory counts only fail later comparisons.
fn count(value: Option<&Value>) -> Option<u32> {
    let value = value?;
    if value.is_null() {
        return None;
    }
    let n = value.as_i64().unwrap_or(0);
    Some(n.clamp(0, i64::from(u32::MAX)) as u32)
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn revision(metadata: &Map<String, Value>) -> Option<String> {
    metadata
        .get("annotations")
        .and_then(|a| a.get(REVISION_ANNOTATION))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn match_labels(spec: &Map<String, Value>) -> BTreeMap<String, String> {
    spec.get("selector")
        .and_then(|s| s.get("matchLabels"))
        .and_then(Value::as_object)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn max_unavailable(value: &Value) -> Option<MaxUnavailable> {
    match value {
        Value::Number(n) => n.as_i64().map(|k| MaxUnavailable::Absolute(k).clamped()),
        Value::String(s) => Some(MaxUnavailable::parse(s)),
        _ => None,
    }
}

fn find_condition(status: &Map<String, Value>, type_: &str) -> Option<Condition> {
    status
        .get("conditions")
        .and_then(Value::as_array)?
        .iter()
        .find(|c| c.get("type").and_then(Value::as_str) == Some(type_))
        .and_then(|c| serde_json::from_value(c.clone()).ok())
}
