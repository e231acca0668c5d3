//! Snapshot fetcher — the I/O boundary of a tick.
//!
//! `ClusterQuery` returns raw JSON documents; `SnapshotFetcher` turns them
//! into snapshots. No rollout decisions are made here.

use deploywatch_core::{ReplicaSetSnapshot, WorkloadSnapshot};
use serde_json::Value;
use tracing::debug;

use crate::error::FetchResult;

/// Cluster resource kinds the watcher reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Deployment,
    ReplicaSet,
}

impl ResourceKind {
    /// Resource name as understood by the cluster API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployment => "deployments",
            Self::ReplicaSet => "replicasets",
        }
    }
}

/// Read-only access to cluster documents.
pub trait ClusterQuery: Send {
    /// Fetch one resource by name. `Ok(None)` means it does not exist.
    fn get(&self, kind: ResourceKind, name: &str) -> FetchResult<Option<Value>>;

    /// List resources matching a `key=value,...` label selector.
    fn list(&self, kind: ResourceKind, selector: &str) -> FetchResult<Vec<Value>>;
}

impl<Q: ClusterQuery + Sync + ?Sized> ClusterQuery for &Q {
    fn get(&self, kind: ResourceKind, name: &str) -> FetchResult<Option<Value>> {
        (**self).get(kind, name)
    }

    fn list(&self, kind: ResourceKind, selector: &str) -> FetchResult<Vec<Value>> {
        (**self).list(kind, selector)
    }
}

/// Builds workload and replica-set snapshots from a `ClusterQuery`.
#[derive(Debug, Clone)]
pub struct SnapshotFetcher<Q> {
    query: Q,
}

impl<Q: ClusterQuery> SnapshotFetcher<Q> {
    pub fn new(query: Q) -> Self {
        Self { query }
    }

    /// Fetch the workload. A missing workload is a not-found snapshot, not
    /// an error; transport failures stay errors.
    pub fn fetch_workload(&self, name: &str) -> FetchResult<WorkloadSnapshot> {
        match self.query.get(ResourceKind::Deployment, name)? {
            Some(doc) => Ok(WorkloadSnapshot::from_json(&doc)?),
            None => {
                debug!(workload = %name, "workload not found");
                Ok(WorkloadSnapshot::not_found(name))
            }
        }
    }

    /// Fetch every replica-set matching the workload's label selector.
    ///
    /// An empty selector matches nothing rather than every replica-set in
    /// the namespace.
    pub fn fetch_replica_sets(
        &self,
        workload: &WorkloadSnapshot,
    ) -> FetchResult<Vec<ReplicaSetSnapshot>> {
        if workload.selector_labels.is_empty() {
            return Ok(Vec::new());
        }
        let selector = workload.selector_string();

        let docs = self.query.list(ResourceKind::ReplicaSet, &selector)?;
        let children = docs
            .iter()
            .map(ReplicaSetSnapshot::from_json)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(%selector, count = children.len(), "fetched replica-sets");
        Ok(children)
    }
}
