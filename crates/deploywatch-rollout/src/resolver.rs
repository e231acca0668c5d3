//! Generation resolver — which replica-set belongs to the current rollout.

use deploywatch_core::{ReplicaSetSnapshot, WorkloadSnapshot};
use tracing::{debug, warn};

/// Find the active replica-set for the workload's current revision.
///
/// A child is active when the workload is among its owners and both carry
/// the same revision marker. Should several children match, the one with
/// the smallest name wins so the choice does not depend on listing order.
pub fn resolve_active<'a>(
    workload: &WorkloadSnapshot,
    children: &'a [ReplicaSetSnapshot],
) -> Option<&'a ReplicaSetSnapshot> {
    let revision = workload.revision_marker.as_deref()?;

    let mut matching = children.iter().filter(|rs| {
        rs.is_owned_by(&workload.owner_uid) && rs.revision_marker.as_deref() == Some(revision)
    });

    let first = matching.next()?;
    let mut extra = 0usize;
    let active = matching.fold(first, |best, rs| {
        extra += 1;
        if rs.name < best.name { rs } else { best }
    });

    if extra > 0 {
        warn!(
            workload = %workload.name,
            revision,
            candidates = extra + 1,
            chosen = %active.name,
            "several replica-sets claim the current revision"
        );
    } else {
        debug!(workload = %workload.name, revision, replica_set = %active.name, "resolved active replica-set");
    }
    Some(active)
}

/// Replica-sets with at least one running replica.
pub fn running_replica_sets(children: &[ReplicaSetSnapshot]) -> Vec<&ReplicaSetSnapshot> {
    children.iter().filter(|rs| rs.is_running()).collect()
}
