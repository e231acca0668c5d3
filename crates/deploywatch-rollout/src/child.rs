//! Child verdict capability.
//!
//! The evaluator never inspects a replica-set's pods itself. It consumes
//! whatever verdict the child's own evaluator produced through this trait.

use deploywatch_core::ReplicaSetSnapshot;

/// The sub-verdict an active replica generation exposes to the evaluator.
pub trait ChildRollout {
    /// `spec.replicas` of the child.
    fn desired_replicas(&self) -> u32;
    fn is_succeeded(&self) -> bool;
    fn is_failed(&self) -> bool;
    fn is_timed_out(&self) -> bool;
    fn failure_message(&self) -> Option<&str>;
    fn timeout_message(&self) -> Option<&str>;
}

impl ChildRollout for ReplicaSetSnapshot {
    fn desired_replicas(&self) -> u32 {
        self.desired_replicas
    }

    fn is_succeeded(&self) -> bool {
        self.succeeded
    }

    fn is_failed(&self) -> bool {
        self.failed
    }

    fn is_timed_out(&self) -> bool {
        self.timed_out
    }

    fn failure_message(&self) -> Option<&str> {
        self.failure_message.as_deref()
    }

    fn timeout_message(&self) -> Option<&str> {
        self.timeout_message.as_deref()
    }
}
