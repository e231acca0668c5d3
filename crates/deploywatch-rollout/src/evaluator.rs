//! Rollout evaluator — classifies one tick of a rolling update.
//!
//! The evaluator holds only the tolerance chosen when the watch began; it
//! never caches anything between calls. Given the same snapshots it always
//! returns the same verdict.
//!
//! Rules, first match wins:
//!
//! 1. workload not found → `NotFound`
//! 2. no active replica-set yet → `InProgress`
//! 3. active replica-set failed → `Failed`
//! 4. success check (strict or tolerant) → `Succeeded`
//! 5. timeout check → `TimedOut`
//! 6. otherwise → `InProgress`

use deploywatch_core::{ReplicaSetSnapshot, WorkloadSnapshot};
use serde::Serialize;
use tracing::{debug, trace};

use crate::child::ChildRollout;
use crate::resolver::{resolve_active, running_replica_sets};
use crate::tolerance::RolloutTolerance;

/// Replica generations allowed to run at once when a tolerance applies:
/// the previous one and the current one.
const MAX_LIVE_GENERATIONS: usize = 2;

/// Outcome of a rollout at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutState {
    InProgress,
    Succeeded,
    Failed,
    TimedOut,
    NotFound,
}

impl RolloutState {
    /// Whether polling can stop.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// The evaluator's output for one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub state: RolloutState,
    /// Replica summary, e.g. `3 replicas, 2 updatedReplicas`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_message: Option<String>,
}

impl Verdict {
    pub fn not_found() -> Self {
        Self {
            state: RolloutState::NotFound,
            status: None,
            failure_message: None,
            timeout_message: None,
        }
    }

    fn with_state(state: RolloutState, workload: &WorkloadSnapshot) -> Self {
        Self {
            state,
            status: Some(workload.replica_counts.status_line()),
            failure_message: None,
            timeout_message: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Evaluates rollout progress under a fixed tolerance policy.
#[derive(Debug, Clone, Default)]
pub struct RolloutEvaluator {
    tolerance: Option<RolloutTolerance>,
}

impl RolloutEvaluator {
    /// Evaluator requiring full availability.
    pub fn strict() -> Self {
        Self { tolerance: None }
    }

    /// Evaluator with an optional partial-success tolerance.
    pub fn new(tolerance: Option<RolloutTolerance>) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> Option<RolloutTolerance> {
        self.tolerance
    }

    /// Evaluate a workload against every replica-set its selector matched.
    pub fn evaluate(&self, workload: &WorkloadSnapshot, children: &[ReplicaSetSnapshot]) -> Verdict {
        if !workload.found {
            return Verdict::not_found();
        }
        let active = resolve_active(workload, children);
        let live_generations = running_replica_sets(children).len();
        self.evaluate_child(workload, active, live_generations)
    }

    /// Evaluate with an already-resolved active child.
    ///
    /// `live_generations` is the number of replica-sets with running
    /// replicas; it only matters when a tolerance is configured.
    pub fn evaluate_child<C>(
        &self,
        workload: &WorkloadSnapshot,
        active: Option<&C>,
        live_generations: usize,
    ) -> Verdict
    where
        C: ChildRollout + ?Sized,
    {
        if !workload.found {
            return Verdict::not_found();
        }

        let Some(child) = active else {
            trace!(workload = %workload.name, "no active replica-set yet");
            return Verdict::with_state(RolloutState::InProgress, workload);
        };

        if child.is_failed() {
            let mut verdict = Verdict::with_state(RolloutState::Failed, workload);
            verdict.failure_message = child.failure_message().map(str::to_string);
            return verdict;
        }

        if self.succeeded(workload, child, live_generations) {
            return Verdict::with_state(RolloutState::Succeeded, workload);
        }

        if timed_out(workload, child) {
            let mut verdict = Verdict::with_state(RolloutState::TimedOut, workload);
            verdict.timeout_message = timeout_message(workload, child);
            return verdict;
        }

        Verdict::with_state(RolloutState::InProgress, workload)
    }

    fn succeeded<C>(&self, workload: &WorkloadSnapshot, child: &C, live_generations: usize) -> bool
    where
        C: ChildRollout + ?Sized,
    {
        let counts = &workload.replica_counts;
        match self.tolerance {
            None => {
                child.is_succeeded()
                    && child.desired_replicas() == workload.desired_replicas
                    && counts.updated() == workload.desired_replicas
                    && counts.updated() == counts.available()
            }
            Some(tolerance) => {
                let minimum_needed = tolerance.minimum_needed(workload);
                debug!(
                    workload = %workload.name,
                    %tolerance,
                    minimum_needed,
                    updated = counts.updated(),
                    available = counts.available(),
                    live_generations,
                    "checking partial rollout"
                );
                // Strictly greater: exactly `minimum_needed` replicas is not enough.
                live_generations <= MAX_LIVE_GENERATIONS
                    && i64::from(counts.updated()) > minimum_needed
                    && i64::from(counts.available()) > minimum_needed
            }
        }
    }
}

fn timed_out<C>(workload: &WorkloadSnapshot, child: &C) -> bool
where
    C: ChildRollout + ?Sized,
{
    match &workload.progress_condition {
        Some(progress) => progress.is_false(),
        None => child.is_timed_out(),
    }
}

fn timeout_message<C>(workload: &WorkloadSnapshot, child: &C) -> Option<String>
where
    C: ChildRollout + ?Sized,
{
    let detail = child.timeout_message().map(str::to_string);
    let (Some(progress), Some(secs)) =
        (&workload.progress_condition, workload.progress_deadline_seconds)
    else {
        return detail;
    };

    let reason = progress.reason.as_deref().unwrap_or("unknown");
    let headline = format!(
        "Deploy timed out due to progressDeadlineSeconds of {secs} seconds, reason: {reason}"
    );
    Some(match detail {
        Some(detail) => format!("{headline}\n{detail}"),
        None => headline,
    })
}
