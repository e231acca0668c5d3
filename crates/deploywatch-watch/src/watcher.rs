//! Watcher — polls one workload until its rollout reaches a verdict.
//!
//! A tick is fetch → resolve → evaluate. The only state kept between
//! ticks is the last known desired replica count (to notice a workload
//! being deleted mid-rollout) and the last reported state (to log
//! transitions once).

use std::time::Instant;

use deploywatch_rollout::{RolloutEvaluator, RolloutState, RolloutTolerance, Verdict};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backoff::RetryBackoff;
use crate::clock::Clock;
use crate::config::WatchSettings;
use crate::error::{FetchError, WatchError, WatchResult};
use crate::fetcher::{ClusterQuery, SnapshotFetcher};

/// Polls a single workload.
pub struct Watcher<Q, C> {
    name: String,
    fetcher: SnapshotFetcher<Q>,
    clock: C,
    evaluator: RolloutEvaluator,
    settings: WatchSettings,
    started_at: Instant,
    /// `spec.replicas` from the last tick that found the workload.
    last_desired_replicas: Option<u32>,
    last_state: Option<RolloutState>,
}

impl<Q: ClusterQuery, C: Clock> Watcher<Q, C> {
    /// Create a watcher. The timeout clock starts now, and the tolerance
    /// stays fixed for the watcher's lifetime.
    pub fn new(
        name: &str,
        query: Q,
        clock: C,
        tolerance: Option<RolloutTolerance>,
        settings: WatchSettings,
    ) -> Self {
        let started_at = clock.now();
        Self {
            name: name.to_string(),
            fetcher: SnapshotFetcher::new(query),
            clock,
            evaluator: RolloutEvaluator::new(tolerance),
            settings,
            started_at,
            last_desired_replicas: None,
            last_state: None,
        }
    }

    pub fn last_desired_replicas(&self) -> Option<u32> {
        self.last_desired_replicas
    }

    /// Run one fetch → resolve → evaluate cycle.
    pub fn tick(&mut self) -> WatchResult<Verdict> {
        let workload = self.fetcher.fetch_workload(&self.name)?;

        if !workload.found {
            if let Some(desired) = self.last_desired_replicas.take() {
                warn!(workload = %self.name, desired, "workload deleted during rollout");
            }
            let verdict = Verdict::not_found();
            self.note(&verdict);
            return Ok(verdict);
        }

        let mut children = self.fetcher.fetch_replica_sets(&workload)?;
        self.last_desired_replicas = Some(workload.desired_replicas);

        let elapsed = self.clock.now().saturating_duration_since(self.started_at);
        if elapsed > self.settings.timeout {
            for rs in &mut children {
                rs.mark_timed_out(self.settings.timeout);
            }
        }

        let verdict = self.evaluator.evaluate(&workload, &children);
        self.note(&verdict);
        Ok(verdict)
    }

    /// Tick until a terminal verdict, cancellation, or a fatal error.
    ///
    /// Transport errors are retried with backoff; more than
    /// `max_transport_failures` in a row ends the watch.
    pub fn run(&mut self, shutdown: &watch::Receiver<bool>) -> WatchResult<Verdict> {
        let mut backoff = RetryBackoff::new(self.settings.poll_interval, self.settings.max_backoff);
        info!(
            workload = %self.name,
            tolerance = ?self.evaluator.tolerance(),
            timeout_secs = self.settings.timeout.as_secs(),
            "watching rollout"
        );

        loop {
            if *shutdown.borrow() {
                info!(workload = %self.name, "watch cancelled");
                return Err(WatchError::Cancelled);
            }

            match self.tick() {
                Ok(verdict) => {
                    backoff.record_success();
                    if verdict.is_terminal() {
                        return Ok(verdict);
                    }
                }
                Err(WatchError::Fetch(FetchError::Transport(msg))) => {
                    let attempts = backoff.record_failure();
                    warn!(
                        workload = %self.name,
                        attempts,
                        retry_in = ?backoff.next_interval(),
                        error = %msg,
                        "cluster query failed"
                    );
                    if attempts > self.settings.max_transport_failures {
                        return Err(WatchError::TransportExhausted { attempts, last: msg });
                    }
                }
                Err(e) => return Err(e),
            }

            self.clock.sleep(backoff.next_interval());
        }
    }

    fn note(&mut self, verdict: &Verdict) {
        if self.last_state == Some(verdict.state) {
            debug!(workload = %self.name, status = ?verdict.status, "rollout unchanged");
            return;
        }
        self.last_state = Some(verdict.state);

        match verdict.state {
            RolloutState::InProgress => {
                info!(workload = %self.name, status = ?verdict.status, "rollout in progress")
            }
            RolloutState::Succeeded => {
                info!(workload = %self.name, status = ?verdict.status, "rollout succeeded")
            }
            RolloutState::Failed => warn!(
                workload = %self.name,
                reason = verdict.failure_message.as_deref().unwrap_or("unknown"),
                "rollout failed"
            ),
            RolloutState::TimedOut => warn!(
                workload = %self.name,
                reason = verdict.timeout_message.as_deref().unwrap_or("unknown"),
                "rollout timed out"
            ),
            RolloutState::NotFound => warn!(workload = %self.name, "workload not found"),
        }
    }
}
