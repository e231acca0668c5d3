//! Watch loop integration tests.
//!
//! Drives `Watcher::run` against an in-memory cluster that replays one
//! frame of cluster state per tick, with a manual clock so no test sleeps.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use deploywatch_rollout::{RolloutState, RolloutTolerance};
use deploywatch_watch::*;
use serde_json::{json, Value};
use tokio::sync::watch;

/// Cluster state observed during one tick.
#[derive(Clone)]
struct Frame {
    workload: Result<Option<Value>, String>,
    replica_sets: Result<Vec<Value>, String>,
}

/// Serves one frame per workload fetch; the last frame repeats forever.
struct FrameCluster {
    frames: Mutex<VecDeque<Frame>>,
    current: Mutex<Option<Frame>>,
}

impl FrameCluster {
    fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: Mutex::new(frames.into()),
            current: Mutex::new(None),
        }
    }
}

impl ClusterQuery for FrameCluster {
    fn get(&self, kind: ResourceKind, _name: &str) -> FetchResult<Option<Value>> {
        assert_eq!(kind, ResourceKind::Deployment);
        let mut current = self.current.lock().unwrap();
        if let Some(next) = self.frames.lock().unwrap().pop_front() {
            *current = Some(next);
        }
        let frame = current.as_ref().expect("cluster has no frames");
        frame.workload.clone().map_err(FetchError::Transport)
    }

    fn list(&self, kind: ResourceKind, selector: &str) -> FetchResult<Vec<Value>> {
        assert_eq!(kind, ResourceKind::ReplicaSet);
        assert_eq!(selector, "app=web");
        let current = self.current.lock().unwrap();
        current
            .as_ref()
            .map_or(Ok(Vec::new()), |f| f.replica_sets.clone())
            .map_err(FetchError::Transport)
    }
}

fn deployment(desired: u32, updated: u32, available: u32, revision: &str) -> Value {
    json!({
        "metadata": {
            "name": "web",
            "uid": "dep-uid",
            "annotations": { "deployment.kubernetes.io/revision": revision }
        },
        "spec": {
            "replicas": desired,
            "progressDeadlineSeconds": 600,
            "selector": { "matchLabels": { "app": "web" } },
            "strategy": { "rollingUpdate": { "maxUnavailable": "25%" } }
        },
        "status": {
            "replicas": desired,
            "updatedReplicas": updated,
            "availableReplicas": available,
            "conditions": [
                { "type": "Progressing", "status": "True", "reason": "ReplicaSetUpdated" }
            ]
        }
    })
}

fn replica_set(name: &str, revision: &str, desired: u32, running: u32, ready: u32) -> Value {
    json!({
        "metadata": {
            "name": name,
            "ownerReferences": [{ "kind": "Deployment", "uid": "dep-uid" }],
            "annotations": { "deployment.kubernetes.io/revision": revision }
        },
        "spec": { "replicas": desired },
        "status": { "replicas": running, "readyReplicas": ready, "availableReplicas": ready }
    })
}

fn frame(workload: Value, replica_sets: Vec<Value>) -> Frame {
    Frame {
        workload: Ok(Some(workload)),
        replica_sets: Ok(replica_sets),
    }
}

fn settings() -> WatchSettings {
    WatchSettings {
        poll_interval: Duration::from_secs(2),
        timeout: Duration::from_secs(60),
        max_backoff: Duration::from_secs(16),
        max_transport_failures: 3,
    }
}

#[test]
fn strict_rollout_succeeds_after_generation_switch() {
    let frames = vec![
        // New generation not created yet.
        frame(deployment(4, 0, 4, "2"), vec![replica_set("web-1", "1", 4, 4, 4)]),
        // Surge: new replica-set scaling up, old one draining.
        frame(
            deployment(4, 2, 3, "2"),
            vec![
                replica_set("web-1", "1", 2, 2, 2),
                replica_set("web-2", "2", 2, 2, 1),
            ],
        ),
        frame(
            deployment(4, 4, 4, "2"),
            vec![
                replica_set("web-1", "1", 0, 0, 0),
                replica_set("web-2", "2", 4, 4, 4),
            ],
        ),
    ];
    let clock = ManualClock::new();
    let mut watcher = Watcher::new("web", FrameCluster::new(frames), clock.clone(), None, settings());
    let (_tx, rx) = watch::channel(false);

    let verdict = watcher.run(&rx).unwrap();
    assert_eq!(verdict.state, RolloutState::Succeeded);
    assert_eq!(
        verdict.status.as_deref(),
        Some("4 replicas, 4 updatedReplicas, 4 availableReplicas")
    );
    assert_eq!(clock.elapsed(), Duration::from_secs(4));
    assert_eq!(watcher.last_desired_replicas(), Some(4));
}

#[test]
fn dynamic_tolerance_accepts_degraded_rollout() {
    // 8 desired at 25% maxUnavailable: more than 6 replicas are needed.
    let frames = vec![
        frame(
            deployment(8, 6, 6, "5"),
            vec![
                replica_set("web-4", "4", 2, 2, 2),
                replica_set("web-5", "5", 8, 6, 6),
            ],
        ),
        frame(
            deployment(8, 7, 7, "5"),
            vec![
                replica_set("web-4", "4", 0, 0, 0),
                replica_set("web-5", "5", 8, 7, 7),
            ],
        ),
    ];
    let mut watcher = Watcher::new(
        "web",
        FrameCluster::new(frames),
        ManualClock::new(),
        Some(RolloutTolerance::Dynamic),
        settings(),
    );
    let (_tx, rx) = watch::channel(false);

    assert_eq!(watcher.run(&rx).unwrap().state, RolloutState::Succeeded);
}

#[test]
fn stalled_rollout_times_out_on_progress_deadline() {
    let mut stalled = deployment(3, 1, 1, "2");
    stalled["status"]["conditions"] = json!([{
        "type": "Progressing",
        "status": "False",
        "reason": "ProgressDeadlineExceeded"
    }]);
    let frames = vec![
        frame(deployment(3, 1, 1, "2"), vec![replica_set("web-2", "2", 3, 3, 1)]),
        frame(stalled, vec![replica_set("web-2", "2", 3, 3, 1)]),
    ];
    let mut watcher = Watcher::new("web", FrameCluster::new(frames), ManualClock::new(), None, settings());
    let (_tx, rx) = watch::channel(false);

    let verdict = watcher.run(&rx).unwrap();
    assert_eq!(verdict.state, RolloutState::TimedOut);
    let msg = verdict.timeout_message.unwrap();
    assert!(msg.contains("600 seconds"));
    assert!(msg.contains("ProgressDeadlineExceeded"));
}

#[test]
fn replica_failure_fails_rollout() {
    let mut failing = replica_set("web-2", "2", 3, 0, 0);
    failing["status"]["conditions"] = json!([{
        "type": "ReplicaFailure",
        "status": "True",
        "reason": "FailedCreate",
        "message": "exceeded quota: compute-resources"
    }]);
    let frames = vec![frame(deployment(3, 0, 0, "2"), vec![failing])];
    let mut watcher = Watcher::new("web", FrameCluster::new(frames), ManualClock::new(), None, settings());
    let (_tx, rx) = watch::channel(false);

    let verdict = watcher.run(&rx).unwrap();
    assert_eq!(verdict.state, RolloutState::Failed);
    assert_eq!(
        verdict.failure_message.as_deref(),
        Some("exceeded quota: compute-resources")
    );
}

#[test]
fn deletion_mid_poll_is_not_found() {
    let frames = vec![
        frame(deployment(3, 1, 1, "2"), vec![replica_set("web-2", "2", 3, 1, 1)]),
        Frame {
            workload: Ok(None),
            replica_sets: Ok(vec![replica_set("web-2", "2", 3, 1, 1)]),
        },
    ];
    let mut watcher = Watcher::new("web", FrameCluster::new(frames), ManualClock::new(), None, settings());
    let (_tx, rx) = watch::channel(false);

    let verdict = watcher.run(&rx).unwrap();
    assert_eq!(verdict.state, RolloutState::NotFound);
    assert!(verdict.status.is_none());
    assert_eq!(watcher.last_desired_replicas(), None);
}

#[test]
fn transport_errors_retry_with_backoff() {
    let frames = vec![
        Frame {
            workload: Err("connection refused".into()),
            replica_sets: Ok(vec![]),
        },
        Frame {
            workload: Err("connection refused".into()),
            replica_sets: Ok(vec![]),
        },
        frame(deployment(3, 3, 3, "2"), vec![replica_set("web-2", "2", 3, 3, 3)]),
    ];
    let clock = ManualClock::new();
    let mut watcher = Watcher::new("web", FrameCluster::new(frames), clock.clone(), None, settings());
    let (_tx, rx) = watch::channel(false);

    let verdict = watcher.run(&rx).unwrap();
    assert_eq!(verdict.state, RolloutState::Succeeded);
    // 2s doubled twice: 4s + 8s.
    assert_eq!(clock.elapsed(), Duration::from_secs(12));
}

#[test]
fn replica_set_list_errors_retry_without_evaluating() {
    let list_failure = |desired| Frame {
        workload: Ok(Some(deployment(desired, 1, 1, "2"))),
        replica_sets: Err("etcdserver: request timed out".into()),
    };
    let frames = vec![
        frame(deployment(3, 1, 1, "2"), vec![replica_set("web-2", "2", 3, 3, 1)]),
        list_failure(5),
        list_failure(5),
        frame(deployment(5, 5, 5, "2"), vec![replica_set("web-2", "2", 5, 5, 5)]),
    ];
    let clock = ManualClock::new();
    let mut watcher = Watcher::new("web", FrameCluster::new(frames), clock.clone(), None, settings());

    assert_eq!(watcher.tick().unwrap().state, RolloutState::InProgress);
    assert_eq!(watcher.last_desired_replicas(), Some(3));

    // The workload was read but its replica-sets were not: no verdict, and
    // the cached desired count is left alone.
    assert!(matches!(
        watcher.tick(),
        Err(WatchError::Fetch(FetchError::Transport(_)))
    ));
    assert_eq!(watcher.last_desired_replicas(), Some(3));

    let (_tx, rx) = watch::channel(false);
    let verdict = watcher.run(&rx).unwrap();
    assert_eq!(verdict.state, RolloutState::Succeeded);
    // One failed list inside the loop: 2s doubled once.
    assert_eq!(clock.elapsed(), Duration::from_secs(4));
    assert_eq!(watcher.last_desired_replicas(), Some(5));
}

#[test]
fn persistent_transport_errors_exhaust_retries() {
    let frames = vec![Frame {
        workload: Err("i/o timeout".into()),
        replica_sets: Ok(vec![]),
    }];
    let mut watcher = Watcher::new("web", FrameCluster::new(frames), ManualClock::new(), None, settings());
    let (_tx, rx) = watch::channel(false);

    match watcher.run(&rx) {
        Err(WatchError::TransportExhausted { attempts, last }) => {
            assert_eq!(attempts, 4);
            assert_eq!(last, "i/o timeout");
        }
        other => panic!("expected TransportExhausted, got {other:?}"),
    }
}

#[test]
fn missing_generation_never_fails_before_timeout() {
    let frames = vec![frame(
        deployment(3, 0, 3, "7"),
        vec![replica_set("web-6", "6", 3, 3, 3)],
    )];
    let clock = ManualClock::new();
    let mut watcher = Watcher::new("web", FrameCluster::new(frames), clock.clone(), None, settings());

    for _ in 0..50 {
        assert_eq!(watcher.tick().unwrap().state, RolloutState::InProgress);
        clock.advance(Duration::from_secs(2));
    }
}

#[tokio::test]
async fn independent_watchers_run_concurrently() {
    let (tx, rx) = watch::channel(false);

    let done = tokio::task::spawn_blocking({
        let rx = rx.clone();
        move || {
            let frames = vec![frame(
                deployment(2, 2, 2, "1"),
                vec![replica_set("web-1", "1", 2, 2, 2)],
            )];
            let mut w = Watcher::new("web", FrameCluster::new(frames), ManualClock::new(), None, settings());
            w.run(&rx)
        }
    });

    let stuck = tokio::task::spawn_blocking(move || {
        let frames = vec![frame(deployment(2, 0, 2, "9"), vec![])];
        let mut w = Watcher::new("web", FrameCluster::new(frames), SystemClock, None, WatchSettings {
            poll_interval: Duration::from_millis(10),
            ..settings()
        });
        w.run(&rx)
    });

    let verdict = done.await.unwrap().unwrap();
    assert_eq!(verdict.state, RolloutState::Succeeded);

    tx.send(true).unwrap();
    assert!(matches!(stuck.await.unwrap(), Err(WatchError::Cancelled)));
}
