use std::path::PathBuf;

use anyhow::{bail, Context};
use deploywatch_rollout::{RolloutState, RolloutTolerance, Verdict};
use deploywatch_watch::config::parse_duration;
use deploywatch_watch::{
    KubectlQuery, SystemClock, WatchConfig, WatchError, WatchResult, WatchSettings, Watcher,
};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub struct WatchArgs {
    pub names: Vec<String>,
    pub config: Option<PathBuf>,
    pub namespace: Option<String>,
    pub context: Option<String>,
    pub kubectl: Option<String>,
    pub tolerance: String,
    pub timeout: Option<String>,
    pub poll_interval: Option<String>,
    pub format: String,
}

/// One workload to watch.
#[derive(Debug)]
struct Target {
    name: String,
    tolerance: Option<RolloutTolerance>,
    query: KubectlQuery,
}

#[derive(Debug, Serialize)]
struct Outcome {
    workload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    verdict: Option<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Outcome {
    fn failed(workload: String, error: String) -> Self {
        Self {
            workload,
            verdict: None,
            error: Some(error),
        }
    }

    fn succeeded(&self) -> bool {
        self.verdict
            .as_ref()
            .is_some_and(|v| v.state == RolloutState::Succeeded)
    }
}

/// Watch every requested workload; returns whether all of them succeeded.
pub async fn run(args: WatchArgs) -> anyhow::Result<bool> {
    let format = args.format.clone();
    let (targets, settings) = plan(args)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let handles: Vec<_> = targets
        .into_iter()
        .map(|target| {
            let shutdown = shutdown_rx.clone();
            let name = target.name.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let mut watcher = Watcher::new(
                    &target.name,
                    target.query,
                    SystemClock,
                    target.tolerance,
                    settings,
                );
                watcher.run(&shutdown)
            });
            (name, handle)
        })
        .collect();

    let outcomes = collect_outcomes(handles).await;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&outcomes)?),
        _ => {
            for o in &outcomes {
                println!("{}", format_outcome(o));
            }
        }
    }

    Ok(outcomes.iter().all(Outcome::succeeded))
}

/// Wait for every watch task. A task that panicked reports as an error
/// outcome for its own workload only.
async fn collect_outcomes(handles: Vec<(String, JoinHandle<WatchResult<Verdict>>)>) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        let entry = match handle.await {
            Ok(result) => outcome(name, result),
            Err(e) => {
                error!(workload = %name, error = %e, "watch task died");
                Outcome::failed(name, format!("watch task died: {e}"))
            }
        };
        outcomes.push(entry);
    }
    outcomes
}

/// Merge config file and command-line flags into watch targets.
fn plan(args: WatchArgs) -> anyhow::Result<(Vec<Target>, WatchSettings)> {
    let mut config = match &args.config {
        Some(path) => WatchConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => WatchConfig::default(),
    };

    if let Some(ns) = args.namespace {
        config.cluster.namespace = Some(ns);
    }
    if let Some(ctx) = args.context {
        config.cluster.context = Some(ctx);
    }
    if let Some(kubectl) = args.kubectl {
        config.cluster.kubectl = kubectl;
    }

    let mut settings = config.settings()?;
    if let Some(timeout) = &args.timeout {
        settings.timeout = parse_duration(timeout)
            .with_context(|| format!("invalid --timeout `{timeout}`"))?;
    }
    if let Some(interval) = &args.poll_interval {
        settings.poll_interval = parse_duration(interval)
            .with_context(|| format!("invalid --poll-interval `{interval}`"))?;
    }

    let cli_tolerance = RolloutTolerance::parse_setting(&args.tolerance)?;

    let mut targets: Vec<Target> = config
        .workloads
        .iter()
        .map(|entry| Target {
            name: entry.name.clone(),
            tolerance: entry.tolerance,
            query: KubectlQuery::from_config(&config.cluster, entry.namespace.as_deref()),
        })
        .collect();
    for name in args.names {
        if targets.iter().any(|t| t.name == name) {
            continue;
        }
        targets.push(Target {
            query: KubectlQuery::from_config(&config.cluster, None),
            tolerance: cli_tolerance,
            name,
        });
    }

    if targets.is_empty() {
        bail!("no workloads to watch: name one or list them in the config file");
    }
    Ok((targets, settings))
}

fn outcome(workload: String, result: Result<Verdict, WatchError>) -> Outcome {
    match result {
        Ok(verdict) => Outcome {
            workload,
            verdict: Some(verdict),
            error: None,
        },
        Err(e) => Outcome::failed(workload, e.to_string()),
    }
}

fn format_outcome(o: &Outcome) -> String {
    let Some(verdict) = &o.verdict else {
        return format!(
            "✗ {}: {}",
            o.workload,
            o.error.as_deref().unwrap_or("watch ended without a verdict")
        );
    };

    let (mark, label) = match verdict.state {
        RolloutState::Succeeded => ("✓", "succeeded"),
        RolloutState::Failed => ("✗", "failed"),
        RolloutState::TimedOut => ("✗", "timed out"),
        RolloutState::NotFound => ("✗", "not found"),
        RolloutState::InProgress => ("…", "in progress"),
    };
    let mut line = format!("{mark} {}: {label}", o.workload);
    if let Some(status) = &verdict.status {
        line.push_str(&format!(" ({status})"));
    }
    for msg in [&verdict.failure_message, &verdict.timeout_message]
        .into_iter()
        .flatten()
    {
        for l in msg.lines() {
            line.push_str("\n    ");
            line.push_str(l);
        }
    }
    line
}
