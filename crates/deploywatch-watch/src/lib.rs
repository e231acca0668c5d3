//! deploywatch-watch — the per-workload polling loop.
//!
//! Each watched workload gets its own `Watcher`, which on every tick
//! fetches the workload and its replica-sets, stamps replica-set timeouts
//! from the injected clock, and hands the snapshots to the rollout
//! evaluator. Watchers share nothing, so several can run side by side on
//! separate blocking tasks.
//!
//! # Architecture
//!
//! ```text
//! Watcher
//!   ├── SnapshotFetcher<ClusterQuery>   (KubectlQuery in production)
//!   ├── RolloutEvaluator                (tolerance fixed at construction)
//!   ├── Clock                           (SystemClock / ManualClock)
//!   └── RetryBackoff                    (transport errors only)
//! ```
//!
//! Transport errors are retried with exponential backoff (poll interval
//! doubling up to `max_backoff`); a malformed document stops the watch.

pub mod backoff;
pub mod clock;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod kubectl;
pub mod watcher;

pub use backoff::RetryBackoff;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClusterSection, WatchConfig, WatchSettings, WorkloadEntry};
pub use error::{ConfigError, FetchError, FetchResult, WatchError, WatchResult};
pub use fetcher::{ClusterQuery, ResourceKind, SnapshotFetcher};
pub use kubectl::KubectlQuery;
pub use watcher::Watcher;
