//! deploywatch-core — snapshot types for rollout evaluation.
//!
//! A tick of the deployment watcher starts from two kinds of JSON
//! documents scraped from the cluster: the workload (a `Deployment`) and
//! the replica-sets selected by its label selector. This crate turns
//! those documents into immutable snapshots with every optional field
//! defaulted explicitly.
//!
//! # Components
//!
//! - **`types`** — `WorkloadSnapshot`, `ReplicaSetSnapshot`, `ReplicaCounts`,
//!   `Condition`, `MaxUnavailable`
//! - **`snapshot`** — JSON → snapshot parsing
//! - **`error`** — `SnapshotError` for structurally incompatible documents

pub mod error;
pub mod snapshot;
pub mod types;

pub use error::{SnapshotError, SnapshotResult};
pub use types::*;
