//! deploywatch-rollout — decides whether a rolling update has finished.
//!
//! Each polling tick hands this crate a workload snapshot and the
//! replica-sets selected by its label selector. The crate picks the
//! replica-set belonging to the current rollout generation and classifies
//! the rollout as in progress, succeeded, failed, timed out, or not found.
//! Evaluation is a pure function of its inputs.
//!
//! # Components
//!
//! - **`tolerance`** — Partial-success policy (fixed count or derived from `maxUnavailable`)
//! - **`child`** — `ChildRollout`, the capability a replica-set verdict must provide
//! - **`resolver`** — Active-generation and running replica-set queries
//! - **`evaluator`** — Verdict state machine

pub mod child;
pub mod evaluator;
pub mod resolver;
pub mod tolerance;

pub use child::ChildRollout;
pub use evaluator::{RolloutEvaluator, RolloutState, Verdict};
pub use resolver::{resolve_active, running_replica_sets};
pub use tolerance::{RolloutTolerance, ToleranceParseError};
