//! Error types for snapshot parsing.

use thiserror::Error;

/// Result type alias for snapshot parsing.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors raised when a cluster document cannot be read as a snapshot.
///
/// Missing optional fields never produce an error; only missing structural
/// sections (`metadata`, `spec`, `status`) do, since they point at an
/// incompatible schema rather than a rollout that is still converging.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("malformed {kind} document: missing or invalid `{field}`")]
    Malformed { kind: &'static str, field: String },
}

impl SnapshotError {
    pub(crate) fn malformed(kind: &'static str, field: &str) -> Self {
        Self::Malformed {
            kind,
            field: field.to_string(),
        }
    }
}
