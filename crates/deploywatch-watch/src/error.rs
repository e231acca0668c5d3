//! Error types for fetching, watching, and configuration.

use deploywatch_core::SnapshotError;
use thiserror::Error;

pub type FetchResult<T> = Result<T, FetchError>;

pub type WatchResult<T> = Result<T, WatchError>;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors from the snapshot fetcher.
///
/// A workload that does not exist is not an error; it is reported as a
/// not-found snapshot.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The cluster could not be reached or answered with garbage.
    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Malformed(#[from] SnapshotError),
}

impl FetchError {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Errors that end a watch without a verdict.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("watch cancelled")]
    Cancelled,

    #[error("gave up after {attempts} consecutive transport errors, last: {last}")]
    TransportExhausted { attempts: u32, last: String },
}

/// Errors loading `deploywatch.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration for `{field}`: {value}")]
    InvalidDuration { field: &'static str, value: String },
}
