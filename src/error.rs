//! Error types for configuration, replication and persistence.

use thiserror::Error;

/// Errors raised while reading or adjusting simulation parameters.
#[derive(Debug, Error)]
pub enum ParamError {
    /// The named parameter does not exist for the active rule set.
    #[error("unknown parameter `{0}`")]
    Unknown(String),
    /// A NaN or infinite value was supplied.
    #[error("parameter `{name}` received non-finite value {value}")]
    NonFinite {
        /// Name of the parameter.
        name: String,
        /// Rejected value.
        value: f32,
    },
    /// The configuration as a whole is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Errors raised by the snapshot replication layer.
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// The transport cannot carry frames (never opened or already closed).
    #[error("replication channel unavailable")]
    ChannelUnavailable,
    /// A received frame failed validation.
    #[error("corrupt snapshot frame: {0}")]
    CorruptFrame(String),
    /// A snapshot was published with a tick id that does not advance.
    #[error("tick {tick} does not advance past {last}")]
    StaleTick {
        /// Tick of the rejected snapshot.
        tick: u64,
        /// Most recently published tick.
        last: u64,
    },
}

/// Umbrella error for the crate.
#[derive(Debug, Error)]
pub enum SwarmError {
    /// Parameter or configuration failure.
    #[error(transparent)]
    Param(#[from] ParamError),
    /// Replication failure; fatal on the computing role.
    #[error(transparent)]
    Replication(#[from] ReplicationError),
    /// File system failure while saving or loading.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON encoding or decoding failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
