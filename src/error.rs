//! Crate-wide error type.

use thiserror::Error;

/// Errors reported by buffers, the session registry and persistence helpers.
///
/// Out-of-range buffer access is always reported, never clamped, so that
/// caller bugs surface early. A zero divisor in a derived channel is *not* an
/// error return; it is handled locally by the engine (see [`crate::channels`]).
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("sample position {pos} out of range (count {count})")]
    PositionOutOfRange { pos: usize, count: usize },

    #[error("invalid sample range {start}..{end} (count {count})")]
    InvalidRange {
        start: usize,
        end: usize,
        count: usize,
    },

    #[error("invalid signal metadata: {0}")]
    InvalidMetadata(String),

    #[error("unknown signal id {0}")]
    UnknownSignal(u32),

    #[error("signal {0:?} is already registered")]
    DuplicateSignal(String),

    #[error("signal key {0:?} cannot be resolved in this session")]
    UnresolvedKey(String),

    #[error("state (de)serialization failed: {0}")]
    Persistence(#[from] serde_json::Error),

    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SignalError>;
