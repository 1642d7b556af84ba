//! Error types for ordkv.
//!
//! A single typed `Error` enum covers every failure surface the store can
//! produce: argument validation, protocol-state violations, unknown verbs,
//! and the I/O/locking failures around the durable log.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type CResult<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Wrong arity or an unparseable argument (e.g. a non-integer TTL).
    #[error("{0}")]
    Args(String),

    /// BEGIN while already in a transaction, or COMMIT/ABORT outside one.
    #[error("{0}")]
    Protocol(String),

    /// An unrecognized command verb.
    #[error("unknown command '{0}'")]
    Unknown(String),

    /// The log file could not be locked for exclusive access.
    #[error("could not lock log file: {0}")]
    Lock(String),

    /// I/O failure opening, appending to, or syncing the log file.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn args(msg: impl Into<String>) -> Self {
        Error::Args(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }
}
