//! Custom error types for the logger.
//!
//! `LoggerError` is the single error type that flows out of the startup sequence and the
//! acquisition loop. Every value of it that reaches the supervisor is terminal: the
//! supervisor reports it, raises the fault indicator and stops forward progress.
//!
//! Conditions the logger tolerates never become a `LoggerError`:
//!
//! - non-digit bytes received while reading the session identifier,
//! - the transport reporting "no data available" during a blocking read,
//! - the real-time clock reporting that it is stopped at startup.
//!
//! Collaborator traits in [`crate::hardware`] and [`crate::storage`] return
//! `anyhow::Result`; those errors are folded into `Hardware`/`Storage` at the seam.

use thiserror::Error;

/// Convenience alias for results using the logger error type.
pub type AppResult<T> = std::result::Result<T, LoggerError>;

/// Errors raised by the logger. All of them halt acquisition.
#[derive(Error, Debug)]
pub enum LoggerError {
    /// The configuration could not be loaded or deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// The configuration parsed but failed semantic validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// The storage medium did not initialize.
    #[error("Storage medium failed to initialize: {0}")]
    StorageInit(String),

    /// The storage medium failed while probing for existing files.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Every file index for the subject is already taken.
    #[error("No free log file name for subject {subject:03}: all {attempts} indices are in use")]
    FileIndexExhausted {
        /// Session identifier used as the subject number
        subject: u16,
        /// Number of names that were probed
        attempts: u32,
    },

    /// The create-exclusive call on the medium failed.
    #[error("Failed to create log file '{name}': {message}")]
    FileCreate {
        /// Filename that was being created
        name: String,
        /// Medium error text
        message: String,
    },

    /// Appending to or syncing the open log failed.
    #[error("Log write failed: {0}")]
    Write(String),

    /// A record did not match the header's column count.
    #[error("Record has {actual} columns but the header declares {expected}")]
    SchemaMismatch {
        /// Column count declared by the header
        expected: usize,
        /// Column count of the offending record
        actual: usize,
    },

    /// The session identifier received over the network is above 999.
    #[error("Session identifier {0} is out of range (maximum is 999)")]
    SessionIdOutOfRange(u32),

    /// A configured wait elapsed without the expected event.
    #[error("Timed out waiting for {0}")]
    Timeout(String),

    /// The real-time clock peripheral is absent.
    #[error("Real-time clock not found")]
    ClockNotFound,

    /// A hardware collaborator reported a failure.
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// The network link or transport failed.
    #[error("Network error: {0}")]
    Network(String),
}

impl From<anyhow::Error> for LoggerError {
    fn from(err: anyhow::Error) -> Self {
        LoggerError::Hardware(format!("{err:#}"))
    }
}

impl LoggerError {
    /// Short, stable label for the error family, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            LoggerError::Config(_) | LoggerError::Configuration(_) => "config",
            LoggerError::StorageInit(_)
            | LoggerError::Storage(_)
            | LoggerError::FileIndexExhausted { .. }
            | LoggerError::FileCreate { .. }
            | LoggerError::Write(_) => "storage",
            LoggerError::SchemaMismatch { .. } => "schema",
            LoggerError::SessionIdOutOfRange(_) => "session",
            LoggerError::Timeout(_) => "timeout",
            LoggerError::ClockNotFound => "clock",
            LoggerError::Hardware(_) => "hardware",
            LoggerError::Network(_) => "network",
        }
    }
}
