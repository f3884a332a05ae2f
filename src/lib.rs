//! # Insole Logger Core Library
//!
//! Data-acquisition logger for a multi-channel force-sensing insole. It samples N FSR
//! channels plus a sync line at a fixed cadence, timestamps every sample against a
//! real-time clock and appends the samples as delimited text to a log file whose name is
//! derived from a subject number received over the network.
//!
//! ## Crate Structure
//!
//! - **`acquisition`**: channel table, record rendering and the dual-timer acquisition loop.
//! - **`clock`**: the real-time clock wrapper used for absolute timestamps.
//! - **`config`**: `LoggerConfig`, loaded from defaults, a TOML file and the environment.
//! - **`error`**: the `LoggerError` enum; every value of it is fatal.
//! - **`hardware`**: capability traits for the peripherals, with host and mock versions.
//! - **`logger`**: the ordered startup sequence and the fatal-error supervisor.
//! - **`session`**: the single-client subject-number protocol.
//! - **`storage`**: the storage medium seam and collision-free log file allocation.
//! - **`tracing_init`**: subscriber setup for diagnostics and the sample echo.
//! - **`validation`**: helpers used by configuration validation.

pub mod acquisition;
pub mod clock;
pub mod config;
pub mod error;
pub mod hardware;
pub mod logger;
pub mod session;
pub mod storage;
pub mod tracing_init;
pub mod validation;

pub use config::LoggerConfig;
pub use error::{AppResult, LoggerError};
pub use logger::{run_supervised, LoggerContext, Peripherals};
