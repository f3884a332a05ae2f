//! Collaborator Capabilities
//!
//! The logger talks to its peripherals only through the small traits in this module.
//! Each one covers a single concern of the insole board:
//!
//! - `AnalogReader` - the analog-to-digital converter behind the FSR inputs and sync line
//! - `RealTimeClock` - the battery-backed clock that timestamps samples
//! - `MonotonicClock` - milliseconds since process start, driving the scheduler
//! - `NetworkLink` - the wireless link that must be up before the session port opens
//! - `FaultIndicator` - the persistent visible fault output
//!
//! Storage is covered separately by [`crate::storage::StorageMedium`].
//!
//! # Design Philosophy
//!
//! Each capability trait:
//! - Is thread-safe (requires Send + Sync) and takes `&self`
//! - Uses anyhow::Result for errors; the logger folds them into `LoggerError`
//! - Is async where the real peripheral may block (conversions, bus transfers)
//!
//! # Example
//!
//! ```rust,ignore
//! async fn sample_heel<R: AnalogReader>(adc: &R) -> Result<u16> {
//!     adc.read_raw(0).await
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;

/// Opaque selector of a physical input line.
pub type PinId = u8;

/// Capability: Analog Conversion
///
/// # Contract
/// - `read_raw` performs one conversion on `pin` and returns the raw code
/// - Codes lie in the converter's native domain (0..=1023 on the reference board)
/// - Conversions are fast; the scheduler calls this N + 1 times per sample tick
#[async_trait]
pub trait AnalogReader: Send + Sync {
    /// Convert the signal on `pin` and return the raw code.
    async fn read_raw(&self, pin: PinId) -> Result<u16>;
}

/// State of the real-time clock as reported at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcStatus {
    /// Oscillator running, time is meaningful
    Running,
    /// Present but stopped (e.g. backup battery was removed)
    Stopped,
    /// No clock answered on the bus
    NotFound,
}

/// Capability: Wall-Clock Time
///
/// # Contract
/// - `probe` is called once at startup
/// - `adjust` sets the clock to `epoch_seconds`; it is called at most once per run
/// - `now_epoch` returns seconds since the Unix epoch
#[async_trait]
pub trait RealTimeClock: Send + Sync {
    /// Report whether the clock is present and running.
    async fn probe(&self) -> Result<RtcStatus>;

    /// Set the clock.
    async fn adjust(&self, epoch_seconds: i64) -> Result<()>;

    /// Current time in seconds since the Unix epoch.
    async fn now_epoch(&self) -> Result<i64>;
}

/// Capability: Monotonic Milliseconds
///
/// Must never go backwards. Read once per scheduler pass.
pub trait MonotonicClock: Send + Sync {
    /// Milliseconds elapsed since process start.
    fn millis(&self) -> u64;
}

/// Result of one link join attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// Joined; `address` is the local address on the network
    Connected {
        /// Local address assigned on the network
        address: String,
    },
    /// Not (yet) joined
    Disconnected,
}

/// Capability: Network Link
///
/// # Contract
/// - `join` makes one attempt to join `network_name` and reports the outcome
/// - Transient failures are reported as `Ok(LinkStatus::Disconnected)`; the caller retries
#[async_trait]
pub trait NetworkLink: Send + Sync {
    /// Attempt to join the named network.
    async fn join(&self, network_name: &str) -> Result<LinkStatus>;
}

/// Capability: Fault Indicator
///
/// A latched output (LED on the reference board). Once raised it stays raised.
pub trait FaultIndicator: Send + Sync {
    /// Drive the indicator on.
    fn raise(&self);

    /// Whether the indicator has been raised.
    fn is_raised(&self) -> bool;
}
