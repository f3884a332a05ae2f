//! Peripheral Abstractions
//!
//! Capability traits for the board's collaborators, host-side implementations used when
//! running on a workstation, and mocks for tests.

pub mod capabilities;
pub mod host;
pub mod mock;

pub use capabilities::{
    AnalogReader, FaultIndicator, LinkStatus, MonotonicClock, NetworkLink, PinId,
    RealTimeClock, RtcStatus,
};
