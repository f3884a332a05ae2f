//! Sampling, record rendering and the acquisition loop.

pub mod channel;
pub mod record;
pub mod scheduler;

pub use channel::{Calibration, Channel, ChannelArray, ChannelValue, OutputMode, RangeMap};
pub use record::{RecordFormatter, Sample, FIXED_COLUMNS};
pub use scheduler::{AcquisitionScheduler, PeriodicTrigger, TickOutcome};
