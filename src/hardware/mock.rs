//! Mock Hardware Implementations
//!
//! Simulated peripherals for tests and for host runs without an insole attached.
//!
//! # Available Mocks
//!
//! - `MockAnalogInput` - fixed raw codes per pin, set from the test
//! - `SimulatedAnalogInput` - noisy FSR-like signal for demo runs
//! - `MockRtc` - settable clock with a configurable startup status
//! - `ManualClock` - millisecond clock advanced explicitly by the test
//! - `MockLink` - link that fails a given number of joins before connecting

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use super::capabilities::{
    AnalogReader, LinkStatus, MonotonicClock, NetworkLink, PinId, RealTimeClock, RtcStatus,
};

// =============================================================================
// MockAnalogInput - Deterministic ADC
// =============================================================================

/// ADC returning whatever raw code was last set for each pin.
///
/// Unset pins read as 0. Pins marked as failing return an error.
#[derive(Default)]
pub struct MockAnalogInput {
    codes: RwLock<HashMap<PinId, u16>>,
    failing: RwLock<Vec<PinId>>,
    conversions: AtomicU64,
}

impl MockAnalogInput {
    /// ADC with every pin reading 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the raw code returned for `pin`.
    pub fn set_raw(&self, pin: PinId, code: u16) {
        self.codes.write().insert(pin, code);
    }

    /// Make every conversion on `pin` fail.
    pub fn fail_pin(&self, pin: PinId) {
        self.failing.write().push(pin);
    }

    /// Number of conversions performed so far.
    pub fn conversions(&self) -> u64 {
        self.conversions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalogReader for MockAnalogInput {
    async fn read_raw(&self, pin: PinId) -> Result<u16> {
        if self.failing.read().contains(&pin) {
            return Err(anyhow!("conversion on pin {} failed", pin));
        }
        self.conversions.fetch_add(1, Ordering::SeqCst);
        Ok(self.codes.read().get(&pin).copied().unwrap_or(0))
    }
}

// =============================================================================
// SimulatedAnalogInput - FSR Stand-in
// =============================================================================

/// ADC producing a noisy load per pin, for host runs without hardware.
///
/// Each pin gets a base load derived from its index; every conversion adds uniform
/// noise of +/- `noise` codes, clamped to the converter range.
pub struct SimulatedAnalogInput {
    adc_max: u16,
    noise: u16,
    rng: Mutex<rand::rngs::StdRng>,
}

impl SimulatedAnalogInput {
    /// Simulated converter with the given full-scale code.
    pub fn new(adc_max: u16) -> Self {
        use rand::SeedableRng;
        Self {
            adc_max,
            noise: 12,
            rng: Mutex::new(rand::rngs::StdRng::from_entropy()),
        }
    }

    fn base_load(&self, pin: PinId) -> i32 {
        i32::from(self.adc_max) * (i32::from(pin % 8) + 1) / 10
    }
}

#[async_trait]
impl AnalogReader for SimulatedAnalogInput {
    async fn read_raw(&self, pin: PinId) -> Result<u16> {
        let noise = i32::from(self.noise);
        let jitter = self.rng.lock().gen_range(-noise..=noise);
        let code = (self.base_load(pin) + jitter).clamp(0, i32::from(self.adc_max));
        Ok(code as u16)
    }
}

// =============================================================================
// MockRtc - Settable Clock
// =============================================================================

/// Real-time clock whose status and time are set by the test.
pub struct MockRtc {
    status: RtcStatus,
    epoch: AtomicI64,
    adjusted: AtomicBool,
}

impl MockRtc {
    /// Clock reporting `status` at probe time and starting at `epoch`.
    pub fn new(status: RtcStatus, epoch: i64) -> Self {
        Self {
            status,
            epoch: AtomicI64::new(epoch),
            adjusted: AtomicBool::new(false),
        }
    }

    /// Running clock at `epoch`.
    pub fn running(epoch: i64) -> Self {
        Self::new(RtcStatus::Running, epoch)
    }

    /// Move the clock to `epoch`.
    pub fn set_epoch(&self, epoch: i64) {
        self.epoch.store(epoch, Ordering::SeqCst);
    }

    /// Whether `adjust` has been called.
    pub fn was_adjusted(&self) -> bool {
        self.adjusted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RealTimeClock for MockRtc {
    async fn probe(&self) -> Result<RtcStatus> {
        Ok(self.status)
    }

    async fn adjust(&self, epoch_seconds: i64) -> Result<()> {
        if self.status == RtcStatus::NotFound {
            return Err(anyhow!("no clock on the bus"));
        }
        self.epoch.store(epoch_seconds, Ordering::SeqCst);
        self.adjusted.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn now_epoch(&self) -> Result<i64> {
        if self.status == RtcStatus::NotFound {
            return Err(anyhow!("no clock on the bus"));
        }
        Ok(self.epoch.load(Ordering::SeqCst))
    }
}

// =============================================================================
// ManualClock - Test-driven Milliseconds
// =============================================================================

/// Millisecond clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    /// Clock starting at `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Jump to `ms`.
    pub fn set(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }

    /// Move forward by `ms`.
    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl MonotonicClock for ManualClock {
    fn millis(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

// =============================================================================
// MockLink - Flaky Network
// =============================================================================

/// Link that reports `Disconnected` for the first `failures` join attempts.
pub struct MockLink {
    failures: u32,
    attempts: AtomicU32,
}

impl MockLink {
    /// Link that connects on attempt `failures + 1`.
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            attempts: AtomicU32::new(0),
        }
    }

    /// Join attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkLink for MockLink {
    async fn join(&self, _network_name: &str) -> Result<LinkStatus> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            Ok(LinkStatus::Disconnected)
        } else {
            Ok(LinkStatus::Connected {
                address: "192.168.4.2".to_string(),
            })
        }
    }
}
