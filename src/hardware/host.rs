//! Host implementations of the peripheral capabilities.
//!
//! These back the binary when it runs on a workstation instead of the insole board:
//! the process clock stands in for the millisecond timer, the system clock for the RTC,
//! and a latched flag (reported through tracing) for the fault LED.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use super::capabilities::{
    FaultIndicator, LinkStatus, MonotonicClock, NetworkLink, RealTimeClock, RtcStatus,
};

/// Millisecond clock anchored at construction time.
#[derive(Debug, Clone)]
pub struct SystemMonotonic {
    start: Instant,
}

impl SystemMonotonic {
    /// Start counting from now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemMonotonic {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemMonotonic {
    fn millis(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// RTC backed by the host wall clock.
///
/// `adjust` does not touch the system time; it records an offset that is applied to
/// every subsequent reading.
#[derive(Debug, Default)]
pub struct SystemRtc {
    offset_seconds: AtomicI64,
}

impl SystemRtc {
    /// Clock with no offset applied.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RealTimeClock for SystemRtc {
    async fn probe(&self) -> Result<RtcStatus> {
        Ok(RtcStatus::Running)
    }

    async fn adjust(&self, epoch_seconds: i64) -> Result<()> {
        let offset = epoch_seconds - Utc::now().timestamp();
        self.offset_seconds.store(offset, Ordering::SeqCst);
        Ok(())
    }

    async fn now_epoch(&self) -> Result<i64> {
        Ok(Utc::now().timestamp() + self.offset_seconds.load(Ordering::SeqCst))
    }
}

/// Link for hosts that are already on a network.
///
/// Every join succeeds immediately and reports the configured bind address.
#[derive(Debug, Clone)]
pub struct HostLink {
    address: String,
}

impl HostLink {
    /// Link that reports `address` once joined.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl NetworkLink for HostLink {
    async fn join(&self, network_name: &str) -> Result<LinkStatus> {
        info!(network = network_name, "Host network assumed available");
        Ok(LinkStatus::Connected {
            address: self.address.clone(),
        })
    }
}

/// Latched fault flag, shareable between the supervisor and whoever watches it.
#[derive(Debug, Clone, Default)]
pub struct FaultLatch {
    raised: Arc<AtomicBool>,
}

impl FaultLatch {
    /// New latch in the cleared state.
    pub fn new() -> Self {
        Self::default()
    }
}

impl FaultIndicator for FaultLatch {
    fn raise(&self) {
        if !self.raised.swap(true, Ordering::SeqCst) {
            error!("Fault indicator raised");
        }
    }

    fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_never_goes_backwards() {
        let clock = SystemMonotonic::new();
        let a = clock.millis();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = clock.millis();
        assert!(b >= a + 1);
    }

    #[tokio::test]
    async fn rtc_adjust_applies_offset() {
        let rtc = SystemRtc::new();
        assert_eq!(rtc.probe().await.unwrap(), RtcStatus::Running);

        rtc.adjust(1_600_000_000).await.unwrap();
        let now = rtc.now_epoch().await.unwrap();
        assert!((now - 1_600_000_000).abs() <= 1);
    }

    #[test]
    fn fault_latch_stays_raised_across_clones() {
        let latch = FaultLatch::new();
        let observer = latch.clone();
        assert!(!observer.is_raised());

        latch.raise();
        latch.raise();
        assert!(observer.is_raised());
    }

    #[tokio::test]
    async fn host_link_connects_immediately() {
        let link = HostLink::new("127.0.0.1");
        let status = link.join("lab").await.unwrap();
        assert_eq!(
            status,
            LinkStatus::Connected {
                address: "127.0.0.1".to_string()
            }
        );
    }
}
