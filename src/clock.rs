//! Wall-clock source for sample timestamps.

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{ClockConfig, ClockSetPolicy};
use crate::error::{AppResult, LoggerError};
use crate::hardware::{RealTimeClock, RtcStatus};

/// Startup-checked real-time clock.
///
/// Built once during startup; a missing clock is fatal, a stopped one only warns.
#[derive(Clone)]
pub struct ClockSource {
    rtc: Arc<dyn RealTimeClock>,
}

impl ClockSource {
    /// Probe the clock and apply the one-time set policy.
    pub async fn start(rtc: Arc<dyn RealTimeClock>, config: &ClockConfig) -> AppResult<Self> {
        let status = rtc.probe().await?;
        match status {
            RtcStatus::NotFound => return Err(LoggerError::ClockNotFound),
            RtcStatus::Stopped => warn!("RTC is not running"),
            RtcStatus::Running => info!("RTC running"),
        }

        let should_set = match config.set_policy {
            ClockSetPolicy::Always => true,
            ClockSetPolicy::WhenStopped => status == RtcStatus::Stopped,
            ClockSetPolicy::Never => false,
        };
        if should_set {
            let epoch = config
                .initial_epoch
                .unwrap_or_else(|| Utc::now().timestamp());
            rtc.adjust(epoch).await?;
            info!(epoch, time = %describe(epoch), "RTC set");
        }

        Ok(Self { rtc })
    }

    /// Current time in seconds since the Unix epoch.
    pub async fn now(&self) -> AppResult<i64> {
        Ok(self.rtc.now_epoch().await?)
    }
}

fn describe(epoch: i64) -> String {
    Utc.timestamp_opt(epoch, 0)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "out of range".to_string())
}
