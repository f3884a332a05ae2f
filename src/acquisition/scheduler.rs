//! Acquisition super-loop.
//!
//! Two independent periodic triggers share one millisecond clock reading per pass:
//!
//! - the sample trigger reads every channel and appends one buffered record,
//! - the sync trigger echoes the latest sample and makes the log durable.
//!
//! A trigger that fires records the time it was *serviced*, not its nominal deadline,
//! so a late tick pushes every later tick back. Intervals can stretch but never shrink.

use std::convert::Infallible;
use std::sync::Arc;

use tracing::{debug, info};

use super::channel::ChannelArray;
use super::record::{RecordFormatter, Sample};
use crate::clock::ClockSource;
use crate::config::AcquisitionConfig;
use crate::error::{AppResult, LoggerError};
use crate::hardware::{AnalogReader, MonotonicClock, PinId};
use crate::storage::LogHandle;
use crate::tracing_init::ECHO_TARGET;

/// Fires when at least `period_ms` has passed since it last fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicTrigger {
    period_ms: u64,
    last_fired_ms: u64,
}

impl PeriodicTrigger {
    /// Trigger that last fired at time zero.
    pub fn new(period_ms: u64) -> Self {
        Self {
            period_ms,
            last_fired_ms: 0,
        }
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    pub fn last_fired_ms(&self) -> u64 {
        self.last_fired_ms
    }

    /// Check the trigger at `now_ms`; on fire the trigger restarts from `now_ms`.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_fired_ms) >= self.period_ms {
            self.last_fired_ms = now_ms;
            true
        } else {
            false
        }
    }
}

/// Which triggers fired during one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// A record was appended
    pub sampled: bool,
    /// The log was synced
    pub synced: bool,
}

/// Owns the open log and drives sampling until a fatal error.
pub struct AcquisitionScheduler {
    channels: ChannelArray,
    formatter: RecordFormatter,
    sync_pin: PinId,
    sample_trigger: PeriodicTrigger,
    sync_trigger: PeriodicTrigger,
    analog: Arc<dyn AnalogReader>,
    monotonic: Arc<dyn MonotonicClock>,
    clock: ClockSource,
    log: Box<dyn LogHandle>,
    last_sample: Option<Sample>,
    samples_logged: u64,
    syncs_issued: u64,
}

impl AcquisitionScheduler {
    pub fn new(
        channels: ChannelArray,
        config: &AcquisitionConfig,
        clock: ClockSource,
        analog: Arc<dyn AnalogReader>,
        monotonic: Arc<dyn MonotonicClock>,
        log: Box<dyn LogHandle>,
    ) -> Self {
        let formatter = RecordFormatter::new(channels.names());
        Self {
            channels,
            formatter,
            sync_pin: config.sync_pin,
            sample_trigger: PeriodicTrigger::new(config.sample_period_ms),
            sync_trigger: PeriodicTrigger::new(config.sync_period_ms),
            analog,
            monotonic,
            clock,
            log,
            last_sample: None,
            samples_logged: 0,
            syncs_issued: 0,
        }
    }

    /// Records appended so far.
    pub fn samples_logged(&self) -> u64 {
        self.samples_logged
    }

    /// Durability-syncs issued so far.
    pub fn syncs_issued(&self) -> u64 {
        self.syncs_issued
    }

    /// Most recently captured sample, if any.
    pub fn last_sample(&self) -> Option<&Sample> {
        self.last_sample.as_ref()
    }

    /// One scheduling pass at the current monotonic time.
    pub async fn poll(&mut self) -> AppResult<TickOutcome> {
        let now = self.monotonic.millis();
        self.tick_at(now).await
    }

    /// One scheduling pass at `now_ms`. Both triggers are checked every pass.
    pub async fn tick_at(&mut self, now_ms: u64) -> AppResult<TickOutcome> {
        let mut outcome = TickOutcome::default();
        if self.sample_trigger.poll(now_ms) {
            self.sample().await?;
            outcome.sampled = true;
        }
        if self.sync_trigger.poll(now_ms) {
            self.sync().await?;
            outcome.synced = true;
        }
        Ok(outcome)
    }

    /// Run until a fatal error.
    pub async fn run(mut self) -> AppResult<Infallible> {
        info!(
            channels = self.channels.len(),
            sample_period_ms = self.sample_trigger.period_ms(),
            sync_period_ms = self.sync_trigger.period_ms(),
            "Acquisition started"
        );
        loop {
            if let Err(err) = self.poll().await {
                info!(
                    samples = self.samples_logged,
                    syncs = self.syncs_issued,
                    "Acquisition stopped"
                );
                return Err(err);
            }
            tokio::task::yield_now().await;
        }
    }

    async fn sample(&mut self) -> AppResult<()> {
        let sync_raw = self.analog.read_raw(self.sync_pin).await?;
        let channels = self.channels.read_all(self.analog.as_ref()).await?;
        let sample = Sample {
            relative_ms: self.sample_trigger.last_fired_ms(),
            epoch_seconds: self.clock.now().await?,
            sync: self.channels.scale(sync_raw),
            channels,
        };

        let line = self.formatter.render(&sample)?;
        self.log
            .append(&line)
            .await
            .map_err(|e| LoggerError::Write(format!("{e:#}")))?;

        self.samples_logged += 1;
        self.last_sample = Some(sample);
        Ok(())
    }

    async fn sync(&mut self) -> AppResult<()> {
        if let Some(sample) = &self.last_sample {
            let echo = self.formatter.render_echo(sample)?;
            info!(target: ECHO_TARGET, "{}", echo);
        }
        self.log
            .sync()
            .await
            .map_err(|e| LoggerError::Write(format!("{e:#}")))?;
        self.syncs_issued += 1;
        debug!(samples = self.samples_logged, "Log synced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::channel::{Calibration, OutputMode, RangeMap};
    use crate::config::ClockConfig;
    use crate::hardware::mock::{ManualClock, MockAnalogInput, MockRtc};
    use crate::storage::{MemoryMedium, StorageMedium};
    use tracing_test::traced_test;

    const FILE: &str = "S001E000.CSV";

    struct Fixture {
        scheduler: AcquisitionScheduler,
        clock: ManualClock,
        adc: Arc<MockAnalogInput>,
        medium: MemoryMedium,
    }

    async fn fixture(sample_period_ms: u64, sync_period_ms: u64) -> Fixture {
        let channels = ChannelArray::new(
            [("heel", 0), ("toe", 1)].map(|(name, pin)| {
                (
                    name.to_string(),
                    pin,
                    Calibration {
                        slope: 1.0,
                        intercept: 0.0,
                    },
                )
            }),
            RangeMap::adc_to_millivolts(1023, 5000),
            OutputMode::Scaled,
        );
        let config = AcquisitionConfig {
            sample_period_ms,
            sync_period_ms,
            sync_pin: 10,
            ..AcquisitionConfig::default()
        };

        let adc = Arc::new(MockAnalogInput::new());
        adc.set_raw(0, 1023);
        adc.set_raw(1, 0);
        adc.set_raw(10, 512);

        let rtc = Arc::new(MockRtc::running(1_600_000_000));
        let clock_config = ClockConfig {
            set_policy: crate::config::ClockSetPolicy::Never,
            initial_epoch: None,
        };
        let rtc_source = ClockSource::start(rtc, &clock_config).await.unwrap();

        let medium = MemoryMedium::new();
        let log = medium.create_exclusive(FILE).await.unwrap();
        let clock = ManualClock::new(0);

        let scheduler = AcquisitionScheduler::new(
            channels,
            &config,
            rtc_source,
            adc.clone(),
            Arc::new(clock.clone()),
            log,
        );
        Fixture {
            scheduler,
            clock,
            adc,
            medium,
        }
    }

    fn fired(sampled: bool, synced: bool) -> TickOutcome {
        TickOutcome { sampled, synced }
    }

    #[test]
    fn trigger_restarts_from_service_time() {
        let mut trigger = PeriodicTrigger::new(10);
        assert!(!trigger.poll(9));
        assert!(trigger.poll(13));
        assert_eq!(trigger.last_fired_ms(), 13);
        assert!(!trigger.poll(22));
        assert!(trigger.poll(23));
    }

    #[test]
    fn trigger_tolerates_clock_before_last_fire() {
        let mut trigger = PeriodicTrigger::new(10);
        assert!(trigger.poll(100));
        assert!(!trigger.poll(50));
    }

    #[tokio::test]
    async fn triggers_are_independent() {
        let mut f = fixture(10, 1000).await;
        let s = &mut f.scheduler;

        assert_eq!(s.tick_at(0).await.unwrap(), fired(false, false));
        assert_eq!(s.tick_at(10).await.unwrap(), fired(true, false));
        assert_eq!(s.tick_at(1000).await.unwrap(), fired(true, true));
        assert_eq!(s.tick_at(1005).await.unwrap(), fired(false, false));
        assert_eq!(s.tick_at(1010).await.unwrap(), fired(true, false));
        // Sample ticks at 1010..1990 do not move the sync deadline
        assert_eq!(s.tick_at(1995).await.unwrap(), fired(true, false));
        assert_eq!(s.tick_at(2000).await.unwrap(), fired(false, true));

        assert_eq!(s.samples_logged(), 4);
        assert_eq!(s.syncs_issued(), 2);
    }

    #[tokio::test]
    async fn late_sample_pushes_schedule_back() {
        let mut f = fixture(10, 1000).await;
        let s = &mut f.scheduler;

        assert!(s.tick_at(10).await.unwrap().sampled);
        assert!(s.tick_at(35).await.unwrap().sampled);
        assert_eq!(s.last_sample().unwrap().relative_ms, 35);
        assert!(!s.tick_at(44).await.unwrap().sampled);
        assert!(s.tick_at(45).await.unwrap().sampled);
        assert_eq!(s.last_sample().unwrap().relative_ms, 45);
    }

    #[tokio::test]
    async fn records_are_buffered_until_sync() {
        let mut f = fixture(10, 1000).await;

        f.scheduler.tick_at(10).await.unwrap();
        f.scheduler.tick_at(20).await.unwrap();
        assert_eq!(f.medium.durable_contents(FILE).unwrap(), "");
        assert!(f.medium.pending_len(FILE) > 0);

        f.scheduler.tick_at(1000).await.unwrap();
        assert_eq!(
            f.medium.durable_contents(FILE).unwrap(),
            "10, 1600000000, 2502, 5000, 0\n\
             20, 1600000000, 2502, 5000, 0\n\
             1000, 1600000000, 2502, 5000, 0\n"
        );
        assert_eq!(f.medium.sync_count(FILE), 1);
    }

    #[tokio::test]
    async fn sync_without_sample_still_syncs() {
        let mut f = fixture(100, 50).await;
        assert_eq!(f.scheduler.tick_at(50).await.unwrap(), fired(false, true));
        assert_eq!(f.medium.sync_count(FILE), 1);
        assert_eq!(f.medium.durable_contents(FILE).unwrap(), "");
    }

    #[tokio::test]
    #[traced_test]
    async fn sync_echoes_latest_sample() {
        let mut f = fixture(10, 1000).await;
        f.scheduler.tick_at(990).await.unwrap();
        f.adc.set_raw(1, 1023);
        f.scheduler.tick_at(1000).await.unwrap();

        assert!(logs_contain("t=1000ms epoch=1600000000 sync=2502 | heel=5000 toe=5000"));
        assert!(!logs_contain("t=990ms"));
    }

    #[tokio::test]
    async fn poll_reads_monotonic_clock() {
        let mut f = fixture(10, 1000).await;
        f.clock.set(15);
        assert!(f.scheduler.poll().await.unwrap().sampled);
        assert_eq!(f.scheduler.last_sample().unwrap().relative_ms, 15);
    }

    #[tokio::test]
    async fn write_failure_is_fatal() {
        let mut f = fixture(10, 1000).await;
        f.medium.fail_writes();
        let err = f.scheduler.tick_at(10).await.unwrap_err();
        assert!(matches!(err, LoggerError::Write(_)));
    }

    #[tokio::test]
    async fn adc_failure_is_fatal() {
        let mut f = fixture(10, 1000).await;
        f.adc.fail_pin(1);
        let err = f.scheduler.tick_at(10).await.unwrap_err();
        assert!(matches!(err, LoggerError::Hardware(_)));
        assert_eq!(f.scheduler.samples_logged(), 0);
    }

    #[tokio::test]
    async fn run_returns_on_fatal_error() {
        let f = fixture(10, 1000).await;
        f.clock.set(10);
        f.medium.fail_writes();
        let result = f.scheduler.run().await;
        assert!(matches!(result, Err(LoggerError::Write(_))));
    }
}
