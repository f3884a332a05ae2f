//! Startup sequence and fatal-error supervision.
//!
//! Startup runs strictly in order: network link, storage medium, real-time clock,
//! session negotiation, log file allocation. Only then does the acquisition loop start.
//! Any error along the way, or out of the loop, is terminal and goes through
//! [`run_supervised`].

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::acquisition::{AcquisitionScheduler, ChannelArray, RecordFormatter};
use crate::clock::ClockSource;
use crate::config::LoggerConfig;
use crate::error::{AppResult, LoggerError};
use crate::hardware::host::{FaultLatch, HostLink, SystemMonotonic, SystemRtc};
use crate::hardware::mock::SimulatedAnalogInput;
use crate::hardware::{
    AnalogReader, FaultIndicator, LinkStatus, MonotonicClock, NetworkLink, RealTimeClock,
};
use crate::session::{NegotiatedSession, SessionNegotiator, SessionTransport, TcpSessionTransport};
use crate::storage::{DirectoryMedium, LogFileAllocator, StorageMedium};

/// Every collaborator the logger talks to.
#[derive(Clone)]
pub struct Peripherals {
    /// Wireless link
    pub link: Arc<dyn NetworkLink>,
    /// Removable medium
    pub medium: Arc<dyn StorageMedium>,
    /// Real-time clock
    pub rtc: Arc<dyn RealTimeClock>,
    /// ADC behind the FSRs and sync line
    pub analog: Arc<dyn AnalogReader>,
    /// Millisecond clock driving the scheduler
    pub monotonic: Arc<dyn MonotonicClock>,
    /// Visible fault output
    pub fault: Arc<dyn FaultIndicator>,
}

impl Peripherals {
    /// Workstation stand-ins: system clocks, a directory for the card, simulated FSRs.
    pub fn host(config: &LoggerConfig) -> Self {
        Self {
            link: Arc::new(HostLink::new(config.network.bind_address.clone())),
            medium: Arc::new(DirectoryMedium::new(config.storage.root_dir.clone())),
            rtc: Arc::new(SystemRtc::new()),
            analog: Arc::new(SimulatedAnalogInput::new(config.acquisition.adc_max)),
            monotonic: Arc::new(SystemMonotonic::new()),
            fault: Arc::new(FaultLatch::new()),
        }
    }
}

/// TCP transport on the configured address and port.
pub fn host_transport(config: &LoggerConfig) -> TcpSessionTransport {
    TcpSessionTransport::new(format!(
        "{}:{}",
        config.network.bind_address, config.network.port
    ))
}

/// State produced by a successful startup.
pub struct StartedLogger {
    /// Negotiated session
    pub session: NegotiatedSession,
    /// Log file being written
    pub file_name: String,
    /// Scheduler owning the open log
    pub scheduler: AcquisitionScheduler,
}

/// Configuration plus peripherals, consumed by the startup sequence.
pub struct LoggerContext {
    config: LoggerConfig,
    peripherals: Peripherals,
}

impl LoggerContext {
    /// Validate `config` and bind it to `peripherals`.
    pub fn new(config: LoggerConfig, peripherals: Peripherals) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            peripherals,
        })
    }

    pub fn fault(&self) -> Arc<dyn FaultIndicator> {
        Arc::clone(&self.peripherals.fault)
    }

    /// Retry the link until it reports connected, or `link_timeout_ms` elapses.
    pub async fn join_network(&self) -> AppResult<String> {
        match self.config.network.link_timeout_ms {
            Some(limit) => tokio::time::timeout(Duration::from_millis(limit), self.retry_link())
                .await
                .map_err(|_| LoggerError::Timeout("network link".to_string()))?,
            None => self.retry_link().await,
        }
    }

    async fn retry_link(&self) -> AppResult<String> {
        let network = &self.config.network;
        let delay = Duration::from_millis(network.link_retry_delay_ms);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let status = self
                .peripherals
                .link
                .join(&network.network_name)
                .await
                .map_err(|e| LoggerError::Network(format!("{e:#}")))?;
            match status {
                LinkStatus::Connected { address } => {
                    info!(network = %network.network_name, %address, attempt, "Network link up");
                    return Ok(address);
                }
                LinkStatus::Disconnected => {
                    warn!(network = %network.network_name, attempt, "Network link down, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Bring the storage medium up. Not retried.
    pub async fn init_storage(&self) -> AppResult<()> {
        self.peripherals
            .medium
            .init()
            .await
            .map_err(|e| LoggerError::StorageInit(format!("{e:#}")))?;
        info!(select_line = self.config.storage.select_line, "Storage medium ready");
        Ok(())
    }

    /// Run every startup phase and return the ready-to-run scheduler.
    pub async fn start<T: SessionTransport>(&self, transport: T) -> AppResult<StartedLogger> {
        self.join_network().await?;
        self.init_storage().await?;
        let clock = ClockSource::start(Arc::clone(&self.peripherals.rtc), &self.config.clock).await?;

        let mut negotiator = SessionNegotiator::new(transport, &self.config.network);
        let session = negotiator.negotiate().await?;
        drop(negotiator);

        let channels = ChannelArray::from_config(&self.config);
        let formatter = RecordFormatter::new(channels.names());
        let file = LogFileAllocator::new(Arc::clone(&self.peripherals.medium))
            .allocate(session.id, &formatter)
            .await?;

        let scheduler = AcquisitionScheduler::new(
            channels,
            &self.config.acquisition,
            clock,
            Arc::clone(&self.peripherals.analog),
            Arc::clone(&self.peripherals.monotonic),
            file.handle,
        );
        Ok(StartedLogger {
            session,
            file_name: file.name,
            scheduler,
        })
    }
}

/// Start the logger and acquire until a fatal error.
///
/// On any error the fault indicator is raised before the error is handed back. The
/// error is never retried here.
pub async fn run_supervised<T: SessionTransport>(
    context: &LoggerContext,
    transport: T,
) -> AppResult<Infallible> {
    let result = match context.start(transport).await {
        Ok(started) => started.scheduler.run().await,
        Err(err) => Err(err),
    };
    if let Err(err) = &result {
        error!(kind = err.kind(), error = %err, "Fatal error, acquisition halted");
        context.fault().raise();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::{ManualClock, MockAnalogInput, MockLink, MockRtc};
    use crate::hardware::RtcStatus;
    use crate::session::{ScriptedConnection, ScriptedTransport};
    use crate::storage::MemoryMedium;

    struct Rig {
        peripherals: Peripherals,
        medium: MemoryMedium,
        link: Arc<MockLink>,
        fault: FaultLatch,
    }

    fn rig(link_failures: u32, rtc_status: RtcStatus) -> Rig {
        let medium = MemoryMedium::new();
        let link = Arc::new(MockLink::new(link_failures));
        let fault = FaultLatch::new();
        let peripherals = Peripherals {
            link: link.clone(),
            medium: Arc::new(medium.clone()),
            rtc: Arc::new(MockRtc::new(rtc_status, 1_600_000_000)),
            analog: Arc::new(MockAnalogInput::new()),
            monotonic: Arc::new(ManualClock::new(0)),
            fault: Arc::new(fault.clone()),
        };
        Rig {
            peripherals,
            medium,
            link,
            fault,
        }
    }

    fn config() -> LoggerConfig {
        let mut config = LoggerConfig::default();
        config.network.link_retry_delay_ms = 1;
        config
    }

    fn client(bytes: &[u8]) -> ScriptedTransport {
        ScriptedTransport::new([ScriptedConnection::from_bytes("tester", bytes)])
    }

    #[tokio::test]
    async fn startup_allocates_file_with_header() {
        let rig = rig(0, RtcStatus::Running);
        let context = LoggerContext::new(config(), rig.peripherals.clone()).unwrap();

        let started = context.start(client(b"12\n")).await.unwrap();
        assert_eq!(started.session.id.get(), 12);
        assert_eq!(started.file_name, "S012E000.CSV");
        assert!(rig
            .medium
            .durable_contents("S012E000.CSV")
            .unwrap()
            .starts_with("millis,epoch,sync,f1LV,"));
    }

    #[tokio::test]
    async fn link_is_retried_until_connected() {
        let rig = rig(3, RtcStatus::Running);
        let context = LoggerContext::new(config(), rig.peripherals.clone()).unwrap();
        let address = context.join_network().await.unwrap();
        assert_eq!(address, "192.168.4.2");
        assert_eq!(rig.link.attempts(), 4);
    }

    #[tokio::test]
    async fn link_timeout_is_fatal() {
        let rig = rig(u32::MAX, RtcStatus::Running);
        let mut config = config();
        config.network.link_timeout_ms = Some(30);
        let context = LoggerContext::new(config, rig.peripherals.clone()).unwrap();

        let err = run_supervised(&context, client(b"1\n")).await.unwrap_err();
        assert!(matches!(err, LoggerError::Timeout(ref what) if what == "network link"));
        assert!(rig.fault.is_raised());
        assert!(rig.link.attempts() > 1);
        assert!(rig.medium.file_names().is_empty());
    }

    #[tokio::test]
    async fn storage_init_failure_raises_fault() {
        let rig = rig(0, RtcStatus::Running);
        rig.medium.fail_init();
        let context = LoggerContext::new(config(), rig.peripherals.clone()).unwrap();

        let err = run_supervised(&context, client(b"1\n")).await.unwrap_err();
        assert!(matches!(err, LoggerError::StorageInit(_)));
        assert!(rig.fault.is_raised());
    }

    #[tokio::test]
    async fn missing_clock_halts_before_session() {
        let rig = rig(0, RtcStatus::NotFound);
        let context = LoggerContext::new(config(), rig.peripherals.clone()).unwrap();
        let transport = client(b"1\n");

        let err = run_supervised(&context, transport).await.unwrap_err();
        assert!(matches!(err, LoggerError::ClockNotFound));
        assert!(rig.fault.is_raised());
        assert!(rig.medium.file_names().is_empty());
    }

    #[tokio::test]
    async fn out_of_range_session_raises_fault() {
        let rig = rig(0, RtcStatus::Stopped);
        let context = LoggerContext::new(config(), rig.peripherals.clone()).unwrap();

        let err = run_supervised(&context, client(b"4242\n")).await.unwrap_err();
        assert!(matches!(err, LoggerError::SessionIdOutOfRange(4242)));
        assert!(rig.fault.is_raised());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let rig = rig(0, RtcStatus::Running);
        let mut config = config();
        config.channels.clear();
        assert!(LoggerContext::new(config, rig.peripherals).is_err());
    }
}
