//! Logger configuration using Figment
//!
//! Configuration is assembled from three layers, later layers overriding earlier ones:
//! 1. Built-in defaults (the reference insole configuration)
//! 2. A TOML file (`config/insole_logger.toml` by default)
//! 3. Environment variables prefixed with `INSOLE_LOGGER_`, using `__` between sections
//!    (e.g. `INSOLE_LOGGER_ACQUISITION__SAMPLE_PERIOD_MS=20`)
//!
//! The values are read once at startup and stay fixed for the rest of the run.
//!
//! # Example
//! ```no_run
//! use insole_logger::config::LoggerConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LoggerConfig::load()?;
//! config.validate()?;
//! println!("Sampling {} channels", config.channels.len());
//! # Ok(())
//! # }
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{AppResult, LoggerError};
use crate::hardware::PinId;
use crate::validation;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/insole_logger.toml";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "INSOLE_LOGGER_";

/// Top-level logger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Sampling cadence and ADC scaling
    pub acquisition: AcquisitionConfig,
    /// Ordered FSR channel table; its length is the channel count N
    pub channels: Vec<ChannelDefinition>,
    /// Wireless link and session port
    pub network: NetworkConfig,
    /// Storage medium settings
    pub storage: StorageConfig,
    /// Real-time clock policy
    pub clock: ClockConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Park forever after a fatal error instead of exiting
    #[serde(default = "default_true")]
    pub halt_on_fatal: bool,
}

/// Sampling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Period of the sample trigger in milliseconds
    pub sample_period_ms: u64,
    /// Period of the durability-sync trigger in milliseconds
    pub sync_period_ms: u64,
    /// Input selector of the external sync line
    pub sync_pin: PinId,
    /// Largest raw value the ADC can report
    #[serde(default = "default_adc_max")]
    pub adc_max: u16,
    /// Output value mapped to `adc_max` (millivolt-like domain)
    #[serde(default = "default_output_max")]
    pub output_max_mv: i32,
    /// Log calibrated force values instead of scaled millivolts
    #[serde(default)]
    pub apply_calibration: bool,
}

/// One FSR channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelDefinition {
    /// Column name in the log header
    pub name: String,
    /// Raw input selector
    pub pin: PinId,
    /// Calibration slope (force per millivolt)
    #[serde(default = "default_slope")]
    pub slope: f64,
    /// Calibration intercept
    #[serde(default)]
    pub intercept: f64,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Name of the wireless network to join
    pub network_name: String,
    /// Address the session listener binds to
    pub bind_address: String,
    /// Well-known session port
    pub port: u16,
    /// Prompt sent to the client once it connects
    pub prompt: String,
    /// Delay between link join attempts in milliseconds
    #[serde(default = "default_link_retry_delay")]
    pub link_retry_delay_ms: u64,
    /// Give up joining the link after this many milliseconds
    #[serde(default)]
    pub link_timeout_ms: Option<u64>,
    /// Give up waiting for a session identifier after this many milliseconds
    #[serde(default)]
    pub client_timeout_ms: Option<u64>,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory standing in for the removable medium's root
    pub root_dir: PathBuf,
    /// Select line of the medium (reported in diagnostics)
    pub select_line: u8,
}

/// When the real-time clock is set during startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockSetPolicy {
    /// Set the clock on every startup
    Always,
    /// Set the clock only when it reports that it is stopped
    WhenStopped,
    /// Never touch the clock
    Never,
}

/// Real-time clock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Startup set policy
    pub set_policy: ClockSetPolicy,
    /// Epoch seconds to set; the host wall clock is used when absent
    #[serde(default)]
    pub initial_epoch: Option<i64>,
}

// Default value functions
fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_true() -> bool {
    true
}

fn default_adc_max() -> u16 {
    1023
}

fn default_output_max() -> i32 {
    5000
}

fn default_slope() -> f64 {
    1.0
}

fn default_link_retry_delay() -> u64 {
    1000
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "Insole Logger".to_string(),
            log_level: "info".to_string(),
            log_format: default_log_format(),
            halt_on_fatal: true,
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sample_period_ms: 10,
            sync_period_ms: 1000,
            sync_pin: 10,
            adc_max: default_adc_max(),
            output_max_mv: default_output_max(),
            apply_calibration: false,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network_name: "insole-net".to_string(),
            bind_address: "0.0.0.0".to_string(),
            port: 23,
            prompt: "Enter subject number (0-999): ".to_string(),
            link_retry_delay_ms: default_link_retry_delay(),
            link_timeout_ms: None,
            client_timeout_ms: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("data"),
            select_line: 4,
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            set_policy: ClockSetPolicy::Always,
            initial_epoch: None,
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            application: ApplicationConfig::default(),
            acquisition: AcquisitionConfig::default(),
            channels: reference_channels(),
            network: NetworkConfig::default(),
            storage: StorageConfig::default(),
            clock: ClockConfig::default(),
        }
    }
}

/// Five sensors per foot, left foot first, on inputs 0..10.
fn reference_channels() -> Vec<ChannelDefinition> {
    ["L", "R"]
        .iter()
        .flat_map(|side| (1..=5).map(move |n| format!("f{n}{side}V")))
        .enumerate()
        .map(|(pin, name)| ChannelDefinition {
            name,
            pin: pin as PinId,
            slope: default_slope(),
            intercept: 0.0,
        })
        .collect()
}

impl LoggerConfig {
    /// Load configuration from the default file and environment variables
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; the defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config = Figment::from(Serialized::defaults(LoggerConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Render the configuration as TOML, e.g. to seed a config file.
    pub fn to_toml_string(&self) -> AppResult<String> {
        toml::to_string_pretty(self).map_err(|e| LoggerError::Configuration(e.to_string()))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let invalid = |msg: String| Err(LoggerError::Configuration(msg));

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return invalid(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.as_str()) {
            return invalid(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            ));
        }

        let acq = &self.acquisition;
        if acq.sample_period_ms == 0 {
            return invalid("sample_period_ms must be greater than 0".to_string());
        }
        if acq.sync_period_ms < acq.sample_period_ms {
            return invalid(format!(
                "sync_period_ms ({}) must not be shorter than sample_period_ms ({})",
                acq.sync_period_ms, acq.sample_period_ms
            ));
        }
        if acq.adc_max == 0 {
            return invalid("adc_max must be greater than 0".to_string());
        }
        if let Err(e) = validation::is_in_range(acq.output_max_mv, 1..=i32::MAX) {
            return invalid(format!("output_max_mv: {e}"));
        }

        if self.channels.is_empty() {
            return invalid("At least one channel must be configured".to_string());
        }
        let mut names = HashSet::new();
        let mut pins = HashSet::from([acq.sync_pin]);
        for channel in &self.channels {
            if let Err(e) = validation::is_valid_column_name(&channel.name) {
                return invalid(format!("Channel name '{}': {e}", channel.name));
            }
            if !names.insert(channel.name.as_str()) {
                return invalid(format!("Duplicate channel name: {}", channel.name));
            }
            if !pins.insert(channel.pin) {
                return invalid(format!(
                    "Pin {} of channel '{}' is already in use",
                    channel.pin, channel.name
                ));
            }
            if !channel.slope.is_finite() || !channel.intercept.is_finite() {
                return invalid(format!(
                    "Calibration of channel '{}' must be finite",
                    channel.name
                ));
            }
        }

        let net = &self.network;
        if let Err(e) = validation::is_not_empty(&net.network_name) {
            return invalid(format!("network_name: {e}"));
        }
        if let Err(e) = validation::is_valid_ip(&net.bind_address) {
            return invalid(format!("bind_address '{}': {e}", net.bind_address));
        }
        if let Err(e) = validation::is_valid_port(net.port) {
            return invalid(e.to_string());
        }

        if let Err(e) = validation::is_valid_path(&self.storage.root_dir.to_string_lossy()) {
            return invalid(format!("root_dir: {e}"));
        }

        Ok(())
    }

    /// Column names of the configured channels, in sampling order.
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name.as_str()).collect()
    }
}
