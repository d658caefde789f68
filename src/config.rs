//! Configuration System using Figment
//!
//! This module provides strongly-typed configuration loading. Configuration is
//! merged from:
//! 1. `config/encoder_daq.toml` (base configuration, optional)
//! 2. Environment variables prefixed with `ENCODER_DAQ_`, with `__` separating
//!    nested keys
//!
//! Command-line flags are applied on top by the binary.
//!
//! # Example
//! ```no_run
//! use encoder_daq::config::AppConfig;
//!
//! // ENCODER_DAQ_ACQUISITION__HIGH_CHANNEL=3 overrides the file
//! let config = AppConfig::load()?;
//! config.validate()?;
//! println!("Channels {}-{}", config.acquisition.low_channel, config.acquisition.high_channel);
//! # Ok::<(), encoder_daq::error::DaqError>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AppResult, DaqError};
use crate::hardware::InterfaceType;
use crate::logging::OutputFormat;
use crate::unwrap::{ReferenceMode, DEFAULT_TOLERANCE_RATIO};

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/encoder_daq.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "ENCODER_DAQ_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Device selection and connection
    pub device: DeviceConfig,
    /// Polling loop settings
    pub acquisition: AcquisitionConfig,
    /// Angle unwrapping settings
    pub unwrap: UnwrapConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: OutputFormat,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "encoder-daq".to_string(),
            log_level: "warn".to_string(),
            log_format: OutputFormat::Compact,
        }
    }
}

/// Device driver backing the inventory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    /// Simulated rotary-encoder DAQ
    #[default]
    Mock,
}

/// Device selection and connection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Driver providing the device inventory
    pub driver: DriverKind,
    /// Interface filter for discovery
    pub interface: InterfaceType,
    /// Index into the discovered device list
    pub descriptor_index: usize,
    /// Connection code for network devices (0 = default)
    pub connection_code: u32,
    /// Seed for simulated noise; unset seeds from the OS
    pub seed: Option<u64>,
}

/// Polling loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// First channel read during priming
    pub low_channel: u32,
    /// Last channel read; clamped to what the device supports
    pub high_channel: u32,
    /// Index into the device's range list; clamped to what it supports
    pub range_index: usize,
    /// Sleep between iterations in milliseconds
    pub poll_interval_ms: u64,
    /// Stop after this many iterations (unset = until interrupted)
    pub max_iterations: Option<u64>,
    /// Clear the terminal before the first frame
    pub clear_screen: bool,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            low_channel: 0,
            high_channel: 7,
            range_index: 0,
            poll_interval_ms: 1,
            max_iterations: None,
            clear_screen: true,
        }
    }
}

impl AcquisitionConfig {
    /// Sleep between iterations
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Angle unwrapping settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnwrapConfig {
    /// Fraction of full scale treated as a wrap-around
    pub tolerance_ratio: f64,
    /// Source of the full-scale magnitude
    pub reference: ReferenceMode,
}

impl Default for UnwrapConfig {
    fn default() -> Self {
        Self {
            tolerance_ratio: DEFAULT_TOLERANCE_RATIO,
            reference: ReferenceMode::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file and environment variables
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config = Self::figment(path.as_ref()).extract()?;
        Ok(config)
    }

    /// Provider chain used by [`AppConfig::load_from`]
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Render the configuration as TOML, in the same layout the loader reads
    pub fn to_toml_string(&self) -> AppResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let ratio = self.unwrap.tolerance_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(DaqError::Configuration(format!(
                "Invalid tolerance_ratio {}. Must be in (0, 1]",
                ratio
            )));
        }

        if let ReferenceMode::Fixed { full_scale } = self.unwrap.reference {
            if !(full_scale.is_finite() && full_scale > 0.0) {
                return Err(DaqError::Configuration(format!(
                    "Invalid fixed full_scale {}. Must be a positive voltage",
                    full_scale
                )));
            }
        }

        let acq = &self.acquisition;
        if acq.low_channel > acq.high_channel {
            return Err(DaqError::Configuration(format!(
                "low_channel {} is above high_channel {}",
                acq.low_channel, acq.high_channel
            )));
        }

        if acq.max_iterations == Some(0) {
            return Err(DaqError::Configuration(
                "max_iterations must be at least 1 when set".to_string(),
            ));
        }

        Ok(())
    }
}
