//! Custom error types for the application.
//!
//! This module defines the primary error type, `DaqError`. Using the `thiserror`
//! crate, it gives the session, acquisition and configuration layers one
//! consistent way to report what went wrong.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from `figment`, typically file parsing or type
//!   mismatches in the configuration sources.
//! - **`Configuration`**: Semantic errors in a configuration that parsed fine
//!   but is logically invalid (e.g. `low_channel > high_channel`).
//! - **Inventory / session errors** (`NoDevices`, `InvalidDescriptorIndex`,
//!   `AnalogInputUnsupported`, `NoChannels`, `NoRanges`): the coarse-grained
//!   failures that abort a run before the polling loop starts.
//! - **`ConfigSerialize`**: Rendering the effective configuration back to TOML.
//! - **`Io`**: Failures writing the console display.
//! - **`Device`**: Anything raised by a device driver while talking to hardware.
//! - **`ChannelNotPrimed`**: An unwrap update for a channel that never received
//!   its first sample.
//!
//! Device capability traits return `anyhow::Result`; `DaqError::Device` is how
//! those failures enter the typed hierarchy.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

#[derive(Error, Debug)]
pub enum DaqError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No DAQ devices found")]
    NoDevices,

    #[error("Invalid descriptor index {index}: {available} device(s) available")]
    InvalidDescriptorIndex { index: usize, available: usize },

    #[error("The DAQ device does not support analog input")]
    AnalogInputUnsupported,

    #[error("The DAQ device reports no analog input channels in {0} mode")]
    NoChannels(String),

    #[error("The DAQ device reports no analog input ranges in {0} mode")]
    NoRanges(String),

    #[error("Device error: {0}")]
    Device(#[from] anyhow::Error),

    #[error("Channel {0} has not been primed with a first sample")]
    ChannelNotPrimed(u32),
}

impl From<figment::Error> for DaqError {
    fn from(value: figment::Error) -> Self {
        DaqError::Config(Box::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_messages() {
        assert_eq!(DaqError::NoDevices.to_string(), "No DAQ devices found");
        assert_eq!(
            DaqError::InvalidDescriptorIndex {
                index: 3,
                available: 1
            }
            .to_string(),
            "Invalid descriptor index 3: 1 device(s) available"
        );
        assert_eq!(
            DaqError::AnalogInputUnsupported.to_string(),
            "The DAQ device does not support analog input"
        );
    }

    #[test]
    fn test_device_error_from_anyhow() {
        let err: DaqError = anyhow::anyhow!("bus timeout").into();
        assert!(matches!(err, DaqError::Device(_)));
        assert_eq!(err.to_string(), "Device error: bus timeout");
    }
}
