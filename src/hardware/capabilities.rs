//! Hardware Capabilities
//!
//! This module defines the capability traits a DAQ driver implements. The
//! acquisition core only ever consumes [`AnalogInput::read_voltage`]; the other
//! traits cover the lifecycle glue around it (discovery, connect, release).
//!
//! # Design Philosophy
//!
//! Each capability trait:
//! - Is async (uses #[async_trait])
//! - Is thread-safe (requires Send + Sync)
//! - Uses anyhow::Result for errors
//! - Focuses on ONE thing
//!
//! # Example
//!
//! ```rust,ignore
//! async fn first_voltage(device: &dyn DaqDevice) -> Result<f64> {
//!     let ai = device.ai_device().context("no analog input")?;
//!     ai.read_voltage(0, AiInputMode::SingleEnded, Range::Bip10Volts, AInFlags::DEFAULT)
//!         .await
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::hardware::types::{
    AInFlags, AiInfo, AiInputMode, DeviceDescriptor, InterfaceType, Range,
};

/// Capability: Single-point Analog Input
///
/// Devices with an A/D subsystem that can sample one channel on demand.
///
/// # Contract
/// - `read_voltage` blocks (awaits) until the hardware returns a sample
/// - The returned value is in volts unless `AInFlags::NO_SCALE_DATA` is set
/// - Reading from a disconnected device must return Err
#[async_trait]
pub trait AnalogInput: Send + Sync {
    /// Query channel counts and supported ranges.
    async fn info(&self) -> Result<AiInfo>;

    /// Read instantaneous voltage for a channel
    ///
    /// # Arguments
    /// * `channel` - A/D channel number
    /// * `input_mode` - Single-ended or differential measurement
    /// * `range` - Configured voltage span
    /// * `flags` - Scaling/calibration options
    async fn read_voltage(
        &self,
        channel: u32,
        input_mode: AiInputMode,
        range: Range,
        flags: AInFlags,
    ) -> Result<f64>;
}

/// Capability: Connection Lifecycle
///
/// A handle to one physical device. Created by a [`DeviceInventory`], it must
/// be connected before use and released exactly once when done.
#[async_trait]
pub trait DaqDevice: Send + Sync {
    /// Descriptor this handle was opened from
    fn descriptor(&self) -> &DeviceDescriptor;

    /// Establish a connection
    ///
    /// `connection_code` is only meaningful for network devices; use 0 otherwise.
    async fn connect(&self, connection_code: u32) -> Result<()>;

    /// Drop the connection. The handle stays valid until released.
    async fn disconnect(&self) -> Result<()>;

    /// Release the handle and every resource behind it.
    async fn release(&self) -> Result<()>;

    /// Whether a connection is currently established
    async fn is_connected(&self) -> Result<bool>;

    /// Analog input subsystem, if the device has one
    fn ai_device(&self) -> Option<Arc<dyn AnalogInput>>;
}

/// Capability: Device Discovery
#[async_trait]
pub trait DeviceInventory: Send + Sync {
    /// List the devices visible on `interface`.
    async fn enumerate_devices(&self, interface: InterfaceType) -> Result<Vec<DeviceDescriptor>>;

    /// Create a device handle from a descriptor returned by `enumerate_devices`.
    async fn open(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn DaqDevice>>;
}
