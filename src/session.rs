//! Device session management.
//!
//! A [`DeviceSession`] owns one opened, connected device together with the
//! acquisition settings resolved against what the device actually supports.
//! Whatever happens after a device handle has been opened, it is disconnected
//! (if connected) and released: either by [`DeviceSession::open`] when setup
//! fails, or by [`DeviceSession::shutdown`] at the end of a run.

use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::config::{AcquisitionConfig, DeviceConfig};
use crate::error::{AppResult, DaqError};
use crate::hardware::{
    AInFlags, AiInfo, AiInputMode, AnalogInput, DaqDevice, DeviceDescriptor, DeviceInventory,
    InterfaceType, Range,
};

/// Acquisition parameters after clamping to device capabilities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcquisitionSettings {
    /// Measurement mode
    pub input_mode: AiInputMode,
    /// First channel primed
    pub low_channel: u32,
    /// Last channel primed and polled
    pub high_channel: u32,
    /// Configured voltage span
    pub range: Range,
    /// Per-read flags
    pub flags: AInFlags,
}

impl AcquisitionSettings {
    /// Channels read once to seed their unwrap state
    pub fn primed_channels(&self) -> RangeInclusive<u32> {
        self.low_channel..=self.high_channel
    }

    /// Channels polled and displayed every iteration.
    ///
    /// The lowest channel is primed but never displayed: it is where the
    /// full-scale reference is wired.
    pub fn measurement_channels(&self) -> RangeInclusive<u32> {
        self.low_channel.saturating_add(1)..=self.high_channel
    }
}

/// Single-ended unless the device has no single-ended channels.
pub fn resolve_input_mode(info: &AiInfo) -> AiInputMode {
    if info.num_chans_by_mode(AiInputMode::SingleEnded) == 0 {
        AiInputMode::Differential
    } else {
        AiInputMode::SingleEnded
    }
}

/// Clamp the configured channel span and range index to what `info` offers.
pub fn resolve_settings(info: &AiInfo, config: &AcquisitionConfig) -> AppResult<AcquisitionSettings> {
    let input_mode = resolve_input_mode(info);

    let channels = info.num_chans_by_mode(input_mode);
    if channels == 0 {
        return Err(DaqError::NoChannels(input_mode.to_string()));
    }
    let high_channel = config.high_channel.min(channels - 1);
    if config.low_channel > high_channel {
        return Err(DaqError::Configuration(format!(
            "low_channel {} is beyond the device's {} {} channels",
            config.low_channel, channels, input_mode
        )));
    }

    let ranges = info.ranges(input_mode);
    let range = ranges
        .get(config.range_index.min(ranges.len().saturating_sub(1)))
        .copied()
        .ok_or_else(|| DaqError::NoRanges(input_mode.to_string()))?;

    Ok(AcquisitionSettings {
        input_mode,
        low_channel: config.low_channel,
        high_channel,
        range,
        flags: AInFlags::DEFAULT,
    })
}

/// Enumerate devices on `interface`, failing when there are none.
pub async fn discover(
    inventory: &dyn DeviceInventory,
    interface: InterfaceType,
) -> AppResult<Vec<DeviceDescriptor>> {
    let devices = inventory.enumerate_devices(interface).await?;
    if devices.is_empty() {
        return Err(DaqError::NoDevices);
    }
    tracing::debug!(count = devices.len(), ?interface, "discovered DAQ devices");
    Ok(devices)
}

/// Pick the descriptor at `index`.
pub fn select(devices: &[DeviceDescriptor], index: usize) -> AppResult<&DeviceDescriptor> {
    devices.get(index).ok_or(DaqError::InvalidDescriptorIndex {
        index,
        available: devices.len(),
    })
}

/// An opened, connected device ready for polling.
pub struct DeviceSession {
    device: Box<dyn DaqDevice>,
    ai: Arc<dyn AnalogInput>,
    settings: AcquisitionSettings,
}

impl DeviceSession {
    /// Open `descriptor`, connect, and resolve acquisition settings.
    ///
    /// On failure the device handle, if one was created, is released before the
    /// error is returned.
    pub async fn open(
        inventory: &dyn DeviceInventory,
        descriptor: &DeviceDescriptor,
        device_config: &DeviceConfig,
        acquisition: &AcquisitionConfig,
    ) -> AppResult<Self> {
        let device = inventory.open(descriptor).await?;

        match Self::configure(device.as_ref(), device_config, acquisition).await {
            Ok((ai, settings)) => {
                tracing::info!(
                    device = %descriptor,
                    mode = %settings.input_mode,
                    range = %settings.range,
                    low = settings.low_channel,
                    high = settings.high_channel,
                    "device ready"
                );
                Ok(Self {
                    device,
                    ai,
                    settings,
                })
            }
            Err(err) => {
                tracing::warn!(device = %descriptor, error = %err, "device setup failed");
                close_device(device.as_ref()).await;
                Err(err)
            }
        }
    }

    async fn configure(
        device: &dyn DaqDevice,
        device_config: &DeviceConfig,
        acquisition: &AcquisitionConfig,
    ) -> AppResult<(Arc<dyn AnalogInput>, AcquisitionSettings)> {
        let ai = device.ai_device().ok_or(DaqError::AnalogInputUnsupported)?;

        tracing::info!(device = %device.descriptor().dev_string, "connecting");
        device.connect(device_config.connection_code).await?;

        let info = ai.info().await?;
        let settings = resolve_settings(&info, acquisition)?;
        if settings.high_channel != acquisition.high_channel {
            tracing::info!(
                requested = acquisition.high_channel,
                clamped = settings.high_channel,
                "high channel clamped to device channel count"
            );
        }
        Ok((ai, settings))
    }

    /// Descriptor of the connected device
    pub fn descriptor(&self) -> &DeviceDescriptor {
        self.device.descriptor()
    }

    /// Analog input subsystem
    pub fn analog_input(&self) -> &dyn AnalogInput {
        self.ai.as_ref()
    }

    /// Resolved acquisition settings
    pub fn settings(&self) -> &AcquisitionSettings {
        &self.settings
    }

    /// Disconnect if connected, then release the device.
    ///
    /// Release is attempted even when disconnecting fails; the first error is
    /// returned.
    pub async fn shutdown(self) -> AppResult<()> {
        let disconnected = match self.device.is_connected().await {
            Ok(true) => self.device.disconnect().await,
            Ok(false) => Ok(()),
            Err(err) => Err(err),
        };
        let released = self.device.release().await;
        tracing::debug!(device = %self.device.descriptor(), "session closed");
        disconnected?;
        released?;
        Ok(())
    }
}

/// Best-effort cleanup on a setup error path.
async fn close_device(device: &dyn DaqDevice) {
    match device.is_connected().await {
        Ok(true) => {
            if let Err(err) = device.disconnect().await {
                tracing::warn!(error = %err, "disconnect failed during cleanup");
            }
        }
        Ok(false) => {}
        Err(err) => tracing::warn!(error = %err, "connection state unknown during cleanup"),
    }
    if let Err(err) = device.release().await {
        tracing::warn!(error = %err, "release failed during cleanup");
    }
}
