//! Mock Hardware Implementations
//!
//! Provides simulated DAQ devices for running the tool without physical hardware.
//!
//! # Available Mocks
//!
//! - `MockInventory` - Discovery over a fixed list of simulated devices
//! - `MockDaqDevice` - Connection lifecycle with shared, inspectable state
//! - `MockEncoderInput` - Rotary encoders wired to analog inputs
//! - `ReplayAnalogInput` - Replays fixed voltage sequences per channel
//!
//! # Signal Model
//!
//! Channel 0 carries the encoders' supply voltage, which is also their full-scale
//! output. Every other channel carries a sawtooth: the encoder's shaft angle
//! mapped onto `0..full_scale`, so the voltage drops (or jumps) by roughly the
//! full scale each time the shaft passes zero. Each read of an encoder channel
//! advances its shaft by a fixed step, which keeps runs reproducible.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, VecDeque};
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::hardware::capabilities::{AnalogInput, DaqDevice, DeviceInventory};
use crate::hardware::types::{
    AInFlags, AiInfo, AiInputMode, DeviceDescriptor, InterfaceType, Range,
};

/// Full-scale voltage of the simulated encoder supply
pub const DEFAULT_FULL_SCALE_VOLTS: f64 = 5.0;

/// Resolution used when `AInFlags::NO_SCALE_DATA` asks for raw counts
const ADC_BITS: u32 = 16;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// MockDeviceConfig - Simulated device description
// =============================================================================

/// Description of one simulated device
#[derive(Debug, Clone)]
pub struct MockDeviceConfig {
    /// Product name reported by discovery
    pub product_name: String,
    /// Serial number reported by discovery
    pub unique_id: String,
    /// Bus the device claims to be on
    pub interface: InterfaceType,
    /// Whether the device exposes an analog input subsystem
    pub analog_input: bool,
    /// Channel count in single-ended mode (0 forces differential)
    pub single_ended_channels: u32,
    /// Channel count in differential mode
    pub differential_channels: u32,
    /// Supported ranges, shared by both modes
    pub ranges: Vec<Range>,
    /// Supply / full-scale voltage on channel 0
    pub full_scale: f64,
    /// Peak amplitude of uniform noise added to every sample
    pub noise_volts: f64,
    /// Shaft advance per read for channels 1.., in radians
    pub encoder_steps: Vec<f64>,
}

impl Default for MockDeviceConfig {
    fn default() -> Self {
        Self {
            product_name: "Mock Encoder DAQ".to_string(),
            unique_id: "MOCK0001".to_string(),
            interface: InterfaceType::Usb,
            analog_input: true,
            single_ended_channels: 8,
            differential_channels: 4,
            ranges: vec![Range::Bip10Volts, Range::Bip5Volts, Range::Uni10Volts, Range::Uni5Volts],
            full_scale: DEFAULT_FULL_SCALE_VOLTS,
            noise_volts: 0.002,
            encoder_steps: vec![0.02, -0.035, 0.05, 0.0, 0.11, -0.08, 0.015],
        }
    }
}

impl MockDeviceConfig {
    fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor {
            product_name: self.product_name.clone(),
            unique_id: self.unique_id.clone(),
            dev_string: self.product_name.clone(),
            interface: self.interface,
        }
    }
}

/// Shared lifecycle state of a simulated device.
///
/// Kept outside the device handle so tests can observe what a session did
/// after it has dropped the handle.
#[derive(Debug, Default)]
pub struct MockDeviceState {
    connected: AtomicBool,
    released: AtomicBool,
    connects: AtomicU64,
    reads: AtomicU64,
}

impl MockDeviceState {
    /// Whether the device is currently connected
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Whether the handle has been released
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Number of successful `connect` calls
    pub fn connect_count(&self) -> u64 {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of successful voltage reads
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Drop the connection as if the cable had been pulled.
    pub fn simulate_unplug(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

// =============================================================================
// MockInventory - Simulated discovery
// =============================================================================

/// Discovery over a fixed list of simulated devices
///
/// # Example
///
/// ```rust,ignore
/// let inventory = MockInventory::new(Some(42));
/// let devices = inventory.enumerate_devices(InterfaceType::Any).await?;
/// let device = inventory.open(&devices[0]).await?;
/// ```
pub struct MockInventory {
    devices: Vec<(MockDeviceConfig, Arc<MockDeviceState>)>,
    seed: Option<u64>,
}

impl MockInventory {
    /// Inventory with one default device.
    ///
    /// `seed` makes the noise sequence reproducible; `None` seeds from the OS.
    pub fn new(seed: Option<u64>) -> Self {
        Self::empty(seed).with_device(MockDeviceConfig::default())
    }

    /// Inventory with no devices
    pub fn empty(seed: Option<u64>) -> Self {
        Self {
            devices: Vec::new(),
            seed,
        }
    }

    /// Add a simulated device
    pub fn with_device(mut self, config: MockDeviceConfig) -> Self {
        self.devices
            .push((config, Arc::new(MockDeviceState::default())));
        self
    }

    /// Lifecycle state of the device at `index`
    pub fn device_state(&self, index: usize) -> Option<Arc<MockDeviceState>> {
        self.devices.get(index).map(|(_, state)| state.clone())
    }
}

impl Default for MockInventory {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl DeviceInventory for MockInventory {
    async fn enumerate_devices(&self, interface: InterfaceType) -> Result<Vec<DeviceDescriptor>> {
        Ok(self
            .devices
            .iter()
            .filter(|(config, _)| interface.matches(config.interface))
            .map(|(config, _)| config.descriptor())
            .collect())
    }

    async fn open(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn DaqDevice>> {
        let (config, state) = self
            .devices
            .iter()
            .find(|(config, _)| config.unique_id == descriptor.unique_id)
            .ok_or_else(|| anyhow!("Device {} is no longer present", descriptor.unique_id))?;

        if state.is_released() {
            bail!("Device {} has already been released", descriptor.unique_id);
        }

        tracing::debug!(device = %descriptor, "opening mock device");
        Ok(Box::new(MockDaqDevice::new(config.clone(), state.clone(), self.seed)))
    }
}

// =============================================================================
// MockDaqDevice - Simulated connection lifecycle
// =============================================================================

/// Simulated device handle
pub struct MockDaqDevice {
    descriptor: DeviceDescriptor,
    state: Arc<MockDeviceState>,
    ai: Option<Arc<MockEncoderInput>>,
}

impl MockDaqDevice {
    fn new(config: MockDeviceConfig, state: Arc<MockDeviceState>, seed: Option<u64>) -> Self {
        let ai = config
            .analog_input
            .then(|| Arc::new(MockEncoderInput::new(&config, state.clone(), seed)));
        Self {
            descriptor: config.descriptor(),
            state,
            ai,
        }
    }
}

#[async_trait]
impl DaqDevice for MockDaqDevice {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    async fn connect(&self, connection_code: u32) -> Result<()> {
        if self.state.is_released() {
            bail!("Cannot connect: device handle has been released");
        }
        if connection_code != 0 && self.descriptor.interface != InterfaceType::Ethernet {
            bail!("Connection code {} is only valid for Ethernet devices", connection_code);
        }
        self.state.connected.store(true, Ordering::SeqCst);
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        tracing::info!(device = %self.descriptor, "mock device connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.state.connected.store(false, Ordering::SeqCst);
        tracing::info!(device = %self.descriptor, "mock device disconnected");
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.state.connected.store(false, Ordering::SeqCst);
        self.state.released.store(true, Ordering::SeqCst);
        tracing::debug!(device = %self.descriptor, "mock device released");
        Ok(())
    }

    async fn is_connected(&self) -> Result<bool> {
        Ok(self.state.is_connected())
    }

    fn ai_device(&self) -> Option<Arc<dyn AnalogInput>> {
        self.ai.clone().map(|ai| ai as Arc<dyn AnalogInput>)
    }
}

// =============================================================================
// MockEncoderInput - Simulated rotary encoders
// =============================================================================

/// Analog input subsystem with rotary encoders on channels 1..
pub struct MockEncoderInput {
    info: AiInfo,
    full_scale: f64,
    noise_volts: f64,
    steps: Vec<f64>,
    shafts: Mutex<Vec<f64>>,
    rng: Mutex<ChaCha8Rng>,
    state: Arc<MockDeviceState>,
}

impl MockEncoderInput {
    fn new(config: &MockDeviceConfig, state: Arc<MockDeviceState>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        let channels = config
            .single_ended_channels
            .max(config.differential_channels) as usize;
        Self {
            info: AiInfo {
                single_ended_channels: config.single_ended_channels,
                differential_channels: config.differential_channels,
                single_ended_ranges: config.ranges.clone(),
                differential_ranges: config.ranges.clone(),
            },
            full_scale: config.full_scale,
            noise_volts: config.noise_volts,
            steps: config.encoder_steps.clone(),
            shafts: Mutex::new(vec![0.0; channels]),
            rng: Mutex::new(rng),
            state,
        }
    }

    /// Current shaft angle of the encoder on `channel`, in `[0, 2π)`
    pub fn shaft_angle(&self, channel: u32) -> Option<f64> {
        lock(&self.shafts).get(channel as usize).copied()
    }

    fn noise(&self) -> f64 {
        if self.noise_volts <= 0.0 {
            return 0.0;
        }
        lock(&self.rng).gen_range(-self.noise_volts..=self.noise_volts)
    }

    fn step_for(&self, channel: u32) -> f64 {
        // channel 0 is the reference, so encoder i sits on channel i + 1
        (channel as usize)
            .checked_sub(1)
            .and_then(|i| self.steps.get(i))
            .copied()
            .unwrap_or(0.0)
    }

    fn sample(&self, channel: u32) -> f64 {
        if channel == 0 {
            return self.full_scale + self.noise();
        }

        let angle = {
            let mut shafts = lock(&self.shafts);
            let shaft = &mut shafts[channel as usize];
            let angle = *shaft;
            *shaft = (*shaft + self.step_for(channel)).rem_euclid(TAU);
            angle
        };
        angle / TAU * self.full_scale + self.noise()
    }
}

#[async_trait]
impl AnalogInput for MockEncoderInput {
    async fn info(&self) -> Result<AiInfo> {
        Ok(self.info.clone())
    }

    async fn read_voltage(
        &self,
        channel: u32,
        input_mode: AiInputMode,
        range: Range,
        flags: AInFlags,
    ) -> Result<f64> {
        if !self.state.is_connected() {
            bail!("Device not connected");
        }
        let channels = self.info.num_chans_by_mode(input_mode);
        if channel >= channels {
            bail!(
                "Invalid channel {}: {} mode has {} channels",
                channel,
                input_mode,
                channels
            );
        }
        if !self.info.ranges(input_mode).contains(&range) {
            bail!("Range {} is not supported in {} mode", range, input_mode);
        }

        let volts = range.clamp(self.sample(channel));
        self.state.reads.fetch_add(1, Ordering::SeqCst);

        if flags.contains(AInFlags::NO_SCALE_DATA) {
            let full_counts = f64::from((1u32 << ADC_BITS) - 1);
            return Ok(((volts - range.min()) / range.span() * full_counts).round());
        }
        Ok(volts)
    }
}

// =============================================================================
// ReplayAnalogInput - Fixed voltage sequences
// =============================================================================

/// Analog input that replays recorded voltages, one queue per channel
///
/// Each read pops the next value for its channel. Reading past the end of a
/// channel's sequence is an error, which makes over-reads visible in tests.
///
/// # Example
///
/// ```rust,ignore
/// let ai = ReplayAnalogInput::new()
///     .with_channel(0, [5.0, 5.0])
///     .with_channel(1, [4.8, 0.1]);
/// ```
#[derive(Debug, Default)]
pub struct ReplayAnalogInput {
    queues: Mutex<HashMap<u32, VecDeque<f64>>>,
}

impl ReplayAnalogInput {
    /// Create an input with no recorded channels
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the voltage sequence for `channel`
    pub fn with_channel(self, channel: u32, voltages: impl IntoIterator<Item = f64>) -> Self {
        lock(&self.queues)
            .entry(channel)
            .or_default()
            .extend(voltages);
        self
    }

    /// Samples left for `channel`
    pub fn remaining(&self, channel: u32) -> usize {
        lock(&self.queues).get(&channel).map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl AnalogInput for ReplayAnalogInput {
    async fn info(&self) -> Result<AiInfo> {
        let channels = lock(&self.queues)
            .keys()
            .max()
            .map_or(0, |highest| highest + 1);
        Ok(AiInfo {
            single_ended_channels: channels,
            differential_channels: 0,
            single_ended_ranges: vec![Range::Bip10Volts],
            differential_ranges: Vec::new(),
        })
    }

    async fn read_voltage(
        &self,
        channel: u32,
        _input_mode: AiInputMode,
        _range: Range,
        _flags: AInFlags,
    ) -> Result<f64> {
        lock(&self.queues)
            .get_mut(&channel)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| anyhow!("Replay exhausted for channel {}", channel))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_device() -> MockDeviceConfig {
        MockDeviceConfig {
            noise_volts: 0.0,
            ..Default::default()
        }
    }

    async fn connected(inventory: &MockInventory) -> Box<dyn DaqDevice> {
        let devices = inventory.enumerate_devices(InterfaceType::Any).await.unwrap();
        let device = inventory.open(&devices[0]).await.unwrap();
        device.connect(0).await.unwrap();
        device
    }

    #[tokio::test]
    async fn test_enumerate_filters_by_interface() {
        let inventory = MockInventory::new(Some(1)).with_device(MockDeviceConfig {
            unique_id: "NET0001".into(),
            interface: InterfaceType::Ethernet,
            ..Default::default()
        });

        assert_eq!(inventory.enumerate_devices(InterfaceType::Any).await.unwrap().len(), 2);
        let usb = inventory.enumerate_devices(InterfaceType::Usb).await.unwrap();
        assert_eq!(usb.len(), 1);
        assert_eq!(usb[0].unique_id, "MOCK0001");
    }

    #[tokio::test]
    async fn test_read_requires_connection() {
        let inventory = MockInventory::empty(Some(1)).with_device(quiet_device());
        let devices = inventory.enumerate_devices(InterfaceType::Any).await.unwrap();
        let device = inventory.open(&devices[0]).await.unwrap();
        let ai = device.ai_device().unwrap();

        let result = ai
            .read_voltage(0, AiInputMode::SingleEnded, Range::Bip10Volts, AInFlags::DEFAULT)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_reference_channel_reads_full_scale() {
        let inventory = MockInventory::empty(Some(1)).with_device(quiet_device());
        let device = connected(&inventory).await;
        let ai = device.ai_device().unwrap();

        let volts = ai
            .read_voltage(0, AiInputMode::SingleEnded, Range::Bip10Volts, AInFlags::DEFAULT)
            .await
            .unwrap();
        assert_eq!(volts, DEFAULT_FULL_SCALE_VOLTS);
    }

    #[tokio::test]
    async fn test_encoder_channel_wraps() {
        let inventory = MockInventory::empty(Some(1)).with_device(MockDeviceConfig {
            noise_volts: 0.0,
            encoder_steps: vec![TAU / 4.0],
            ..Default::default()
        });
        let device = connected(&inventory).await;
        let ai = device.ai_device().unwrap();

        let mut readings = Vec::new();
        for _ in 0..5 {
            readings.push(
                ai.read_voltage(1, AiInputMode::SingleEnded, Range::Bip10Volts, AInFlags::DEFAULT)
                    .await
                    .unwrap(),
            );
        }

        assert_eq!(readings[0], 0.0);
        assert!((readings[1] - 1.25).abs() < 1e-9);
        assert!((readings[3] - 3.75).abs() < 1e-9);
        // a full turn brings the sawtooth back to zero (or a hair under full scale)
        let wrapped = readings[4].min(DEFAULT_FULL_SCALE_VOLTS - readings[4]);
        assert!(wrapped.abs() < 1e-9);
        assert_eq!(inventory.device_state(0).unwrap().read_count(), 5);
    }

    #[tokio::test]
    async fn test_unsupported_range_rejected() {
        let inventory = MockInventory::empty(Some(1)).with_device(MockDeviceConfig {
            ranges: vec![Range::Uni5Volts],
            ..quiet_device()
        });
        let device = connected(&inventory).await;
        let ai = device.ai_device().unwrap();

        assert!(ai
            .read_voltage(1, AiInputMode::SingleEnded, Range::Bip10Volts, AInFlags::DEFAULT)
            .await
            .is_err());
        assert!(ai
            .read_voltage(99, AiInputMode::SingleEnded, Range::Uni5Volts, AInFlags::DEFAULT)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_raw_counts() {
        let inventory = MockInventory::empty(Some(1)).with_device(quiet_device());
        let device = connected(&inventory).await;
        let ai = device.ai_device().unwrap();

        let counts = ai
            .read_voltage(0, AiInputMode::SingleEnded, Range::Uni10Volts, AInFlags::NO_SCALE_DATA)
            .await
            .unwrap();
        assert_eq!(counts, (65535.0_f64 * 0.5).round());
    }

    #[tokio::test]
    async fn test_release_blocks_reconnect() {
        let inventory = MockInventory::empty(Some(1)).with_device(quiet_device());
        let device = connected(&inventory).await;
        device.disconnect().await.unwrap();
        device.release().await.unwrap();

        let state = inventory.device_state(0).unwrap();
        assert!(state.is_released());
        assert!(device.connect(0).await.is_err());
    }

    async fn read(ai: &ReplayAnalogInput, channel: u32) -> Result<f64> {
        ai.read_voltage(channel, AiInputMode::SingleEnded, Range::Bip10Volts, AInFlags::DEFAULT)
            .await
    }

    #[tokio::test]
    async fn test_replay_exhaustion() {
        let ai = ReplayAnalogInput::new().with_channel(2, [1.0, 2.0]);

        assert_eq!(read(&ai, 2).await.unwrap(), 1.0);
        assert_eq!(ai.remaining(2), 1);
        assert_eq!(read(&ai, 2).await.unwrap(), 2.0);
        assert!(read(&ai, 2).await.is_err());
        assert!(read(&ai, 0).await.is_err());
        assert_eq!(ai.info().await.unwrap().single_ended_channels, 3);
    }
}
