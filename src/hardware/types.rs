//! Value types exchanged with DAQ device drivers.
//!
//! These mirror the vocabulary of vendor DAQ libraries closely enough that a
//! real binding can map onto them one-to-one: interface types for discovery,
//! input modes and voltage ranges for analog input, and per-read flags.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bus a device is attached through. Used to filter discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    /// Match every interface
    #[default]
    Any,
    /// USB attached devices
    Usb,
    /// Bluetooth attached devices
    Bluetooth,
    /// Network attached devices
    Ethernet,
}

impl InterfaceType {
    /// Whether a device on `other` is visible when discovering with `self`.
    pub fn matches(self, other: InterfaceType) -> bool {
        self == InterfaceType::Any || self == other
    }
}

/// Analog measurement configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiInputMode {
    /// Each channel measured against ground
    #[default]
    SingleEnded,
    /// Each channel measured as the difference of an input pair
    Differential,
}

impl AiInputMode {
    /// Upper-case name as vendor tools print it.
    pub fn name(self) -> &'static str {
        match self {
            AiInputMode::SingleEnded => "SINGLE_ENDED",
            AiInputMode::Differential => "DIFFERENTIAL",
        }
    }
}

impl fmt::Display for AiInputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Voltage span the ADC is configured to measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Range {
    /// -10 V to +10 V
    Bip10Volts,
    /// -5 V to +5 V
    Bip5Volts,
    /// -2 V to +2 V
    Bip2Volts,
    /// -1 V to +1 V
    Bip1Volts,
    /// 0 V to +10 V
    Uni10Volts,
    /// 0 V to +5 V
    Uni5Volts,
    /// 0 V to +2 V
    Uni2Volts,
    /// 0 V to +1 V
    Uni1Volts,
}

impl Range {
    /// Minimum voltage
    pub fn min(self) -> f64 {
        if self.is_bipolar() {
            -self.max()
        } else {
            0.0
        }
    }

    /// Maximum voltage
    pub fn max(self) -> f64 {
        match self {
            Range::Bip10Volts | Range::Uni10Volts => 10.0,
            Range::Bip5Volts | Range::Uni5Volts => 5.0,
            Range::Bip2Volts | Range::Uni2Volts => 2.0,
            Range::Bip1Volts | Range::Uni1Volts => 1.0,
        }
    }

    /// Get the span (max - min) of this range.
    pub fn span(self) -> f64 {
        self.max() - self.min()
    }

    /// Check if this is a bipolar range (includes negative values).
    pub fn is_bipolar(self) -> bool {
        matches!(
            self,
            Range::Bip10Volts | Range::Bip5Volts | Range::Bip2Volts | Range::Bip1Volts
        )
    }

    /// Clamp a voltage into this range, as a saturating ADC would.
    pub fn clamp(self, volts: f64) -> f64 {
        volts.clamp(self.min(), self.max())
    }

    /// Upper-case name as vendor tools print it.
    pub fn name(self) -> &'static str {
        match self {
            Range::Bip10Volts => "BIP10VOLTS",
            Range::Bip5Volts => "BIP5VOLTS",
            Range::Bip2Volts => "BIP2VOLTS",
            Range::Bip1Volts => "BIP1VOLTS",
            Range::Uni10Volts => "UNI10VOLTS",
            Range::Uni5Volts => "UNI5VOLTS",
            Range::Uni2Volts => "UNI2VOLTS",
            Range::Uni1Volts => "UNI1VOLTS",
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Per-read options for single-point analog input.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AInFlags: u32 {
        /// Scaled, calibrated data
        const DEFAULT = 0;
        /// Return raw ADC counts instead of volts
        const NO_SCALE_DATA = 1 << 0;
        /// Skip the device calibration factors
        const NO_CALIBRATE_DATA = 1 << 1;
    }
}

/// Identity of a discovered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Product name, e.g. "USB-1208FS-Plus"
    pub product_name: String,
    /// Serial number or MAC address
    pub unique_id: String,
    /// Human-readable device string used in status lines
    pub dev_string: String,
    /// Bus the device is attached through
    pub interface: InterfaceType,
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.product_name, self.unique_id)
    }
}

/// Analog input capabilities reported by a device.
#[derive(Debug, Clone, PartialEq)]
pub struct AiInfo {
    /// Channel count in single-ended mode
    pub single_ended_channels: u32,
    /// Channel count in differential mode
    pub differential_channels: u32,
    /// Ranges supported in single-ended mode
    pub single_ended_ranges: Vec<Range>,
    /// Ranges supported in differential mode
    pub differential_ranges: Vec<Range>,
}

impl AiInfo {
    /// Number of channels available in `mode`.
    pub fn num_chans_by_mode(&self, mode: AiInputMode) -> u32 {
        match mode {
            AiInputMode::SingleEnded => self.single_ended_channels,
            AiInputMode::Differential => self.differential_channels,
        }
    }

    /// Ranges supported in `mode`, in device order.
    pub fn ranges(&self, mode: AiInputMode) -> &[Range] {
        match mode {
            AiInputMode::SingleEnded => &self.single_ended_ranges,
            AiInputMode::Differential => &self.differential_ranges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_bounds() {
        assert_eq!(Range::Bip10Volts.min(), -10.0);
        assert_eq!(Range::Bip10Volts.span(), 20.0);
        assert_eq!(Range::Uni5Volts.min(), 0.0);
        assert_eq!(Range::Uni5Volts.span(), 5.0);
        assert!(!Range::Uni5Volts.is_bipolar());
        assert_eq!(Range::Uni5Volts.clamp(5.3), 5.0);
        assert_eq!(Range::Bip1Volts.clamp(-3.0), -1.0);
    }

    #[test]
    fn test_names() {
        assert_eq!(Range::Bip10Volts.to_string(), "BIP10VOLTS");
        assert_eq!(AiInputMode::Differential.to_string(), "DIFFERENTIAL");
    }

    #[test]
    fn test_interface_matching() {
        assert!(InterfaceType::Any.matches(InterfaceType::Usb));
        assert!(InterfaceType::Usb.matches(InterfaceType::Usb));
        assert!(!InterfaceType::Ethernet.matches(InterfaceType::Usb));
    }

    #[test]
    fn test_ai_info_by_mode() {
        let info = AiInfo {
            single_ended_channels: 8,
            differential_channels: 4,
            single_ended_ranges: vec![Range::Bip10Volts],
            differential_ranges: vec![Range::Bip10Volts, Range::Bip5Volts],
        };
        assert_eq!(info.num_chans_by_mode(AiInputMode::SingleEnded), 8);
        assert_eq!(info.ranges(AiInputMode::Differential).len(), 2);
    }
}
