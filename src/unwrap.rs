//! Incremental angle unwrapping for analog rotary encoders.
//!
//! An absolute analog encoder outputs a voltage proportional to shaft angle,
//! spanning `0..full_scale` over one turn. When the shaft passes its zero
//! position the voltage jumps by roughly the full scale. Comparing consecutive
//! samples against a fraction of full scale (the tolerance ratio) separates
//! those jumps from ordinary motion, so the accumulated voltage tracks total
//! displacement across any number of turns.
//!
//! This only holds while the shaft moves less than `tolerance_ratio` of a turn
//! between two samples; faster motion is indistinguishable from a wrap.
//!
//! # Example
//!
//! ```
//! use encoder_daq::unwrap::{Sample, UnwrapSession};
//!
//! let mut session = UnwrapSession::new(0.9);
//! session.prime(1, 4.8);
//! // 4.8 V -> 0.1 V is a forward crossing of the zero position
//! let angle = session.update(Sample { channel: 1, voltage: 0.1, data_vol_max: 5.0 })?;
//! assert!((angle - 0.3 / 5.0 * std::f64::consts::TAU).abs() < 1e-12);
//! # Ok::<(), encoder_daq::error::DaqError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::TAU;

use crate::error::{AppResult, DaqError};

/// Fraction of full scale above which a step is treated as a wrap-around.
pub const DEFAULT_TOLERANCE_RATIO: f64 = 0.9;

/// Voltage increment contributed by one step from `previous` to `new`.
///
/// A step larger than `data_vol_max * tolerance_ratio` in either direction is
/// taken as a crossing of the full-scale boundary and compensated by one full
/// scale. Comparisons are strict, so a step of exactly the tolerance is motion.
pub fn unwrap_delta(previous: f64, new: f64, data_vol_max: f64, tolerance_ratio: f64) -> f64 {
    let delta = new - previous;
    let tolerance = data_vol_max * tolerance_ratio;

    if delta > tolerance {
        delta - data_vol_max
    } else if delta < -tolerance {
        delta + data_vol_max
    } else {
        delta
    }
}

/// Convert an accumulated voltage to radians.
///
/// Returns a non-finite value when `data_vol_max` is zero.
pub fn voltage_to_radians(accumulated_voltage: f64, data_vol_max: f64) -> f64 {
    accumulated_voltage / data_vol_max * TAU
}

/// Running unwrap state of one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelState {
    previous_voltage: f64,
    accumulated_voltage: f64,
}

impl ChannelState {
    /// Start tracking from a first sample. The accumulator starts at zero.
    pub fn new(first_sample: f64) -> Self {
        Self {
            previous_voltage: first_sample,
            accumulated_voltage: 0.0,
        }
    }

    /// Feed one sample and return the unwrapped angle in radians.
    pub fn update(&mut self, voltage: f64, data_vol_max: f64, tolerance_ratio: f64) -> f64 {
        self.accumulated_voltage +=
            unwrap_delta(self.previous_voltage, voltage, data_vol_max, tolerance_ratio);
        self.previous_voltage = voltage;
        self.angle(data_vol_max)
    }

    /// Unwrapped angle in radians against a given full scale.
    pub fn angle(&self, data_vol_max: f64) -> f64 {
        voltage_to_radians(self.accumulated_voltage, data_vol_max)
    }

    /// Last raw voltage seen
    pub fn previous_voltage(&self) -> f64 {
        self.previous_voltage
    }

    /// Unwrapped voltage total since the first sample
    pub fn accumulated_voltage(&self) -> f64 {
        self.accumulated_voltage
    }
}

/// One reading to feed into an [`UnwrapSession`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Channel the voltage was read from
    pub channel: u32,
    /// Raw voltage
    pub voltage: f64,
    /// Full-scale magnitude used for tolerance and scaling this iteration
    pub data_vol_max: f64,
}

/// Where the full-scale magnitude comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReferenceMode {
    /// Read a reference channel every iteration.
    ///
    /// Tolerance and scale for every channel then follow a live, possibly noisy
    /// reading of another channel.
    Resampled {
        /// Channel carrying the full-scale voltage
        channel: u32,
    },
    /// Use a calibration constant.
    Fixed {
        /// Full-scale voltage
        full_scale: f64,
    },
}

impl Default for ReferenceMode {
    fn default() -> Self {
        ReferenceMode::Resampled { channel: 0 }
    }
}

/// Unwrap state for a set of channels sharing one tolerance ratio.
#[derive(Debug, Clone)]
pub struct UnwrapSession {
    tolerance_ratio: f64,
    channels: BTreeMap<u32, ChannelState>,
}

impl UnwrapSession {
    /// Create an empty session.
    pub fn new(tolerance_ratio: f64) -> Self {
        Self {
            tolerance_ratio,
            channels: BTreeMap::new(),
        }
    }

    /// Tolerance ratio this session classifies wraps with
    pub fn tolerance_ratio(&self) -> f64 {
        self.tolerance_ratio
    }

    /// Absolute wrap threshold for a full-scale magnitude
    pub fn tolerance(&self, data_vol_max: f64) -> f64 {
        data_vol_max * self.tolerance_ratio
    }

    /// Create (or recreate) a channel's state from its first sample.
    pub fn prime(&mut self, channel: u32, first_sample: f64) {
        self.channels.insert(channel, ChannelState::new(first_sample));
    }

    /// Feed a sample and return the channel's unwrapped angle in radians.
    pub fn update(&mut self, sample: Sample) -> AppResult<f64> {
        let state = self
            .channels
            .get_mut(&sample.channel)
            .ok_or(DaqError::ChannelNotPrimed(sample.channel))?;
        Ok(state.update(sample.voltage, sample.data_vol_max, self.tolerance_ratio))
    }

    /// Current angle of a channel, if primed
    pub fn angle(&self, channel: u32, data_vol_max: f64) -> Option<f64> {
        self.channels.get(&channel).map(|s| s.angle(data_vol_max))
    }

    /// State of a channel, if primed
    pub fn channel(&self, channel: u32) -> Option<&ChannelState> {
        self.channels.get(&channel)
    }

    /// Primed channels in ascending order
    pub fn channels(&self) -> impl Iterator<Item = u32> + '_ {
        self.channels.keys().copied()
    }
}

impl Default for UnwrapSession {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE_RATIO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_no_motion() {
        assert_eq!(unwrap_delta(1.0, 1.0, 5.0, 0.9), 0.0);
    }

    #[test]
    fn test_forward_crossing() {
        // delta -4.7 < -4.5
        assert_abs_diff_eq!(unwrap_delta(4.8, 0.1, 5.0, 0.9), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_backward_crossing() {
        // delta 4.7 > 4.5
        assert_abs_diff_eq!(unwrap_delta(0.1, 4.8, 5.0, 0.9), -0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_large_move_inside_tolerance() {
        // -8.5 is not below -9.0
        assert_abs_diff_eq!(unwrap_delta(9.0, 0.5, 10.0, 0.9), -8.5, epsilon = 1e-12);
    }

    #[test]
    fn test_exact_tolerance_is_motion() {
        assert_eq!(unwrap_delta(0.0, 4.0, 5.0, 0.8), 4.0);
        assert_eq!(unwrap_delta(4.0, 0.0, 5.0, 0.8), -4.0);
    }

    #[test]
    fn test_channel_state_accumulates() {
        let mut state = ChannelState::new(4.0);
        state.update(4.9, 5.0, 0.9);
        state.update(0.2, 5.0, 0.9); // wrap: -4.7 + 5.0
        assert_abs_diff_eq!(state.accumulated_voltage(), 1.2, epsilon = 1e-12);
        assert_eq!(state.previous_voltage(), 0.2);
        assert_abs_diff_eq!(state.angle(5.0), 1.2 / 5.0 * TAU, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_full_scale_is_not_finite() {
        let mut state = ChannelState::new(1.0);
        assert!(!state.update(1.5, 0.0, 0.9).is_finite());
    }

    #[test]
    fn test_session_requires_prime() {
        let mut session = UnwrapSession::default();
        let err = session
            .update(Sample {
                channel: 3,
                voltage: 1.0,
                data_vol_max: 5.0,
            })
            .unwrap_err();
        assert!(matches!(err, DaqError::ChannelNotPrimed(3)));
    }

    #[test]
    fn test_session_channels_are_independent() {
        let mut session = UnwrapSession::new(0.9);
        session.prime(1, 1.0);
        session.prime(2, 4.8);

        session
            .update(Sample {
                channel: 1,
                voltage: 2.0,
                data_vol_max: 5.0,
            })
            .unwrap();
        session
            .update(Sample {
                channel: 2,
                voltage: 0.1,
                data_vol_max: 5.0,
            })
            .unwrap();

        assert_abs_diff_eq!(session.angle(1, 5.0).unwrap(), 0.2 * TAU, epsilon = 1e-12);
        assert_abs_diff_eq!(session.angle(2, 5.0).unwrap(), 0.06 * TAU, epsilon = 1e-12);
        assert_eq!(session.channels().collect::<Vec<_>>(), vec![1, 2]);
        assert_abs_diff_eq!(session.tolerance(5.0), 4.5, epsilon = 1e-12);
    }

    #[test]
    fn test_reprime_resets_channel() {
        let mut session = UnwrapSession::default();
        session.prime(1, 1.0);
        session
            .update(Sample {
                channel: 1,
                voltage: 2.0,
                data_vol_max: 5.0,
            })
            .unwrap();
        session.prime(1, 3.0);
        assert_eq!(session.channel(1).unwrap().accumulated_voltage(), 0.0);
    }

    #[test]
    fn test_reference_mode_default() {
        assert_eq!(ReferenceMode::default(), ReferenceMode::Resampled { channel: 0 });
    }
}
