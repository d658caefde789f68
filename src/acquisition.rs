//! The polling loop.
//!
//! Each iteration reads the full-scale reference, then every measurement
//! channel in turn, feeding each voltage through the channel's unwrap state
//! before the next read is issued. Reads are awaited one at a time; nothing
//! runs concurrently with the loop except the shutdown future it races against.
//!
//! The loop ends when:
//! - the shutdown future resolves (Ctrl+C in the binary),
//! - an angle comes out non-finite (e.g. a zero reference reading), which is
//!   treated as a normal stop rather than an error,
//! - the configured iteration limit is reached.
//!
//! Device read errors abort the loop and are returned to the caller.

use std::future::Future;
use std::io;
use std::time::Duration;

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::hardware::AnalogInput;
use crate::session::AcquisitionSettings;
use crate::unwrap::{ReferenceMode, Sample, UnwrapSession};

/// One channel's result for one iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelReading {
    /// Channel number
    pub channel: u32,
    /// Raw voltage read this iteration
    pub voltage: f64,
    /// Full-scale magnitude used this iteration
    pub data_vol_max: f64,
    /// Unwrapped angle in radians
    pub angle_rad: f64,
}

/// Receives readings as the loop produces them.
///
/// A frame is one iteration: `begin_frame`, then one `reading` per measurement
/// channel, then `end_frame`. A frame cut short by a numeric fault or shutdown
/// never gets its `end_frame`.
pub trait ReadingSink {
    /// Start of an iteration
    fn begin_frame(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// One channel's reading
    fn reading(&mut self, reading: &ChannelReading) -> io::Result<()>;

    /// End of an iteration
    fn end_frame(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ReadingSink for Vec<ChannelReading> {
    fn reading(&mut self, reading: &ChannelReading) -> io::Result<()> {
        self.push(*reading);
        Ok(())
    }
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopReason {
    /// The shutdown future resolved
    Cancelled,
    /// A channel produced a non-finite angle
    NumericFault {
        /// Offending channel
        channel: u32,
        /// Full-scale magnitude in effect
        data_vol_max: f64,
    },
    /// The configured number of iterations completed
    IterationLimit,
}

/// Outcome of [`AcquisitionLoop::run`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSummary {
    /// Iterations completed in full
    pub iterations: u64,
    /// Why the loop stopped
    pub stop_reason: StopReason,
}

/// Polls an analog input and unwraps encoder angles.
pub struct AcquisitionLoop<'a> {
    ai: &'a dyn AnalogInput,
    settings: AcquisitionSettings,
    reference: ReferenceMode,
    unwrap: UnwrapSession,
    poll_interval: Duration,
    max_iterations: Option<u64>,
    iterations: u64,
}

impl<'a> AcquisitionLoop<'a> {
    /// Create a loop over `ai` with resolved `settings`.
    pub fn new(ai: &'a dyn AnalogInput, settings: AcquisitionSettings, config: &AppConfig) -> Self {
        Self {
            ai,
            settings,
            reference: config.unwrap.reference,
            unwrap: UnwrapSession::new(config.unwrap.tolerance_ratio),
            poll_interval: config.acquisition.poll_interval(),
            max_iterations: config.acquisition.max_iterations,
            iterations: 0,
        }
    }

    /// Unwrap state accumulated so far
    pub fn unwrap_session(&self) -> &UnwrapSession {
        &self.unwrap
    }

    /// Iterations completed in full
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    async fn read(&self, channel: u32) -> AppResult<f64> {
        let volts = self
            .ai
            .read_voltage(
                channel,
                self.settings.input_mode,
                self.settings.range,
                self.settings.flags,
            )
            .await?;
        tracing::trace!(channel, volts, "sample");
        Ok(volts)
    }

    /// Seed every channel's state from one read.
    pub async fn prime(&mut self) -> AppResult<()> {
        for channel in self.settings.primed_channels() {
            let first = self.read(channel).await?;
            self.unwrap.prime(channel, first);
        }
        tracing::debug!(
            channels = ?self.settings.primed_channels(),
            "channel state primed"
        );
        Ok(())
    }

    /// Full-scale magnitude for this iteration
    async fn reference(&self) -> AppResult<f64> {
        match self.reference {
            ReferenceMode::Resampled { channel } => self.read(channel).await,
            ReferenceMode::Fixed { full_scale } => Ok(full_scale),
        }
    }

    /// Run one iteration.
    ///
    /// Returns `Some(StopReason::NumericFault { .. })` when a channel's angle is
    /// not finite; the loop should stop without treating it as an error.
    pub async fn step(&mut self, sink: &mut dyn ReadingSink) -> AppResult<Option<StopReason>> {
        let data_vol_max = self.reference().await?;
        sink.begin_frame()?;

        for channel in self.settings.measurement_channels() {
            let voltage = self.read(channel).await?;
            let angle_rad = self.unwrap.update(Sample {
                channel,
                voltage,
                data_vol_max,
            })?;

            if !angle_rad.is_finite() {
                return Ok(Some(StopReason::NumericFault {
                    channel,
                    data_vol_max,
                }));
            }

            sink.reading(&ChannelReading {
                channel,
                voltage,
                data_vol_max,
                angle_rad,
            })?;
        }

        sink.end_frame()?;
        self.iterations += 1;
        Ok(None)
    }

    /// Prime, then iterate until `shutdown` resolves, a numeric fault, or the
    /// iteration limit.
    pub async fn run<F>(mut self, sink: &mut dyn ReadingSink, shutdown: F) -> AppResult<LoopSummary>
    where
        F: Future<Output = ()>,
    {
        if let ReferenceMode::Resampled { channel } = self.reference {
            tracing::info!(
                channel,
                "full-scale reference is re-read every iteration; noise on it scales every channel"
            );
        }

        tokio::pin!(shutdown);

        let primed = tokio::select! {
            biased;
            _ = &mut shutdown => false,
            result = self.prime() => { result?; true }
        };
        if !primed {
            return Ok(self.summary(StopReason::Cancelled));
        }

        loop {
            if self.max_iterations.is_some_and(|max| self.iterations >= max) {
                return Ok(self.summary(StopReason::IterationLimit));
            }

            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => Some(StopReason::Cancelled),
                result = self.step(sink) => result?,
            };

            if let Some(reason) = outcome {
                if let StopReason::NumericFault {
                    channel,
                    data_vol_max,
                } = reason
                {
                    tracing::warn!(channel, data_vol_max, "non-finite angle, stopping acquisition");
                }
                return Ok(self.summary(reason));
            }

            if !self.poll_interval.is_zero() {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => return Ok(self.summary(StopReason::Cancelled)),
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }
    }

    fn summary(&self, stop_reason: StopReason) -> LoopSummary {
        LoopSummary {
            iterations: self.iterations,
            stop_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::ReplayAnalogInput;
    use crate::hardware::{AInFlags, AiInputMode, Range};
    use approx::assert_abs_diff_eq;
    use std::f64::consts::TAU;

    fn settings(high_channel: u32) -> AcquisitionSettings {
        AcquisitionSettings {
            input_mode: AiInputMode::SingleEnded,
            low_channel: 0,
            high_channel,
            range: Range::Bip10Volts,
            flags: AInFlags::DEFAULT,
        }
    }

    fn config(max_iterations: Option<u64>) -> AppConfig {
        let mut config = AppConfig::default();
        config.acquisition.poll_interval_ms = 0;
        config.acquisition.max_iterations = max_iterations;
        config
    }

    #[tokio::test]
    async fn test_reference_read_each_iteration() {
        // priming reads channels 0 and 1, then each iteration reads 0 then 1
        let ai = ReplayAnalogInput::new()
            .with_channel(0, [5.0, 5.0, 5.0])
            .with_channel(1, [4.8, 0.1, 0.6]);
        let mut readings = Vec::new();

        let summary = AcquisitionLoop::new(&ai, settings(1), &config(Some(2)))
            .run(&mut readings, std::future::pending())
            .await
            .unwrap();

        assert_eq!(summary.iterations, 2);
        assert_eq!(summary.stop_reason, StopReason::IterationLimit);
        assert_eq!(readings.len(), 2);
        assert_abs_diff_eq!(readings[0].angle_rad, 0.3 / 5.0 * TAU, epsilon = 1e-9);
        assert_abs_diff_eq!(readings[1].angle_rad, 0.8 / 5.0 * TAU, epsilon = 1e-9);
        assert_eq!(ai.remaining(0), 0);
        assert_eq!(ai.remaining(1), 0);
    }

    #[tokio::test]
    async fn test_zero_reference_stops_loop() {
        let ai = ReplayAnalogInput::new()
            .with_channel(0, [5.0, 5.0, 0.0])
            .with_channel(1, [1.0, 1.5, 2.0]);
        let mut readings = Vec::new();

        let summary = AcquisitionLoop::new(&ai, settings(1), &config(None))
            .run(&mut readings, std::future::pending())
            .await
            .unwrap();

        assert_eq!(summary.iterations, 1);
        assert!(matches!(
            summary.stop_reason,
            StopReason::NumericFault { channel: 1, .. }
        ));
        assert_eq!(readings.len(), 1);
    }

    #[tokio::test]
    async fn test_read_error_propagates() {
        let ai = ReplayAnalogInput::new()
            .with_channel(0, [5.0, 5.0])
            .with_channel(1, [1.0]);
        let mut readings = Vec::new();

        let result = AcquisitionLoop::new(&ai, settings(1), &config(None))
            .run(&mut readings, std::future::pending())
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_before_first_iteration() {
        let ai = ReplayAnalogInput::new();
        let mut readings = Vec::new();

        let summary = AcquisitionLoop::new(&ai, settings(1), &config(None))
            .run(&mut readings, std::future::ready(()))
            .await
            .unwrap();

        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        assert_eq!(summary.iterations, 0);
    }

    #[tokio::test]
    async fn test_fixed_reference_skips_reference_reads() {
        let ai = ReplayAnalogInput::new()
            .with_channel(0, [2.5])
            .with_channel(1, [1.0, 2.0])
            .with_channel(2, [3.0, 3.0]);
        let mut cfg = config(Some(1));
        cfg.unwrap.reference = ReferenceMode::Fixed { full_scale: 4.0 };
        let mut readings = Vec::new();

        let summary = AcquisitionLoop::new(&ai, settings(2), &cfg)
            .run(&mut readings, std::future::pending())
            .await
            .unwrap();

        assert_eq!(summary.iterations, 1);
        assert_eq!(readings.iter().map(|r| r.channel).collect::<Vec<_>>(), vec![1, 2]);
        assert_abs_diff_eq!(readings[0].angle_rad, 0.25 * TAU, epsilon = 1e-12);
        assert_eq!(readings[1].angle_rad, 0.0);
        assert_eq!(readings[0].data_vol_max, 4.0);
    }
}
