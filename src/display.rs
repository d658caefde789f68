//! Console output.
//!
//! The live display repaints in place: every frame moves the cursor home and
//! overwrites the previous one, so the terminal shows one line per channel
//! rather than a scrolling log.

use std::io::{self, Write};

use crate::acquisition::{ChannelReading, ReadingSink};
use crate::hardware::DeviceDescriptor;
use crate::session::AcquisitionSettings;

const CURSOR_HOME: &str = "\x1b[1;1H";
const CLEAR_SCREEN: &str = "\x1b[2J";
const CLEAR_TO_EOL: &str = "\x1b[K";

/// `Channel(<n>) Data: <radians to 6 decimal places>`
pub fn format_reading(reading: &ChannelReading) -> String {
    format!("Channel({}) Data: {:.6}", reading.channel, reading.angle_rad)
}

/// Print the discovered devices, one per line with their index.
pub fn write_device_list<W: Write>(out: &mut W, devices: &[DeviceDescriptor]) -> io::Result<()> {
    writeln!(out, "Found {} DAQ device(s):", devices.len())?;
    for (index, device) in devices.iter().enumerate() {
        writeln!(out, "  [{}] {} ({})", index, device.product_name, device.unique_id)?;
    }
    Ok(())
}

/// Print what is about to be acquired.
pub fn write_ready_summary<W: Write>(
    out: &mut W,
    descriptor: &DeviceDescriptor,
    settings: &AcquisitionSettings,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{} ready", descriptor.dev_string)?;
    writeln!(
        out,
        "    Channels: {} - {}",
        settings.low_channel, settings.high_channel
    )?;
    writeln!(out, "    Input mode: {}", settings.input_mode)?;
    writeln!(out, "    Range: {}", settings.range)?;
    Ok(())
}

/// Live angle display for a terminal.
pub struct ConsoleDisplay<W: Write> {
    out: W,
    active_device: String,
}

impl<W: Write> ConsoleDisplay<W> {
    /// Display for `descriptor`, writing to `out`
    pub fn new(out: W, descriptor: &DeviceDescriptor) -> Self {
        Self {
            out,
            active_device: format!("{} ({})", descriptor.dev_string, descriptor.unique_id),
        }
    }

    /// Clear the terminal and home the cursor.
    pub fn clear(&mut self) -> io::Result<()> {
        write!(self.out, "{}{}", CLEAR_SCREEN, CURSOR_HOME)?;
        self.out.flush()
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReadingSink for ConsoleDisplay<W> {
    fn begin_frame(&mut self) -> io::Result<()> {
        write!(self.out, "{}", CURSOR_HOME)?;
        writeln!(self.out, "Please enter CTRL + C to terminate the process")?;
        writeln!(self.out)?;
        writeln!(self.out, "Active DAQ device: {}", self.active_device)?;
        writeln!(self.out)
    }

    fn reading(&mut self, reading: &ChannelReading) -> io::Result<()> {
        writeln!(self.out, "{}{}", format_reading(reading), CLEAR_TO_EOL)
    }

    fn end_frame(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}
