//! Hardware Abstraction Layer
//!
//! The DAQ device is an external collaborator: everything the tool needs from
//! it is expressed as the capability traits in [`capabilities`], operating on
//! the value types in [`types`]. [`mock`] provides simulated rotary-encoder
//! hardware so the tool runs without a physical device.

pub mod capabilities;
pub mod mock;
pub mod types;

pub use capabilities::{AnalogInput, DaqDevice, DeviceInventory};
pub use types::{AInFlags, AiInfo, AiInputMode, DeviceDescriptor, InterfaceType, Range};
