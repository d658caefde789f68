//! # Encoder DAQ Library
//!
//! Polls analog rotary encoders through a DAQ device and turns their sawtooth
//! voltages into unwrapped angles. The binary (`main.rs`) is a thin CLI over
//! this library.
//!
//! ## Crate Structure
//!
//! - **`unwrap`**: The incremental angle unwrapper and per-channel state.
//! - **`hardware`**: Capability traits for device discovery, connection and
//!   analog input, plus simulated encoder hardware.
//! - **`session`**: Opens a device, resolves input mode / channels / range
//!   against its capabilities, and guarantees disconnect + release.
//! - **`acquisition`**: The polling loop feeding readings to a sink.
//! - **`display`**: Terminal output for device lists and live angles.
//! - **`config`**: Figment-based configuration (TOML file + environment).
//! - **`error`**: The `DaqError` enum used across the library.
//! - **`logging`**: `tracing` subscriber setup.

pub mod acquisition;
pub mod config;
pub mod display;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod session;
pub mod unwrap;
