//! Application core.
//!
//! [`service::ComposterCore`] wires the controllers onto the event bus.
//! All interaction with hardware and the network happens through the
//! **port traits** in [`ports`], keeping the core testable without real
//! peripherals.

pub mod ports;
pub mod service;

pub use service::{ComposterCore, OutputPins};
