//! AutoCompost firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod actuators;
pub mod app;
pub mod bus;
pub mod cloud;
pub mod config;
pub mod error;
pub mod events;
pub mod params;
pub mod pins;
pub mod safety;
pub mod sensors;
pub mod timers;

// Host builds get in-memory stand-ins; the ESP-IDF paths are guarded by
// cfg attributes inside.
pub mod adapters;
pub mod drivers;

#[cfg(test)]
mod test_support;
