//! Sensor classifiers: raw readings in, edge-triggered events out.
//!
//! | Classifier                 | Source              | Publishes                     |
//! |----------------------------|---------------------|-------------------------------|
//! | [`StabilityClassifier`]    | humidity, temp      | `Humidity/*`, `Temperature/*` |
//! | [`ParametersMonitor`]      | the two above       | `Parameters/*`                |
//! | [`CapacityClassifier`]     | ultrasonic distance | `Capacity/*`                  |
//! | [`LidMonitor`]             | lid reed switch     | `Lid/Opened`, `Lid/Closed`    |
//!
//! Each classifier owns its sensor and runs on its own thread; sensor I/O
//! never happens on the bus.

pub mod aggregate;
pub mod capacity;
pub mod lid;
pub mod stability;

pub use aggregate::ParametersMonitor;
pub use capacity::CapacityClassifier;
pub use lid::LidMonitor;
pub use stability::{Quantity, StabilityClassifier};
