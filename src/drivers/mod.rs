//! Peripheral drivers and task helpers.

pub mod button;
pub mod dht22;
pub mod ds18b20;
pub mod task_pin;
pub mod ultrasonic;
