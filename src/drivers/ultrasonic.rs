//! HC-SR04 ultrasonic range finder.
//!
//! A 10 µs trigger pulse starts a measurement; the sensor answers with an
//! echo pulse whose width is the round-trip time.  Echo widths above
//! [`MAX_ECHO_US`] mean nothing reflected within range.

use std::time::Instant;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::app::ports::SensorPort;
use crate::error::SensorError;
use crate::sensors::capacity::{MAX_ECHO_US, distance_from_echo_us};

/// How long to wait for the echo line to rise.
const ECHO_START_TIMEOUT_US: u128 = 10_000;

pub struct Hcsr04<T, E, D> {
    trig: T,
    echo: E,
    delay: D,
}

impl<T: OutputPin, E: InputPin, D: DelayNs> Hcsr04<T, E, D> {
    pub fn new(trig: T, echo: E, delay: D) -> Self {
        Self { trig, echo, delay }
    }

    fn echo_high(&mut self) -> Result<bool, SensorError> {
        self.echo.is_high().map_err(|_| SensorError::ReadFailed)
    }

    /// Fire one ping and return the echo width in microseconds.
    pub fn ping_us(&mut self) -> Result<u32, SensorError> {
        self.trig.set_low().map_err(|_| SensorError::ReadFailed)?;
        self.delay.delay_us(2);
        self.trig.set_high().map_err(|_| SensorError::ReadFailed)?;
        self.delay.delay_us(10);
        self.trig.set_low().map_err(|_| SensorError::ReadFailed)?;

        let wait = Instant::now();
        while !self.echo_high()? {
            if wait.elapsed().as_micros() > ECHO_START_TIMEOUT_US {
                return Err(SensorError::NotReady);
            }
        }

        let start = Instant::now();
        while self.echo_high()? {
            if start.elapsed().as_micros() > u128::from(MAX_ECHO_US) {
                return Err(SensorError::OutOfRange);
            }
        }
        Ok(start.elapsed().as_micros() as u32)
    }
}

impl<T, E, D> SensorPort for Hcsr04<T, E, D>
where
    T: OutputPin + Send,
    E: InputPin + Send,
    D: DelayNs + Send,
{
    /// Distance to the compost surface in centimetres.
    fn read(&mut self) -> Result<f32, SensorError> {
        let us = self.ping_us()?;
        distance_from_echo_us(us).ok_or(SensorError::OutOfRange)
    }

    fn reset(&mut self) -> Result<(), SensorError> {
        self.trig.set_low().map_err(|_| SensorError::ResetFailed)
    }
}
