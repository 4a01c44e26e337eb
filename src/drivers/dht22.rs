//! DHT22 (AM2302) humidity sensor on a single open-drain data line.
//!
//! ```text
//!  host     ▔▔▔▔╲___ ≥1 ms ___╱▔▔ 30 µs ▔▔╲
//!  sensor                                 ╲__ 80 µs __╱▔▔ 80 µs ▔▔╲  40 bits
//!  bit      ╲__ 50 µs __╱▔▔ 26 µs (0) | 70 µs (1) ▔▔╲
//! ```
//!
//! Frame: humidity (u16, ×10), temperature (sign bit + u15, ×10),
//! checksum = low byte of the sum of the first four bytes.  After the
//! last bit the sensor holds the line low for 50 µs and releases it.  It
//! needs two seconds between transactions.

use std::time::Instant;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::app::ports::SensorPort;
use crate::error::SensorError;

/// Any edge that takes longer than this means the sensor stopped talking.
const EDGE_TIMEOUT_US: u128 = 200;
/// High pulses longer than this are ones.
const ONE_THRESHOLD_US: u128 = 40;
const START_LOW_US: u32 = 1_100;
const RELEASE_US: u32 = 30;

/// One decoded frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dht22Reading {
    pub humidity: f32,
    pub temperature: f32,
}

/// Validate the checksum and scale a raw frame.
pub fn decode_frame(frame: [u8; 5]) -> Result<Dht22Reading, SensorError> {
    let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != frame[4] {
        return Err(SensorError::ReadFailed);
    }
    let humidity = f32::from(u16::from_be_bytes([frame[0], frame[1]])) / 10.0;
    let raw_t = u16::from_be_bytes([frame[2], frame[3]]);
    let mut temperature = f32::from(raw_t & 0x7FFF) / 10.0;
    if raw_t & 0x8000 != 0 {
        temperature = -temperature;
    }
    if humidity > 100.0 {
        return Err(SensorError::OutOfRange);
    }
    Ok(Dht22Reading {
        humidity,
        temperature,
    })
}

pub struct Dht22<P, D> {
    pin: P,
    delay: D,
}

impl<P: InputPin + OutputPin, D: DelayNs> Dht22<P, D> {
    pub fn new(pin: P, delay: D) -> Self {
        Self { pin, delay }
    }

    fn level(&mut self) -> Result<bool, SensorError> {
        self.pin.is_high().map_err(|_| SensorError::ReadFailed)
    }

    /// Wait while the line holds `level`; returns how long it held.
    fn hold_us(&mut self, level: bool) -> Result<u128, SensorError> {
        let start = Instant::now();
        while self.level()? == level {
            if start.elapsed().as_micros() > EDGE_TIMEOUT_US {
                return Err(SensorError::NotReady);
            }
        }
        Ok(start.elapsed().as_micros())
    }

    /// Run one transaction and return the raw five-byte frame.
    pub fn read_frame(&mut self) -> Result<[u8; 5], SensorError> {
        self.pin.set_low().map_err(|_| SensorError::ReadFailed)?;
        self.delay.delay_us(START_LOW_US);
        self.pin.set_high().map_err(|_| SensorError::ReadFailed)?;
        self.delay.delay_us(RELEASE_US);

        // Response: 80 µs low, 80 µs high.  Skip any tail of our release.
        if self.level()? {
            self.hold_us(true)?;
        }
        self.hold_us(false)?;
        self.hold_us(true)?;

        let mut frame = [0u8; 5];
        for bit in 0..40 {
            self.hold_us(false)?;
            let width = self.hold_us(true)?;
            if width > ONE_THRESHOLD_US {
                frame[bit / 8] |= 0x80 >> (bit % 8);
            }
        }
        Ok(frame)
    }

    pub fn measure(&mut self) -> Result<Dht22Reading, SensorError> {
        let frame = self.read_frame()?;
        decode_frame(frame)
    }
}

impl<P, D> SensorPort for Dht22<P, D>
where
    P: InputPin + OutputPin + Send,
    D: DelayNs + Send,
{
    /// Relative humidity in %RH.
    fn read(&mut self) -> Result<f32, SensorError> {
        self.measure().map(|r| r.humidity)
    }

    fn reset(&mut self) -> Result<(), SensorError> {
        self.pin.set_high().map_err(|_| SensorError::ResetFailed)?;
        // Let the sensor settle before the next start pulse.
        self.delay.delay_ms(2_000);
        Ok(())
    }
}
