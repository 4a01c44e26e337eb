//! DS18B20 temperature probe on a bit-banged 1-Wire bus.
//!
//! A single probe is assumed, so every transaction addresses it with
//! SKIP ROM.  One measurement is: set 12-bit resolution, start a
//! conversion, wait for it, read the scratchpad back and check its CRC.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::app::ports::SensorPort;
use crate::error::SensorError;

const SKIP_ROM: u8 = 0xCC;
const CONVERT_T: u8 = 0x44;
const READ_SCRATCHPAD: u8 = 0xBE;
const WRITE_SCRATCHPAD: u8 = 0x4E;
/// Configuration register value for 12-bit conversions.
const RESOLUTION_12_BIT: u8 = 0x7F;
/// 750 ms worst case at 12 bits, plus margin.
const CONVERSION_MS: u32 = 800;
/// Scratchpad value the probe holds after power-on, before any conversion.
const POWER_ON_RAW: i16 = 0x0550;

/// Dallas/Maxim CRC-8 (x⁸ + x⁵ + x⁴ + 1, reflected).
pub fn crc8(bytes: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in bytes {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}

/// Check a scratchpad and convert its first two bytes to °C.
pub fn decode_scratchpad(pad: &[u8; 9]) -> Result<f32, SensorError> {
    if crc8(&pad[..8]) != pad[8] {
        return Err(SensorError::ReadFailed);
    }
    let raw = i16::from_le_bytes([pad[0], pad[1]]);
    if raw == POWER_ON_RAW {
        return Err(SensorError::NotReady);
    }
    Ok(f32::from(raw) / 16.0)
}

pub struct Ds18b20<P, D> {
    pin: P,
    delay: D,
}

impl<P: InputPin + OutputPin, D: DelayNs> Ds18b20<P, D> {
    pub fn new(pin: P, delay: D) -> Self {
        Self { pin, delay }
    }

    fn drive_low(&mut self) -> Result<(), SensorError> {
        self.pin.set_low().map_err(|_| SensorError::ReadFailed)
    }

    fn release(&mut self) -> Result<(), SensorError> {
        self.pin.set_high().map_err(|_| SensorError::ReadFailed)
    }

    fn sample(&mut self) -> Result<bool, SensorError> {
        self.pin.is_high().map_err(|_| SensorError::ReadFailed)
    }

    /// Reset pulse; `Ok(true)` when a device answered with a presence pulse.
    fn bus_reset(&mut self) -> Result<bool, SensorError> {
        self.drive_low()?;
        self.delay.delay_us(480);
        self.release()?;
        self.delay.delay_us(70);
        let present = !self.sample()?;
        self.delay.delay_us(410);
        Ok(present)
    }

    fn write_bit(&mut self, bit: bool) -> Result<(), SensorError> {
        self.drive_low()?;
        if bit {
            self.delay.delay_us(6);
            self.release()?;
            self.delay.delay_us(64);
        } else {
            self.delay.delay_us(60);
            self.release()?;
            self.delay.delay_us(10);
        }
        Ok(())
    }

    fn read_bit(&mut self) -> Result<bool, SensorError> {
        self.drive_low()?;
        self.delay.delay_us(6);
        self.release()?;
        self.delay.delay_us(9);
        let bit = self.sample()?;
        self.delay.delay_us(55);
        Ok(bit)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), SensorError> {
        for i in 0..8 {
            self.write_bit(byte & (1 << i) != 0)?;
        }
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, SensorError> {
        let mut byte = 0;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    /// Reset, check presence, address the probe.
    fn select(&mut self) -> Result<(), SensorError> {
        if !self.bus_reset()? {
            return Err(SensorError::NotReady);
        }
        self.write_byte(SKIP_ROM)
    }

    pub fn set_resolution(&mut self) -> Result<(), SensorError> {
        self.select()?;
        self.write_byte(WRITE_SCRATCHPAD)?;
        // Alarm thresholds are unused.
        self.write_byte(0)?;
        self.write_byte(0)?;
        self.write_byte(RESOLUTION_12_BIT)
    }

    pub fn measure(&mut self) -> Result<f32, SensorError> {
        self.set_resolution()?;
        self.select()?;
        self.write_byte(CONVERT_T)?;
        self.delay.delay_ms(CONVERSION_MS);

        self.select()?;
        self.write_byte(READ_SCRATCHPAD)?;
        let mut pad = [0u8; 9];
        for b in &mut pad {
            *b = self.read_byte()?;
        }
        decode_scratchpad(&pad)
    }
}

impl<P, D> SensorPort for Ds18b20<P, D>
where
    P: InputPin + OutputPin + Send,
    D: DelayNs + Send,
{
    /// Temperature in °C.
    fn read(&mut self) -> Result<f32, SensorError> {
        self.measure()
    }

    fn reset(&mut self) -> Result<(), SensorError> {
        match self.bus_reset() {
            Ok(true) => Ok(()),
            _ => Err(SensorError::ResetFailed),
        }
    }
}
