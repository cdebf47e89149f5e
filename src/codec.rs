//! 16-bit register decoding.
//!
//! Calibration words are stored as two consecutive registers. The `try_*` readers
//! report bus faults; the plain readers absorb them into a zero value so one bad
//! word never aborts an otherwise valid calibration read.

use crate::error::BusFault;
use crate::hal::RegisterBus;

/// Byte order of a two-register word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Endian {
    Little,
    Big,
}

pub fn decode_u16(bytes: [u8; 2], endian: Endian) -> u16 {
    match endian {
        Endian::Little => u16::from(bytes[0]) | u16::from(bytes[1]) << 8,
        Endian::Big => u16::from(bytes[0]) << 8 | u16::from(bytes[1]),
    }
}

/// Two's complement view of [`decode_u16`]: values from 32768 up wrap to negative.
pub fn decode_i16(bytes: [u8; 2], endian: Endian) -> i16 {
    let raw = i32::from(decode_u16(bytes, endian));
    let signed = if raw >= 32768 { raw - 65536 } else { raw };
    signed as i16
}

pub fn try_read_u16<B: RegisterBus>(
    bus: &mut B,
    address: u8,
    register: u8,
    endian: Endian,
) -> Result<u16, BusFault> {
    let mut bytes = [0u8; 2];
    bus.read_bytes(address, register, &mut bytes)?;
    Ok(decode_u16(bytes, endian))
}

pub fn try_read_i16<B: RegisterBus>(
    bus: &mut B,
    address: u8,
    register: u8,
    endian: Endian,
) -> Result<i16, BusFault> {
    let mut bytes = [0u8; 2];
    bus.read_bytes(address, register, &mut bytes)?;
    Ok(decode_i16(bytes, endian))
}

/// Unsigned word at `register`, or 0 if the bus fails.
pub fn read_u16<B: RegisterBus>(bus: &mut B, address: u8, register: u8, endian: Endian) -> u16 {
    try_read_u16(bus, address, register, endian).unwrap_or_else(|fault| {
        warn!("u16 read of register 0x{:02X} failed: {:?}", register, fault);
        0
    })
}

/// Signed word at `register`, or 0 if the bus fails.
pub fn read_i16<B: RegisterBus>(bus: &mut B, address: u8, register: u8, endian: Endian) -> i16 {
    try_read_i16(bus, address, register, endian).unwrap_or_else(|fault| {
        warn!("i16 read of register 0x{:02X} failed: {:?}", register, fault);
        0
    })
}
