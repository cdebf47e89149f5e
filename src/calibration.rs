//! Factory calibration coefficients.
//!
//! The BME280 carries per-device trimming values in non-volatile registers. They are
//! read once after reset and never change afterwards.

use crate::bme280::{REG_DIG_H1, REG_DIG_H2, REG_DIG_T1};
use crate::codec::{read_i16, read_u16, Endian};
use crate::error::CalibrationFault;
use crate::hal::RegisterBus;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TemperatureCoefficients {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HumidityCoefficients {
    pub h1: u8,
    pub h2: i16,
    pub h3: u8,
    pub h4: i16,
    pub h5: i16,
    pub h6: i8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationCoefficients {
    pub temperature: TemperatureCoefficients,
    pub humidity: HumidityCoefficients,
}

/// Where a coefficient set came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationSource {
    /// Read from this device's calibration registers.
    Device,
    /// [`CalibrationCoefficients::NOMINAL`]; readings are approximate.
    Nominal,
}

impl CalibrationCoefficients {
    /// Typical values for a BME280, used when the device's own set cannot be read.
    ///
    /// These are **not device-accurate**: readings taken with them are only indicative.
    pub const NOMINAL: Self = Self {
        temperature: TemperatureCoefficients {
            t1: 27504,
            t2: 26435,
            t3: -1000,
        },
        humidity: HumidityCoefficients {
            h1: 75,
            h2: 360,
            h3: 0,
            h4: 300,
            h5: 50,
            h6: 30,
        },
    };
}

/// Reassembles the two 12-bit humidity coefficients that share register 0xE5.
pub fn unpack_h4_h5(e4: u8, e5: u8, e6: u8) -> (i16, i16) {
    let h4 = (i16::from(e4) << 4) | i16::from(e5 & 0x0F);
    let h5 = (i16::from(e6) << 4) | i16::from(e5 >> 4);
    (h4, h5)
}

/// Signed view of the H6 register.
pub fn decode_h6(raw: u8) -> i8 {
    let value = i16::from(raw);
    (if value > 127 { value - 256 } else { value }) as i8
}

/// Reads the calibration registers.
///
/// Word-sized coefficients go through the absorbing codec readers and read as 0 on a
/// bus fault; a fault on any byte-sized register fails the whole load.
pub fn load<B: RegisterBus>(
    bus: &mut B,
    address: u8,
) -> Result<CalibrationCoefficients, CalibrationFault> {
    let temperature = TemperatureCoefficients {
        t1: read_u16(bus, address, REG_DIG_T1, Endian::Little),
        t2: read_i16(bus, address, REG_DIG_T1 + 2, Endian::Little),
        t3: read_i16(bus, address, REG_DIG_T1 + 4, Endian::Little),
    };

    let h1 = bus.read_byte(address, REG_DIG_H1)?;
    let h2 = read_i16(bus, address, REG_DIG_H2, Endian::Little);
    let h3 = bus.read_byte(address, REG_DIG_H2 + 2)?;
    let e4 = bus.read_byte(address, REG_DIG_H2 + 3)?;
    let e5 = bus.read_byte(address, REG_DIG_H2 + 4)?;
    let e6 = bus.read_byte(address, REG_DIG_H2 + 5)?;
    let (h4, h5) = unpack_h4_h5(e4, e5, e6);
    let h6 = decode_h6(bus.read_byte(address, REG_DIG_H2 + 6)?);

    Ok(CalibrationCoefficients {
        temperature,
        humidity: HumidityCoefficients {
            h1,
            h2,
            h3,
            h4,
            h5,
            h6,
        },
    })
}

/// [`load`], falling back to [`CalibrationCoefficients::NOMINAL`] on failure.
pub fn load_or_nominal<B: RegisterBus>(
    bus: &mut B,
    address: u8,
) -> (CalibrationCoefficients, CalibrationSource) {
    match load(bus, address) {
        Ok(calibration) => {
            let t = calibration.temperature;
            let h = calibration.humidity;
            info!("Calibration: T1={} T2={} T3={}", t.t1, t.t2, t.t3);
            info!(
                "Calibration: H1={} H2={} H3={} H4={} H5={} H6={}",
                h.h1, h.h2, h.h3, h.h4, h.h5, h.h6
            );
            (calibration, CalibrationSource::Device)
        }
        Err(fault) => {
            warn!("Calibration read failed ({:?}); using nominal coefficients", fault);
            (CalibrationCoefficients::NOMINAL, CalibrationSource::Nominal)
        }
    }
}
