//! BME280 register map and the low-level operations the acquisition loop needs.

use embedded_hal_async::delay::DelayNs;

use crate::error::{BusFault, CalibrationFault};
use crate::hal::RegisterBus;

/// SDO tied high.
pub const BME280_ADDR: u8 = 0x77;
pub const CHIP_ID: u8 = 0x60;

pub const REG_CHIP_ID: u8 = 0xD0;
pub const REG_RESET: u8 = 0xE0;
pub const REG_CTRL_HUM: u8 = 0xF2;
pub const REG_CTRL_MEAS: u8 = 0xF4;
pub const REG_CONFIG: u8 = 0xF5;
/// First of the eight pressure/temperature/humidity data registers.
pub const REG_DATA: u8 = 0xF7;

pub const REG_DIG_T1: u8 = 0x88;
pub const REG_DIG_H1: u8 = 0xA1;
pub const REG_DIG_H2: u8 = 0xE1;

pub const CMD_SOFT_RESET: u8 = 0xB6;
/// Humidity oversampling x1.
pub const CTRL_HUM_VALUE: u8 = 0x01;
/// Temperature x1, pressure skipped, normal mode.
pub const CTRL_MEAS_VALUE: u8 = 0x23;
/// 0.5 ms standby, filter off.
pub const CONFIG_VALUE: u8 = 0x00;

pub const RESET_SETTLE_MS: u32 = 500;
pub const CTRL_HUM_SETTLE_MS: u32 = 100;
pub const CONFIG_SETTLE_MS: u32 = 500;

/// Codes the sensor reports for a skipped or not-yet-converted temperature.
pub const INVALID_TEMP_RAW: [u32; 2] = [0x80000, 0xFFFFF];
/// Codes the sensor reports for a skipped or not-yet-converted humidity.
pub const INVALID_HUM_RAW: [u32; 2] = [0x8000, 0xFFFF];

/// One uncompensated burst read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample {
    pub temp_raw: u32,
    pub press_raw: u32,
    pub hum_raw: u32,
}

impl RawSample {
    /// Unpacks the 20-bit pressure and temperature fields and the 16-bit humidity field.
    pub fn from_burst(data: &[u8; 8]) -> Self {
        let b = data.map(u32::from);
        Self {
            press_raw: (b[0] << 12) | (b[1] << 4) | (b[2] >> 4),
            temp_raw: (b[3] << 12) | (b[4] << 4) | (b[5] >> 4),
            hum_raw: (b[6] << 8) | b[7],
        }
    }

    pub fn temperature_valid(&self) -> bool {
        !INVALID_TEMP_RAW.contains(&self.temp_raw)
    }

    pub fn humidity_valid(&self) -> bool {
        !INVALID_HUM_RAW.contains(&self.hum_raw)
    }
}

/// Driver handle; owns the bus for the lifetime of acquisition.
pub struct Bme280<B> {
    bus: B,
    address: u8,
}

impl<B: RegisterBus> Bme280<B> {
    pub fn new(bus: B) -> Self {
        Self::with_address(bus, BME280_ADDR)
    }

    pub fn with_address(bus: B, address: u8) -> Self {
        Self { bus, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn bus(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn chip_id(&mut self) -> Result<u8, BusFault> {
        self.bus.read_byte(self.address, REG_CHIP_ID)
    }

    /// Checks the identity register, then resets and programs the measurement mode.
    pub async fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), CalibrationFault> {
        let found = self.chip_id()?;
        if found != CHIP_ID {
            return Err(CalibrationFault::ChipIdMismatch { found });
        }
        info!("BME280 found at 0x{:02X}", self.address);

        self.bus.write_byte(self.address, REG_RESET, CMD_SOFT_RESET)?;
        delay.delay_ms(RESET_SETTLE_MS).await;

        // ctrl_hum only takes effect after the next ctrl_meas write
        self.bus.write_byte(self.address, REG_CTRL_HUM, CTRL_HUM_VALUE)?;
        delay.delay_ms(CTRL_HUM_SETTLE_MS).await;

        self.bus.write_byte(self.address, REG_CTRL_MEAS, CTRL_MEAS_VALUE)?;
        self.bus.write_byte(self.address, REG_CONFIG, CONFIG_VALUE)?;
        delay.delay_ms(CONFIG_SETTLE_MS).await;

        debug!("BME280 configured");
        Ok(())
    }

    pub fn read_raw(&mut self) -> Result<RawSample, BusFault> {
        let mut data = [0u8; 8];
        self.bus.read_bytes(self.address, REG_DATA, &mut data)?;
        Ok(RawSample::from_burst(&data))
    }
}
